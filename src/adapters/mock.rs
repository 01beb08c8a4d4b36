//! 假图床：不发网络请求，按文件生成确定性 URL。
//!
//! 可选配置：`base_url`（默认 `https://mock.example.com`）、`delay_ms`（模拟耗时，默认 0）。

use std::path::{Path, PathBuf};
use std::time::Duration;

use sha2::{Digest, Sha256};

use super::{Uploader, file_name};
use crate::config::HostConfig;
use crate::error::AppError;

const NAME: &str = "mock";
const DEFAULT_BASE_URL: &str = "https://mock.example.com";

pub struct MockAdapter;

impl MockAdapter {
    pub fn new() -> Self {
        Self
    }
}

impl Default for MockAdapter {
    fn default() -> Self {
        Self::new()
    }
}

/// 以 (序号, 路径) 计算 8 位十六进制短哈希
fn short_hash(index: usize, path: &Path) -> String {
    let mut hasher = Sha256::new();
    hasher.update(index.to_le_bytes());
    hasher.update(path.to_string_lossy().as_bytes());
    hasher
        .finalize()
        .iter()
        .take(4)
        .map(|b| format!("{b:02x}"))
        .collect()
}

impl Uploader for MockAdapter {
    fn name(&self) -> &str {
        NAME
    }

    fn upload(&self, files: &[PathBuf], config: &HostConfig) -> Result<Vec<String>, AppError> {
        let base_url = config
            .get_str_or("base_url", DEFAULT_BASE_URL)
            .trim_end_matches('/')
            .to_string();
        let delay_ms = match config.get_str("delay_ms") {
            Some(raw) => raw.parse::<u64>().map_err(|_| AppError::ConfigInvalid {
                host: NAME.to_string(),
                reason: format!("delay_ms 应为非负整数，当前为 '{}'", raw),
            })?,
            None => 0,
        };
        if delay_ms > 0 {
            std::thread::sleep(Duration::from_millis(delay_ms));
        }

        let urls: Vec<String> = files
            .iter()
            .enumerate()
            .map(|(index, path)| {
                format!("{}/{}/{}", base_url, short_hash(index, path), file_name(path))
            })
            .collect();
        log::debug!("🧪 mock 图床生成 {} 个地址", urls.len());
        Ok(urls)
    }
}
