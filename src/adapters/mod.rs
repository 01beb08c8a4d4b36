//! # 图床适配器模块（adapters）
//!
//! ## 设计思路
//!
//! 每个图床实现同一个能力接口 `Uploader`：“上传一组本地文件，按输入顺序返回 URL，或失败”。
//! 编排器只认识这个接口，不关心具体图床的请求格式。
//!
//! - `github`：通过 Contents API 提交到仓库
//! - `smms`：sm.ms 公共图床
//! - `bilibili`：B 站动态图片接口
//! - `mock`：确定性假图床，用于测试与演示
//!
//! ## 实现思路
//!
//! - 注册表 `AdapterRegistry` 以图床名为键保存 `Arc<dyn Uploader>`，启动时一次性填充，
//!   之后只读，通过 `Arc` 显式传给编排器，不使用全局可变状态。
//! - 同名重复注册时后者覆盖前者（记录 warn，不报错）。
//! - 配置在每次调用时惰性校验：缺项返回 `AppError::ConfigMissing`。
//! - HTTP 客户端按适配器惰性构建并复用（`OnceCell`）。

mod bilibili;
mod github;
mod mock;
mod smms;

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use once_cell::sync::OnceCell;
use reqwest::blocking::{Client, Response};

use crate::config::HostConfig;
use crate::error::AppError;

pub use bilibili::BilibiliAdapter;
pub use github::GitHubAdapter;
pub use mock::MockAdapter;
pub use smms::SmmsAdapter;

const HTTP_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);
const HTTP_REQUEST_TIMEOUT: Duration = Duration::from_secs(60);
const USER_AGENT: &str = concat!("picgo/", env!("CARGO_PKG_VERSION"));
/// 错误消息中保留的响应体长度上限
const ERROR_BODY_MAX_CHARS: usize = 512;

/// 图床上传能力
pub trait Uploader: Send + Sync {
    /// 图床名称，即注册表中的键
    fn name(&self) -> &str;

    /// 上传文件并按输入顺序返回 URL
    ///
    /// 缺少必需配置时必须返回 `AppError::ConfigMissing`，远端失败返回 `AppError::UploadFailed`。
    fn upload(&self, files: &[PathBuf], config: &HostConfig) -> Result<Vec<String>, AppError>;
}

/// 图床适配器注册表
#[derive(Default)]
pub struct AdapterRegistry {
    adapters: HashMap<String, Arc<dyn Uploader>>,
}

impl AdapterRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// 创建并注册全部内置图床
    pub fn with_builtin() -> Self {
        let mut registry = Self::new();
        registry.register(Arc::new(GitHubAdapter::new()));
        registry.register(Arc::new(SmmsAdapter::new()));
        registry.register(Arc::new(BilibiliAdapter::new()));
        registry.register(Arc::new(MockAdapter::new()));
        registry
    }

    /// 以适配器自身名称注册
    pub fn register(&mut self, adapter: Arc<dyn Uploader>) {
        let name = adapter.name().to_string();
        self.register_as(name, adapter);
    }

    /// 以指定名称注册，同名时覆盖
    pub fn register_as(&mut self, name: impl Into<String>, adapter: Arc<dyn Uploader>) {
        let name = name.into();
        if self.adapters.insert(name.clone(), adapter).is_some() {
            log::warn!("🔁 图床适配器 {} 被重复注册，已使用后注册的实现", name);
        } else {
            log::debug!("🔌 已注册图床适配器: {}", name);
        }
    }

    pub fn resolve(&self, name: &str) -> Option<Arc<dyn Uploader>> {
        self.adapters.get(name).cloned()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.adapters.contains_key(name)
    }

    /// 已注册图床名称（排序后）
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.adapters.keys().cloned().collect();
        names.sort();
        names
    }
}

// ============================================================================
// HTTP 辅助
// ============================================================================

/// 惰性构建并复用 HTTP 客户端
pub(crate) fn shared_client<'a>(cell: &'a OnceCell<Client>, host: &str) -> Result<&'a Client, AppError> {
    cell.get_or_try_init(|| {
        Client::builder()
            .connect_timeout(HTTP_CONNECT_TIMEOUT)
            .timeout(HTTP_REQUEST_TIMEOUT)
            .user_agent(USER_AGENT)
            .build()
    })
    .map_err(|e| AppError::upload(host, format!("HTTP 客户端初始化失败：{}", e)))
}

/// 网络层错误映射
pub(crate) fn network_error(host: &str, err: reqwest::Error) -> AppError {
    AppError::UploadFailed {
        host: host.to_string(),
        status: err.status().map(|s| s.as_u16()),
        message: format!("网络错误：{}", err),
    }
}

/// 检查 HTTP 状态码，非 2xx 时附带响应体返回 `UploadFailed`
pub(crate) fn ensure_success(host: &str, response: Response) -> Result<Response, AppError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().unwrap_or_default();
    Err(AppError::UploadFailed {
        host: host.to_string(),
        status: Some(status.as_u16()),
        message: format!("响应：{}", truncate_for_error(&body)),
    })
}

/// 读取 JSON 响应体
pub(crate) fn read_json(host: &str, response: Response) -> Result<serde_json::Value, AppError> {
    response
        .json::<serde_json::Value>()
        .map_err(|e| AppError::upload(host, format!("响应不是合法 JSON：{}", e)))
}

/// 读取待上传文件
pub(crate) fn read_file(host: &str, path: &Path) -> Result<Vec<u8>, AppError> {
    std::fs::read(path).map_err(|e| {
        AppError::upload(host, format!("无法读取文件 '{}'：{}", path.display(), e))
    })
}

/// 文件名（用于远端路径与 multipart 文件名）
pub(crate) fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| "image.png".to_string())
}

/// 按内容嗅探 MIME 类型
pub(crate) fn sniff_mime(bytes: &[u8]) -> &'static str {
    infer::get(bytes)
        .map(|kind| kind.mime_type())
        .unwrap_or("application/octet-stream")
}

pub(crate) fn truncate_for_error(text: &str) -> String {
    if text.chars().count() <= ERROR_BODY_MAX_CHARS {
        return text.to_string();
    }
    let head: String = text.chars().take(ERROR_BODY_MAX_CHARS).collect();
    format!("{head}…")
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Named(&'static str, &'static str);

    impl Uploader for Named {
        fn name(&self) -> &str {
            self.0
        }

        fn upload(&self, files: &[PathBuf], _config: &HostConfig) -> Result<Vec<String>, AppError> {
            Ok(files.iter().map(|_| self.1.to_string()).collect())
        }
    }

    #[test]
    fn builtin_registry_contains_all_hosts() {
        let registry = AdapterRegistry::with_builtin();
        assert_eq!(registry.names(), vec!["bilibili", "github", "mock", "smms"]);
        assert!(registry.resolve("imgur").is_none());
    }

    #[test]
    fn later_registration_overwrites_earlier() {
        let mut registry = AdapterRegistry::new();
        registry.register(Arc::new(Named("custom", "first")));
        registry.register(Arc::new(Named("custom", "second")));

        let adapter = registry.resolve("custom").expect("registered");
        let urls = adapter
            .upload(&[PathBuf::from("a.png")], &HostConfig::new())
            .unwrap();
        assert_eq!(urls, vec!["second".to_string()]);
        assert_eq!(registry.names().len(), 1);
    }

    #[test]
    fn register_as_uses_alias() {
        let mut registry = AdapterRegistry::new();
        registry.register_as("alias", Arc::new(Named("custom", "x")));
        assert!(registry.contains("alias"));
        assert!(!registry.contains("custom"));
    }

    #[test]
    fn sniff_mime_detects_png_and_falls_back() {
        let png_magic = [0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A, 0, 0, 0, 0];
        assert_eq!(sniff_mime(&png_magic), "image/png");
        assert_eq!(sniff_mime(b"hello"), "application/octet-stream");
    }

    #[test]
    fn long_error_bodies_are_truncated() {
        let body = "x".repeat(2_000);
        let truncated = truncate_for_error(&body);
        assert_eq!(truncated.chars().count(), ERROR_BODY_MAX_CHARS + 1);
        assert_eq!(truncate_for_error("short"), "short");
    }
}
