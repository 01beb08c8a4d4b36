//! B 站动态图片图床。
//!
//! 必需配置：`sessdata`、`bili_jct`（浏览器 Cookie 中的同名字段）；可选配置：`api_url`。
//! 接口要求浏览器 UA 与 `t.bilibili.com` 的 Referer/Origin，`bili_jct` 同时作为 csrf 字段提交。

use std::path::{Path, PathBuf};

use once_cell::sync::OnceCell;
use reqwest::blocking::Client;
use reqwest::blocking::multipart::{Form, Part};
use serde_json::Value;

use super::{
    Uploader, ensure_success, file_name, network_error, read_file, read_json, shared_client,
    sniff_mime, truncate_for_error,
};
use crate::config::HostConfig;
use crate::error::AppError;

const NAME: &str = "bilibili";
const DEFAULT_API_URL: &str = "https://api.bilibili.com/x/dynamic/feed/draw/upload_bfs";
const BROWSER_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";
const REFERER: &str = "https://t.bilibili.com/";
const ORIGIN: &str = "https://t.bilibili.com";

struct BilibiliSettings {
    sessdata: String,
    bili_jct: String,
    api_url: String,
}

pub struct BilibiliAdapter {
    client: OnceCell<Client>,
}

impl BilibiliAdapter {
    pub fn new() -> Self {
        Self {
            client: OnceCell::new(),
        }
    }

    fn upload_one(&self, client: &Client, settings: &BilibiliSettings, path: &Path) -> Result<String, AppError> {
        let bytes = read_file(NAME, path)?;
        let mime = sniff_mime(&bytes);
        let part = Part::bytes(bytes)
            .file_name(file_name(path))
            .mime_str(mime)
            .map_err(|e| network_error(NAME, e))?;
        let form = Form::new()
            .part("file_up", part)
            .text("biz", "draw")
            .text("category", "daily")
            .text("csrf", settings.bili_jct.clone());

        let response = client
            .post(&settings.api_url)
            .header(
                "Cookie",
                format!("SESSDATA={}; bili_jct={}", settings.sessdata, settings.bili_jct),
            )
            .header("User-Agent", BROWSER_USER_AGENT)
            .header("Referer", REFERER)
            .header("Origin", ORIGIN)
            .multipart(form)
            .send()
            .map_err(|e| network_error(NAME, e))?;
        let body = read_json(NAME, ensure_success(NAME, response)?)?;
        extract_url(&body)
    }
}

impl Default for BilibiliAdapter {
    fn default() -> Self {
        Self::new()
    }
}

/// 解析响应：`code == 0` 时取 `data.image_url`，并把 http 升级为 https
fn extract_url(body: &Value) -> Result<String, AppError> {
    if body.get("code").and_then(Value::as_i64) == Some(0) {
        if let Some(url) = body.pointer("/data/image_url").and_then(Value::as_str) {
            return Ok(upgrade_to_https(url));
        }
    }
    Err(AppError::upload(
        NAME,
        format!("响应：{}", truncate_for_error(&body.to_string())),
    ))
}

fn upgrade_to_https(url: &str) -> String {
    match url.strip_prefix("http://") {
        Some(rest) => format!("https://{rest}"),
        None => url.to_string(),
    }
}

impl Uploader for BilibiliAdapter {
    fn name(&self) -> &str {
        NAME
    }

    fn upload(&self, files: &[PathBuf], config: &HostConfig) -> Result<Vec<String>, AppError> {
        config.require(NAME, &["sessdata", "bili_jct"])?;
        let settings = BilibiliSettings {
            sessdata: config.get_str_or("sessdata", ""),
            bili_jct: config.get_str_or("bili_jct", ""),
            api_url: config.get_str_or("api_url", DEFAULT_API_URL),
        };
        let client = shared_client(&self.client, NAME)?;

        files
            .iter()
            .map(|path| self.upload_one(client, &settings, path))
            .collect()
    }
}
