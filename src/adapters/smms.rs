//! sm.ms 公共图床。
//!
//! 必需配置：`token`；可选配置：`api_url`。
//! 重复图片时 sm.ms 返回 `code = image_repeated`，此时直接使用已存在的地址。

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

const NAME: &str = "smms";
const DEFAULT_API_URL: &str = "https://sm.ms/api/v2/upload";

pub struct SmmsAdapter {
    client: OnceCell<Client>,
}

impl SmmsAdapter {
    pub fn new() -> Self {
        Self {
            client: OnceCell::new(),
        }
    }

    fn upload_one(&self, client: &Client, api_url: &str, token: &str, path: &Path) -> Result<String, AppError> {
        let bytes = read_file(NAME, path)?;
        let mime = sniff_mime(&bytes);
        let part = Part::bytes(bytes)
            .file_name(file_name(path))
            .mime_str(mime)
            .map_err(|e| network_error(NAME, e))?;
        let form = Form::new().part("smfile", part);

        let response = client
            .post(api_url)
            .header("Authorization", token)
            .header("Accept", "application/json")
            .multipart(form)
            .send()
            .map_err(|e| network_error(NAME, e))?;
        let body = read_json(NAME, ensure_success(NAME, response)?)?;
        extract_url(&body)
    }
}

impl Default for SmmsAdapter {
    fn default() -> Self {
        Self::new()
    }
}

/// 从 sm.ms 响应中取出图片地址
fn extract_url(body: &Value) -> Result<String, AppError> {
    if body.get("success").and_then(Value::as_bool) == Some(true) {
        if let Some(url) = body.pointer("/data/url").and_then(Value::as_str) {
            return Ok(url.to_string());
        }
    }
    if body.get("code").and_then(Value::as_str) == Some("image_repeated") {
        if let Some(url) = body.get("images").and_then(Value::as_str) {
            log::info!("♻️ sm.ms 检测到重复图片，复用已有地址");
            return Ok(url.to_string());
        }
    }
    Err(AppError::upload(
        NAME,
        format!("响应：{}", truncate_for_error(&body.to_string())),
    ))
}

impl Uploader for SmmsAdapter {
    fn name(&self) -> &str {
        NAME
    }

    fn upload(&self, files: &[PathBuf], config: &HostConfig) -> Result<Vec<String>, AppError> {
        config.require(NAME, &["token"])?;
        let token = config.get_str_or("token", "");
        let api_url = config.get_str_or("api_url", DEFAULT_API_URL);
        let client = shared_client(&self.client, NAME)?;

        files
            .iter()
            .map(|path| self.upload_one(client, &api_url, &token, path))
            .collect()
    }
}
