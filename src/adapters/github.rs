//! GitHub 图床：通过 Contents API 把图片提交到仓库，返回 raw 下载地址。
//!
//! 必需配置：`repo`（`owner/name`）、`token`；
//! 可选配置：`branch`（默认 `main`）、`path`（仓库内目录前缀）、`api_base`。

use std::path::{Path, PathBuf};

use base64::{Engine as _, engine::general_purpose};
use once_cell::sync::OnceCell;
use reqwest::blocking::Client;
use serde_json::json;

use super::{Uploader, ensure_success, file_name, network_error, read_file, read_json, shared_client};
use crate::config::HostConfig;
use crate::error::AppError;

const NAME: &str = "github";
const DEFAULT_API_BASE: &str = "https://api.github.com";
const DEFAULT_BRANCH: &str = "main";
const RAW_BASE: &str = "https://raw.githubusercontent.com";

/// 单次调用解析出的配置
struct GitHubSettings {
    owner: String,
    repo: String,
    branch: String,
    token: String,
    path_prefix: String,
    api_base: String,
}

impl GitHubSettings {
    fn from_config(config: &HostConfig) -> Result<Self, AppError> {
        config.require(NAME, &["repo", "token"])?;

        let full_repo = config.get_str_or("repo", "");
        let (owner, repo) = full_repo
            .split_once('/')
            .filter(|(owner, repo)| !owner.is_empty() && !repo.is_empty() && !repo.contains('/'))
            .ok_or_else(|| AppError::ConfigInvalid {
                host: NAME.to_string(),
                reason: format!("repo 应为 owner/name 格式，当前为 '{}'", full_repo),
            })?;

        Ok(Self {
            owner: owner.to_string(),
            repo: repo.to_string(),
            branch: config.get_str_or("branch", DEFAULT_BRANCH),
            token: config.get_str_or("token", ""),
            path_prefix: config.get_str_or("path", "").trim_matches('/').to_string(),
            api_base: config
                .get_str_or("api_base", DEFAULT_API_BASE)
                .trim_end_matches('/')
                .to_string(),
        })
    }

    fn remote_path(&self, name: &str) -> String {
        if self.path_prefix.is_empty() {
            name.to_string()
        } else {
            format!("{}/{}", self.path_prefix, name)
        }
    }

    fn contents_url(&self, remote_path: &str) -> String {
        format!(
            "{}/repos/{}/{}/contents/{}",
            self.api_base, self.owner, self.repo, remote_path
        )
    }
}

pub struct GitHubAdapter {
    client: OnceCell<Client>,
}

impl GitHubAdapter {
    pub fn new() -> Self {
        Self {
            client: OnceCell::new(),
        }
    }

    /// 查询已存在文件的 sha；任何失败都视为文件不存在
    fn existing_sha(&self, client: &Client, settings: &GitHubSettings, remote_path: &str) -> Option<String> {
        let url = format!("{}?ref={}", settings.contents_url(remote_path), settings.branch);
        let response = client
            .get(url)
            .header("Authorization", format!("token {}", settings.token))
            .header("Accept", "application/vnd.github+json")
            .send()
            .ok()?;
        if !response.status().is_success() {
            return None;
        }
        let body: serde_json::Value = response.json().ok()?;
        body.get("sha").and_then(|v| v.as_str()).map(str::to_string)
    }

    fn upload_one(&self, client: &Client, settings: &GitHubSettings, path: &Path) -> Result<String, AppError> {
        let name = file_name(path);
        let remote_path = settings.remote_path(&name);
        let content = read_file(NAME, path)?;

        let mut payload = json!({
            "message": format!("upload {} via picgo", name),
            "content": general_purpose::STANDARD.encode(&content),
            "branch": settings.branch,
        });
        if let Some(sha) = self.existing_sha(client, settings, &remote_path) {
            log::debug!("GitHub 上已存在同名文件，覆盖提交: {}", remote_path);
            payload["sha"] = json!(sha);
        }

        let response = client
            .put(settings.contents_url(&remote_path))
            .header("Authorization", format!("token {}", settings.token))
            .header("Accept", "application/vnd.github+json")
            .json(&payload)
            .send()
            .map_err(|e| network_error(NAME, e))?;
        let body = read_json(NAME, ensure_success(NAME, response)?)?;

        let url = body
            .get("content")
            .and_then(|c| c.get("download_url"))
            .and_then(|u| u.as_str())
            .map(str::to_string)
            .unwrap_or_else(|| {
                format!(
                    "{}/{}/{}/{}/{}",
                    RAW_BASE, settings.owner, settings.repo, settings.branch, remote_path
                )
            });
        Ok(url)
    }
}

impl Default for GitHubAdapter {
    fn default() -> Self {
        Self::new()
    }
}

impl Uploader for GitHubAdapter {
    fn name(&self) -> &str {
        NAME
    }

    fn upload(&self, files: &[PathBuf], config: &HostConfig) -> Result<Vec<String>, AppError> {
        let settings = GitHubSettings::from_config(config)?;
        let client = shared_client(&self.client, NAME)?;

        files
            .iter()
            .map(|path| {
                let url = self.upload_one(client, &settings, path)?;
                log::info!("☁️ GitHub 上传成功: {}", url);
                Ok(url)
            })
            .collect()
    }
}
