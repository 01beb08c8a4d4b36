//! 配置存储模块
//!
//! # 设计思路
//!
//! 配置分两层：
//! - **全局配置**：默认图床、输出格式、是否复制到剪贴板、是否记录历史；
//! - **图床配置**（`HostConfig`）：每个图床自己的密钥与参数，内容不做预校验，
//!   由适配器在每次上传时检查（缺项时给出可执行的修复命令）。
//!
//! # 实现思路
//!
//! - 单个 JSON 文档持久化，pretty-print + UTF-8，先写临时文件再 rename。
//! - 文件缺失或损坏时自愈：损坏文件先备份为 `config.json.bak`，再写入默认配置。
//! - 所有修改都在 `RwLock` 写锁内完成“读-改-写”，多入口并发调用也不会互相覆盖。
//! - 未知顶层字段通过 `#[serde(flatten)]` 保留，不会在保存时丢失。

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::AppError;
use crate::storage::write_json_atomic;

pub const DEFAULT_HOST: &str = "github";
pub const DEFAULT_FORMAT: &str = "markdown";

// ============================================================================
// HostConfig
// ============================================================================

/// 单个图床的配置项（字符串键 → 任意 JSON 值）
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct HostConfig(BTreeMap<String, Value>);

impl HostConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    /// 以字符串形式读取配置项
    ///
    /// 字符串原样返回，数字与布尔值转为字符串；空字符串、null、对象与数组视为未设置。
    pub fn get_str(&self, key: &str) -> Option<String> {
        match self.0.get(key)? {
            Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
            Value::Number(n) => Some(n.to_string()),
            Value::Bool(b) => Some(b.to_string()),
            _ => None,
        }
    }

    /// 读取字符串配置，缺失时使用默认值
    pub fn get_str_or(&self, key: &str, default: &str) -> String {
        self.get_str(key).unwrap_or_else(|| default.to_string())
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<Value>) -> &mut Self {
        self.0.insert(key.into(), value.into());
        self
    }

    pub fn with(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.insert(key, value);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// 校验必需配置项，所有缺失项一次性报告
    ///
    /// # 返回
    /// - `Ok(())` — 全部存在且非空
    /// - `Err(AppError::ConfigMissing)` — 列出缺失项，并附带修复命令
    pub fn require(&self, host: &str, keys: &[&str]) -> Result<(), AppError> {
        let missing: Vec<String> = keys
            .iter()
            .filter(|key| self.get_str(key).is_none())
            .map(|key| key.to_string())
            .collect();

        if missing.is_empty() {
            return Ok(());
        }

        let assignments = missing
            .iter()
            .map(|key| format!("{key}=<{}>", key.to_uppercase()))
            .collect::<Vec<_>>()
            .join(" ");
        Err(AppError::ConfigMissing {
            host: host.to_string(),
            keys: missing,
            hint: format!("请执行: picgo config set --host {host} {assignments}"),
        })
    }
}

impl<K: Into<String>, V: Into<Value>> FromIterator<(K, V)> for HostConfig {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self(iter.into_iter().map(|(k, v)| (k.into(), v.into())).collect())
    }
}

// ============================================================================
// AppConfig
// ============================================================================

/// 配置文件的完整结构
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default = "default_host")]
    pub default_host: String,
    #[serde(default = "default_format")]
    pub format: String,
    #[serde(default = "default_true")]
    pub copy_to_clipboard: bool,
    #[serde(default = "default_true")]
    pub history_enabled: bool,
    #[serde(default = "default_hosts")]
    pub hosts: BTreeMap<String, HostConfig>,
    /// 未识别的顶层字段，原样保留
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

fn default_host() -> String {
    DEFAULT_HOST.to_string()
}

fn default_format() -> String {
    DEFAULT_FORMAT.to_string()
}

fn default_true() -> bool {
    true
}

fn default_hosts() -> BTreeMap<String, HostConfig> {
    let mut hosts = BTreeMap::new();
    hosts.insert(
        "github".to_string(),
        HostConfig::new()
            .with("repo", "")
            .with("branch", "main")
            .with("token", "")
            .with("path", ""),
    );
    hosts.insert("smms".to_string(), HostConfig::new().with("token", ""));
    hosts.insert(
        "bilibili".to_string(),
        HostConfig::new().with("sessdata", "").with("bili_jct", ""),
    );
    hosts.insert(
        "mock".to_string(),
        HostConfig::new().with("base_url", "https://mock.example.com"),
    );
    hosts
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            default_host: default_host(),
            format: default_format(),
            copy_to_clipboard: true,
            history_enabled: true,
            hosts: default_hosts(),
            extra: Map::new(),
        }
    }
}

/// 流水线使用的全局配置快照
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GlobalSettings {
    pub default_host: String,
    pub format: String,
    pub copy_to_clipboard: bool,
    pub history_enabled: bool,
}

impl From<&AppConfig> for GlobalSettings {
    fn from(config: &AppConfig) -> Self {
        Self {
            default_host: config.default_host.clone(),
            format: config.format.clone(),
            copy_to_clipboard: config.copy_to_clipboard,
            history_enabled: config.history_enabled,
        }
    }
}

// ============================================================================
// ConfigStore
// ============================================================================

/// 配置存储：内存副本 + 同步落盘
pub struct ConfigStore {
    path: PathBuf,
    data: RwLock<AppConfig>,
}

impl ConfigStore {
    /// 打开指定路径的配置文件并立即加载
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, AppError> {
        let store = Self {
            path: path.into(),
            data: RwLock::new(AppConfig::default()),
        };
        store.load()?;
        Ok(store)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// 从磁盘重新加载配置
    ///
    /// 文件缺失或损坏时写入默认配置（自愈），仅在默认配置也无法落盘时返回错误。
    pub fn load(&self) -> Result<(), AppError> {
        let mut guard = self.write_guard();

        let loaded = match fs::read_to_string(&self.path) {
            Ok(content) => match serde_json::from_str::<AppConfig>(&content) {
                Ok(config) => Some(config),
                Err(err) => {
                    log::warn!("⚠️ 配置文件解析失败，将恢复默认配置: {}", err);
                    self.backup_corrupt_file();
                    None
                }
            },
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                log::info!("📄 配置文件不存在，写入默认配置: {}", self.path.display());
                None
            }
            Err(err) => {
                log::warn!("⚠️ 读取配置文件失败，将恢复默认配置: {}", err);
                self.backup_corrupt_file();
                None
            }
        };

        match loaded {
            Some(config) => *guard = config,
            None => {
                let defaults = AppConfig::default();
                write_json_atomic(&self.path, &defaults)?;
                *guard = defaults;
            }
        }
        Ok(())
    }

    /// 获取某个图床的配置，不存在时返回空映射
    pub fn get_host_config(&self, host: &str) -> HostConfig {
        self.read_guard().hosts.get(host).cloned().unwrap_or_default()
    }

    /// 整体替换某个图床的配置并落盘
    pub fn set_host_config(&self, host: &str, config: HostConfig) -> Result<(), AppError> {
        let mut guard = self.write_guard();
        let mut next = guard.clone();
        next.hosts.insert(host.to_string(), config);
        write_json_atomic(&self.path, &next)?;
        *guard = next;
        log::info!("⚙️ 已更新图床配置: {}", host);
        Ok(())
    }

    /// 浅合并全局配置项并落盘
    ///
    /// 合并后的文档必须仍符合配置结构，否则返回 `ConfigInvalid` 且不做任何修改。
    pub fn set_global_config(&self, values: Map<String, Value>) -> Result<(), AppError> {
        let mut guard = self.write_guard();

        let mut merged = match serde_json::to_value(&*guard)? {
            Value::Object(map) => map,
            _ => Map::new(),
        };
        for (key, value) in values {
            merged.insert(key, value);
        }

        let next: AppConfig =
            serde_json::from_value(Value::Object(merged)).map_err(|e| AppError::ConfigInvalid {
                host: "global".to_string(),
                reason: e.to_string(),
            })?;

        write_json_atomic(&self.path, &next)?;
        *guard = next;
        log::info!("⚙️ 已更新全局配置");
        Ok(())
    }

    /// 全局配置快照
    pub fn global(&self) -> GlobalSettings {
        GlobalSettings::from(&*self.read_guard())
    }

    /// 完整配置快照
    pub fn snapshot(&self) -> AppConfig {
        self.read_guard().clone()
    }

    fn backup_corrupt_file(&self) {
        let mut backup = self.path.as_os_str().to_owned();
        backup.push(".bak");
        if let Err(err) = fs::rename(&self.path, PathBuf::from(&backup)) {
            log::warn!("⚠️ 备份损坏配置文件失败: {}", err);
        }
    }

    fn read_guard(&self) -> RwLockReadGuard<'_, AppConfig> {
        match self.data.read() {
            Ok(guard) => guard,
            Err(poisoned) => {
                log::warn!("配置读取锁中毒，继续使用恢复数据");
                poisoned.into_inner()
            }
        }
    }

    fn write_guard(&self) -> RwLockWriteGuard<'_, AppConfig> {
        match self.data.write() {
            Ok(guard) => guard,
            Err(poisoned) => {
                log::warn!("配置写入锁中毒，继续使用恢复数据");
                poisoned.into_inner()
            }
        }
    }
}
