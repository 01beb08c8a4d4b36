//! 上传历史模块
//!
//! 只追加的 JSON 数组文档；条目写入后不再修改，只能通过 `clear()` 整体清空。
//! 文件无法解析时 `list()` 按空列表处理；下一次追加前先把原文件备份为
//! `history.json.bak`，再从空列表开始写入。

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::AppError;
use crate::storage::write_json_atomic;

/// 单次上传记录
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryEntry {
    #[serde(alias = "time")]
    pub timestamp: DateTime<Utc>,
    pub host: String,
    pub files: Vec<String>,
    pub urls: Vec<String>,
}

impl HistoryEntry {
    pub fn new(host: &str, files: &[PathBuf], urls: &[String]) -> Self {
        Self {
            timestamp: Utc::now(),
            host: host.to_string(),
            files: files.iter().map(|p| p.to_string_lossy().to_string()).collect(),
            urls: urls.to_vec(),
        }
    }
}

/// 历史记录存储
///
/// 追加是“读取-追加-整体写回”，由内部互斥锁串行化。
pub struct HistoryStore {
    path: PathBuf,
    lock: Mutex<()>,
}

impl HistoryStore {
    /// 打开历史文件，不存在时创建空数组
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, AppError> {
        let store = Self {
            path: path.into(),
            lock: Mutex::new(()),
        };
        if !store.path.exists() {
            write_json_atomic(&store.path, &Vec::<HistoryEntry>::new())?;
        }
        Ok(store)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn append(&self, entry: HistoryEntry) -> Result<(), AppError> {
        let _guard = self.guard();
        let mut entries = match self.read_entries() {
            Ok(entries) => entries,
            Err(err) => {
                log::warn!("⚠️ 历史文件解析失败，备份后重新开始记录: {}", err);
                self.backup_unreadable_file()?;
                Vec::new()
            }
        };
        entries.push(entry);
        write_json_atomic(&self.path, &entries)?;
        log::debug!("🗂️ 已追加上传历史，共 {} 条", entries.len());
        Ok(())
    }

    pub fn list(&self) -> Vec<HistoryEntry> {
        let _guard = self.guard();
        self.read_entries().unwrap_or_else(|err| {
            log::warn!("⚠️ 历史文件解析失败，按空列表处理: {}", err);
            Vec::new()
        })
    }

    pub fn clear(&self) -> Result<(), AppError> {
        let _guard = self.guard();
        write_json_atomic(&self.path, &Vec::<HistoryEntry>::new())?;
        log::info!("🧹 上传历史已清空");
        Ok(())
    }

    /// 文件缺失视为空列表；内容无法解析时返回错误
    fn read_entries(&self) -> Result<Vec<HistoryEntry>, serde_json::Error> {
        match fs::read_to_string(&self.path) {
            Ok(content) => serde_json::from_str(&content),
            Err(_) => Ok(Vec::new()),
        }
    }

    /// 备份失败时拒绝写入，原文件保持不变
    fn backup_unreadable_file(&self) -> Result<(), AppError> {
        let mut backup = self.path.as_os_str().to_owned();
        backup.push(".bak");
        let backup = PathBuf::from(backup);
        fs::rename(&self.path, &backup)?;
        log::info!("🗂️ 已备份无法解析的历史文件: {}", backup.display());
        Ok(())
    }

    fn guard(&self) -> MutexGuard<'_, ()> {
        match self.lock.lock() {
            Ok(guard) => guard,
            Err(poisoned) => {
                log::warn!("历史记录锁中毒，继续使用恢复数据");
                poisoned.into_inner()
            }
        }
    }
}
