//! 数据目录管理模块
//!
//! # 设计思路
//!
//! 统一管理配置文件、上传历史与剪贴板临时图片的存放位置，支持用户自定义目录，
//! 并在目录不存在时自动创建。
//!
//! # 实现思路
//!
//! - 优先使用显式传入的目录（CLI `--data-dir`）。
//! - 其次读取环境变量 `PICGO_HOME`。
//! - 都未设置时回退到用户主目录下的 `.picgo`。
//! - 目录不存在时自动 `create_dir_all`，避免上层判断。
//! - 所有可能失败的操作均返回 `Result`，不使用 `expect()` / `unwrap()`。

use std::fs;
use std::path::{Path, PathBuf};

use serde::Serialize;

use crate::error::AppError;

/// 覆盖默认数据目录的环境变量名
pub const DATA_DIR_ENV: &str = "PICGO_HOME";

const DEFAULT_DIR_NAME: &str = ".picgo";
const CONFIG_FILE_NAME: &str = "config.json";
const HISTORY_FILE_NAME: &str = "history.json";
const TEMP_DIR_NAME: &str = "tmp";

/// 已解析并确保存在的数据目录
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataDir {
    root: PathBuf,
}

impl DataDir {
    /// 解析数据目录并确保其存在
    ///
    /// # 参数
    /// * `custom_dir` - 用户自定义目录（可选）
    ///
    /// # 返回
    /// - `Ok(DataDir)` — 可用的数据目录
    /// - `Err(AppError::Storage)` — 无法获取或创建目录
    pub fn resolve(custom_dir: Option<PathBuf>) -> Result<Self, AppError> {
        let from_env = std::env::var_os(DATA_DIR_ENV).map(PathBuf::from);
        let root = pick_root(custom_dir, from_env, dirs::home_dir())?;
        Self::at(root)
    }

    /// 直接使用给定目录（测试与嵌入场景）
    pub fn at(root: impl Into<PathBuf>) -> Result<Self, AppError> {
        let root = root.into();
        ensure_dir(&root)?;
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn config_path(&self) -> PathBuf {
        self.root.join(CONFIG_FILE_NAME)
    }

    pub fn history_path(&self) -> PathBuf {
        self.root.join(HISTORY_FILE_NAME)
    }

    /// 剪贴板图片的临时落盘目录（按需创建）
    pub fn temp_dir(&self) -> Result<PathBuf, AppError> {
        let dir = self.root.join(TEMP_DIR_NAME);
        ensure_dir(&dir)?;
        Ok(dir)
    }
}

fn pick_root(
    custom_dir: Option<PathBuf>,
    from_env: Option<PathBuf>,
    home_dir: Option<PathBuf>,
) -> Result<PathBuf, AppError> {
    if let Some(dir) = custom_dir.filter(|d| !d.as_os_str().is_empty()) {
        return Ok(dir);
    }
    if let Some(dir) = from_env.filter(|d| !d.as_os_str().is_empty()) {
        return Ok(dir);
    }
    home_dir
        .map(|home| home.join(DEFAULT_DIR_NAME))
        .ok_or_else(|| AppError::Storage("无法定位用户主目录，请通过 --data-dir 指定".to_string()))
}

/// 以 pretty JSON 形式写入文件：先写同目录临时文件，再 rename 覆盖。
///
/// rename 在同一文件系统内是原子的，进程中途崩溃不会留下半截 JSON。
pub(crate) fn write_json_atomic<T: Serialize + ?Sized>(path: &Path, value: &T) -> Result<(), AppError> {
    if let Some(parent) = path.parent() {
        ensure_dir(parent)?;
    }
    let content = serde_json::to_string_pretty(value)?;
    let mut tmp_name = path.as_os_str().to_owned();
    tmp_name.push(".tmp");
    let tmp_path = PathBuf::from(tmp_name);

    fs::write(&tmp_path, content)?;
    if let Err(err) = fs::rename(&tmp_path, path) {
        let _ = fs::remove_file(&tmp_path);
        return Err(AppError::Io(err));
    }
    Ok(())
}

fn ensure_dir(path: &Path) -> Result<(), AppError> {
    if !path.exists() {
        fs::create_dir_all(path).map_err(|e| {
            AppError::Storage(format!("创建目录 '{}' 失败: {}", path.display(), e))
        })?;
    }
    Ok(())
}
