//! 剪贴板模块
//!
//! # 设计思路
//!
//! 统一管理剪贴板相关的核心能力：
//! - **读取**：`ClipboardSource` 抽象“采样一次剪贴板”，区分位图、文件列表与其他内容
//! - **写入**：`ClipboardSink` 抽象“把结果文本复制到剪贴板”，供流水线的副作用步骤使用
//! - **指纹**：`Fingerprint` 对图片像素做 SHA-256，监控器据此去重
//! - **监控**：`watcher` 子模块以轮询方式把新图片送入上传流水线
//! - **单次上传**：`paste` 子模块读取当前剪贴板并立即上传
//!
//! # 实现思路
//!
//! - 两个能力都是 trait，系统实现 `SystemClipboard` 基于 `arboard`，
//!   测试与无头环境可替换为脚本化实现或 `NoopClipboard`。
//! - `SystemClipboard` 在 `Mutex` 中常驻一个 `arboard::Clipboard` 实例：
//!   X11/Wayland 下剪贴板内容由写入方进程持有，实例被销毁后内容会丢失。
//! - 图片以 RGBA 原始像素返回，需要落盘时再通过 `image` crate 编码为 PNG。

pub mod paste;
pub mod watcher;

use std::fmt;
use std::fs;
use std::io::Cursor;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

use chrono::Local;
use image::{ImageFormat, RgbaImage};
use sha2::{Digest, Sha256};

use crate::error::AppError;

pub use paste::upload_clipboard;
pub use watcher::{ClipboardWatcher, StatusCallback, WatcherState};

/// 视为图片的文件扩展名（小写）
const IMAGE_EXTENSIONS: [&str; 6] = ["png", "jpg", "jpeg", "bmp", "gif", "webp"];

// ============================================================================
// 剪贴板内容
// ============================================================================

/// 剪贴板中的位图（RGBA8，行优先）
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClipboardImage {
    pub width: usize,
    pub height: usize,
    pub rgba: Vec<u8>,
}

impl ClipboardImage {
    pub fn new(width: usize, height: usize, rgba: Vec<u8>) -> Self {
        Self {
            width,
            height,
            rgba,
        }
    }

    /// 像素内容指纹，尺寸不同的图片指纹必然不同
    pub fn fingerprint(&self) -> Fingerprint {
        let mut hasher = Sha256::new();
        hasher.update((self.width as u64).to_le_bytes());
        hasher.update((self.height as u64).to_le_bytes());
        hasher.update(&self.rgba);
        Fingerprint(hasher.finalize().into())
    }

    /// 编码为 PNG 字节
    pub fn encode_png(&self) -> Result<Vec<u8>, AppError> {
        let width = u32::try_from(self.width)
            .map_err(|_| AppError::Clipboard(format!("图片宽度超出范围: {}", self.width)))?;
        let height = u32::try_from(self.height)
            .map_err(|_| AppError::Clipboard(format!("图片高度超出范围: {}", self.height)))?;
        let image = RgbaImage::from_raw(width, height, self.rgba.clone())
            .ok_or_else(|| AppError::Clipboard("创建图像缓冲区失败".to_string()))?;

        let mut bytes = Vec::new();
        image
            .write_to(&mut Cursor::new(&mut bytes), ImageFormat::Png)
            .map_err(|e| AppError::Clipboard(format!("PNG 编码失败: {}", e)))?;
        Ok(bytes)
    }
}

/// 一次剪贴板采样的结果
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClipboardContent {
    Image(ClipboardImage),
    /// 文件管理器中复制的文件
    Files(Vec<PathBuf>),
    /// 文本或空剪贴板
    Other,
}

/// 挑出其中存在且扩展名为图片的文件，保持原顺序
pub fn image_files(paths: &[PathBuf]) -> Vec<PathBuf> {
    paths
        .iter()
        .filter(|path| path.is_file())
        .filter(|path| {
            path.extension()
                .and_then(|ext| ext.to_str())
                .map(|ext| IMAGE_EXTENSIONS.contains(&ext.to_ascii_lowercase().as_str()))
                .unwrap_or(false)
        })
        .cloned()
        .collect()
}

/// 剪贴板图片的临时 PNG，离开作用域时删除
pub(crate) struct TempPng {
    path: PathBuf,
}

impl TempPng {
    /// 编码并写入 `<dir>/clip_<时间戳>.png`
    pub(crate) fn write(dir: &Path, image: &ClipboardImage) -> Result<Self, AppError> {
        let png = image.encode_png()?;
        fs::create_dir_all(dir)?;
        let timestamp = Local::now().format("%Y%m%d%H%M%S%f");
        let path = dir.join(format!("clip_{}.png", timestamp));
        fs::write(&path, png)?;
        Ok(Self { path })
    }

    pub(crate) fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for TempPng {
    fn drop(&mut self) {
        if let Err(err) = fs::remove_file(&self.path) {
            log::debug!("清理临时文件失败 {}: {}", self.path.display(), err);
        }
    }
}

/// 图片内容指纹（SHA-256）
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct Fingerprint([u8; 32]);

impl fmt::Debug for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for byte in &self.0[..6] {
            write!(f, "{byte:02x}")?;
        }
        f.write_str("…")
    }
}

// ============================================================================
// 读写能力
// ============================================================================

/// 剪贴板读取能力
pub trait ClipboardSource: Send + Sync {
    fn read(&self) -> Result<ClipboardContent, AppError>;
}

/// 剪贴板写入能力
pub trait ClipboardSink: Send + Sync {
    fn copy_text(&self, text: &str) -> Result<(), AppError>;
}

/// 基于 `arboard` 的系统剪贴板
#[derive(Default)]
pub struct SystemClipboard {
    inner: Mutex<Option<arboard::Clipboard>>,
}

impl SystemClipboard {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Option<arboard::Clipboard>> {
        match self.inner.lock() {
            Ok(guard) => guard,
            Err(poisoned) => {
                log::warn!("剪贴板实例锁中毒，继续使用恢复数据");
                poisoned.into_inner()
            }
        }
    }

    /// 在常驻实例上执行操作，首次使用时创建实例
    fn with_clipboard<T>(
        &self,
        op: impl FnOnce(&mut arboard::Clipboard) -> Result<T, AppError>,
    ) -> Result<T, AppError> {
        let mut guard = self.lock();
        if guard.is_none() {
            let clipboard =
                arboard::Clipboard::new().map_err(|e| AppError::Clipboard(e.to_string()))?;
            *guard = Some(clipboard);
        }
        match guard.as_mut() {
            Some(clipboard) => op(clipboard),
            None => Err(AppError::Clipboard("剪贴板不可用".to_string())),
        }
    }
}

impl ClipboardSource for SystemClipboard {
    fn read(&self) -> Result<ClipboardContent, AppError> {
        self.with_clipboard(|clipboard| {
            match clipboard.get_image() {
                Ok(data) => {
                    return Ok(ClipboardContent::Image(ClipboardImage::new(
                        data.width,
                        data.height,
                        data.bytes.into_owned(),
                    )));
                }
                Err(arboard::Error::ContentNotAvailable) => {}
                Err(err) => return Err(AppError::Clipboard(format!("读取剪贴板图片失败: {}", err))),
            }

            match clipboard.get().file_list() {
                Ok(files) if !files.is_empty() => Ok(ClipboardContent::Files(files)),
                Ok(_) | Err(arboard::Error::ContentNotAvailable) => Ok(ClipboardContent::Other),
                Err(err) => Err(AppError::Clipboard(format!("读取剪贴板文件列表失败: {}", err))),
            }
        })
    }
}

impl ClipboardSink for SystemClipboard {
    fn copy_text(&self, text: &str) -> Result<(), AppError> {
        self.with_clipboard(|clipboard| {
            clipboard
                .set_text(text.to_string())
                .map_err(|e| AppError::Clipboard(format!("复制失败：{}", e)))
        })
    }
}

/// 不访问系统剪贴板的空实现（无头环境、测试）
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopClipboard;

impl ClipboardSource for NoopClipboard {
    fn read(&self) -> Result<ClipboardContent, AppError> {
        Ok(ClipboardContent::Other)
    }
}

impl ClipboardSink for NoopClipboard {
    fn copy_text(&self, _text: &str) -> Result<(), AppError> {
        Ok(())
    }
}
