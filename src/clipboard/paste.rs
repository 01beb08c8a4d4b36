//! 单次上传当前剪贴板
//!
//! 位图先编码为临时 PNG 再上传；文件列表中的图片文件直接上传，其余文件忽略。

use std::path::Path;

use super::{ClipboardContent, ClipboardSource, TempPng, image_files};
use crate::error::AppError;
use crate::pipeline::{UploadOutcome, UploadPipeline};

/// 读取一次剪贴板并交给上传流水线
///
/// 剪贴板中既没有位图也没有图片文件时返回 `AppError::NoClipboardImage`，不调用流水线。
pub fn upload_clipboard(
    pipeline: &UploadPipeline,
    source: &dyn ClipboardSource,
    temp_dir: &Path,
    host: Option<&str>,
    format: Option<&str>,
) -> Result<UploadOutcome, AppError> {
    match source.read()? {
        ClipboardContent::Image(image) => {
            log::debug!("🖼️ 剪贴板中是位图 {}x{}", image.width, image.height);
            let temp = TempPng::write(temp_dir, &image)?;
            pipeline.run_detailed(&[temp.path().to_path_buf()], host, format)
        }
        ClipboardContent::Files(paths) => {
            let files = image_files(&paths);
            if files.is_empty() {
                log::info!("📋 剪贴板中的 {} 个文件都不是图片", paths.len());
                return Err(AppError::NoClipboardImage);
            }
            log::debug!("🖼️ 剪贴板中有 {} 个图片文件", files.len());
            pipeline.run_detailed(&files, host, format)
        }
        ClipboardContent::Other => Err(AppError::NoClipboardImage),
    }
}
