//! 统一错误类型模块
//!
//! # 设计思路
//!
//! 定义全局统一的 `AppError` 枚举，上传流水线中任何会中止本次 `run()` 的失败
//! 都落在这里：配置缺失、图床未注册、上传失败、钩子失败。
//!
//! 另设 `SideEffectError`，专门承载“上传已成功、但附带动作失败”的情况
//! （写历史、复制到剪贴板）。两者类型不同，调用方与测试可以明确区分
//! “上传失败”与“上传成功但副作用失败”。
//!
//! # 实现思路
//!
//! - 使用 `thiserror` 派生可读错误消息。
//! - 为 `std::io::Error` / `serde_json::Error` 提供 `From` 转换，无需手动 map。
//! - `ConfigMissing` 携带可直接执行的修复命令（`hint`），CLI 原样打印。

use crate::hooks::Phase;

/// 应用级统一错误类型
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    /// 图床必需的配置项缺失或为空
    #[error("图床 {host} 缺少必需配置: {}（{hint}）", .keys.join(", "))]
    ConfigMissing {
        host: String,
        keys: Vec<String>,
        /// 修复建议，通常是一条可执行的 `picgo config set` 命令
        hint: String,
    },

    /// 配置存在但取值不合法
    #[error("图床 {host} 配置无效: {reason}")]
    ConfigInvalid { host: String, reason: String },

    /// 未注册对应名称的图床适配器
    #[error("no adapter registered for host: {host}")]
    AdapterNotFound { host: String },

    /// 远端上传失败（可能带 HTTP 状态码与响应体）
    #[error("{host} 上传失败{}: {message}", .status.map(|s| format!("（HTTP {s}）")).unwrap_or_default())]
    UploadFailed {
        host: String,
        status: Option<u16>,
        message: String,
    },

    /// 流水线钩子返回错误
    #[error("{phase} 阶段钩子执行失败: {message}")]
    HookFailed { phase: Phase, message: String },

    /// 在不可挂载钩子的阶段注册钩子
    #[error("{0} 阶段不可挂载钩子")]
    InvalidHookPhase(Phase),

    /// 剪贴板读写操作失败
    #[error("剪贴板操作失败: {0}")]
    Clipboard(String),

    /// 剪贴板中既没有位图也没有图片文件
    #[error("剪贴板中没有图片")]
    NoClipboardImage,

    /// 数据目录不可用
    #[error("存储目录不可用: {0}")]
    Storage(String),

    /// 文件系统 I/O 错误
    #[error("文件系统错误: {0}")]
    Io(#[from] std::io::Error),

    /// JSON 序列化 / 反序列化失败
    #[error("JSON 处理失败: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl AppError {
    /// 是否属于用户可通过修改配置解决的错误。
    pub fn is_config_error(&self) -> bool {
        matches!(self, Self::ConfigMissing { .. } | Self::ConfigInvalid { .. })
    }

    /// 便捷构造：上传失败（无 HTTP 状态码）。
    pub(crate) fn upload(host: &str, message: impl Into<String>) -> Self {
        Self::UploadFailed {
            host: host.to_string(),
            status: None,
            message: message.into(),
        }
    }
}

/// 非致命副作用错误
///
/// 上传成功后的附带动作失败时产生，只记录日志并回传给调用方，
/// 不会把一次成功的上传变成失败。
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SideEffectError {
    /// 复制结果到剪贴板失败
    #[error("复制到剪贴板失败: {0}")]
    ClipboardCopy(String),

    /// 追加上传历史失败
    #[error("写入上传历史失败: {0}")]
    History(String),
}
