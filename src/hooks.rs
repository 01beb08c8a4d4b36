//! # 钩子总线（分阶段流水线）
//!
//! ## 设计思路
//!
//! 每次上传请求都会依次经过固定顺序的四个阶段：
//!
//! ```text
//! Input → BeforeUpload → Upload（适配器调用，不可挂载） → AfterUpload
//! ```
//!
//! 外部代码可在 `Input` / `BeforeUpload` / `AfterUpload` 挂载钩子，观察或改写本次请求的
//! `Context`。`Upload` 是编排器调用适配器的边界，不接受钩子。
//!
//! ## 实现思路
//!
//! - `Context` 按值在钩子之间传递：每个钩子接收上一个钩子的输出并返回新的 `Context`，
//!   天然保证顺序执行、互不共享。
//! - 任一钩子返回错误即中止整个上传，错误包装为 `AppError::HookFailed`。
//! - 执行前先复制钩子列表快照（`Arc`），运行期间不持有锁，插件可并发注册。

use std::collections::HashMap;
use std::fmt;
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};

use crate::config::HostConfig;
use crate::error::AppError;

/// 流水线阶段
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Phase {
    Input,
    BeforeUpload,
    Upload,
    AfterUpload,
}

impl Phase {
    /// 全部阶段，按执行顺序排列
    pub const ALL: [Phase; 4] = [
        Phase::Input,
        Phase::BeforeUpload,
        Phase::Upload,
        Phase::AfterUpload,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Input => "input",
            Self::BeforeUpload => "before_upload",
            Self::Upload => "upload",
            Self::AfterUpload => "after_upload",
        }
    }

    /// 是否允许挂载外部钩子
    pub fn is_hookable(self) -> bool {
        !matches!(self, Self::Upload)
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 单次上传请求的上下文
#[derive(Debug, Clone, PartialEq)]
pub struct Context {
    /// 待上传文件，保持调用方给出的顺序
    pub files: Vec<PathBuf>,
    /// 钩子可改写；若只改 host 不改 config，编排器会改用新图床的配置
    pub host: String,
    /// 本次请求使用的图床配置快照
    pub config: HostConfig,
    /// 上传完成前为 `None`
    pub urls: Option<Vec<String>>,
    /// 渲染完成前为 `None`
    pub output_text: Option<String>,
}

impl Context {
    pub fn new(files: Vec<PathBuf>, host: impl Into<String>, config: HostConfig) -> Self {
        Self {
            files,
            host: host.into(),
            config,
            urls: None,
            output_text: None,
        }
    }
}

/// 钩子可返回的任意错误
pub type HookError = Box<dyn std::error::Error + Send + Sync>;

/// 钩子函数：接收上下文，返回（可能被修改的）上下文
pub type Hook = dyn Fn(Context) -> Result<Context, HookError> + Send + Sync;

/// 钩子注册句柄，用于移除
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct HookId(u64);

/// 分阶段钩子总线
#[derive(Default)]
pub struct HookBus {
    hooks: RwLock<HashMap<Phase, Vec<(HookId, Arc<Hook>)>>>,
    next_id: AtomicU64,
}

impl HookBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// 在指定阶段追加钩子
    ///
    /// # 示例
    /// ```rust
    /// use picgo::hooks::{HookBus, Phase};
    ///
    /// let bus = HookBus::new();
    /// bus.add_hook(Phase::BeforeUpload, |ctx| Ok(ctx))?;
    /// assert!(bus.add_hook(Phase::Upload, |ctx| Ok(ctx)).is_err());
    /// # Ok::<(), picgo::error::AppError>(())
    /// ```
    pub fn add_hook<F>(&self, phase: Phase, hook: F) -> Result<HookId, AppError>
    where
        F: Fn(Context) -> Result<Context, HookError> + Send + Sync + 'static,
    {
        if !phase.is_hookable() {
            return Err(AppError::InvalidHookPhase(phase));
        }

        let id = HookId(self.next_id.fetch_add(1, Ordering::Relaxed));
        let mut hooks = match self.hooks.write() {
            Ok(guard) => guard,
            Err(poisoned) => {
                log::warn!("钩子表写入锁中毒，继续使用恢复数据");
                poisoned.into_inner()
            }
        };
        hooks.entry(phase).or_default().push((id, Arc::new(hook)));
        log::debug!("🪝 已注册钩子 {:?} @ {}", id, phase);
        Ok(id)
    }

    /// 移除钩子，返回是否确实移除
    pub fn remove_hook(&self, phase: Phase, id: HookId) -> bool {
        let mut hooks = match self.hooks.write() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        let Some(list) = hooks.get_mut(&phase) else {
            return false;
        };
        let before = list.len();
        list.retain(|(hook_id, _)| *hook_id != id);
        before != list.len()
    }

    pub fn hook_count(&self, phase: Phase) -> usize {
        self.snapshot(phase).len()
    }

    /// 按注册顺序依次执行某阶段的全部钩子
    pub fn run(&self, phase: Phase, ctx: Context) -> Result<Context, AppError> {
        let hooks = self.snapshot(phase);
        if !hooks.is_empty() {
            log::debug!("🪝 执行 {} 阶段钩子，共 {} 个", phase, hooks.len());
        }

        hooks.iter().try_fold(ctx, |ctx, hook| {
            hook(ctx).map_err(|e| AppError::HookFailed {
                phase,
                message: e.to_string(),
            })
        })
    }

    fn snapshot(&self, phase: Phase) -> Vec<Arc<Hook>> {
        let hooks = match self.hooks.read() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        hooks
            .get(&phase)
            .map(|list| list.iter().map(|(_, hook)| Arc::clone(hook)).collect())
            .unwrap_or_default()
    }
}
