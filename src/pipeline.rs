//! # 上传编排器
//!
//! ## 设计思路
//!
//! `UploadPipeline` 是所有入口（CLI、剪贴板监控、插件）共用的唯一上传路径：
//!
//! ```text
//! 解析 host/format → Input 钩子 → BeforeUpload 钩子 → 适配器上传
//!   → AfterUpload 钩子 → 渲染 → 写历史（副作用）→ 复制到剪贴板（副作用）
//! ```
//!
//! 主链路上的任何失败都会中止本次调用并原样返回；上传成功后的副作用失败
//! 只记录日志，并以 `SideEffectError` 形式放入 `UploadOutcome`。
//!
//! ## 实现思路
//!
//! - 依赖（注册表、配置、历史、钩子总线、剪贴板写入端）全部通过 `Arc` 注入，
//!   测试可为每个用例创建独立实例。
//! - 编排器本身无可变状态，可跨线程共享并发调用；
//!   并发写文件的串行化由 `ConfigStore` / `HistoryStore` 内部负责。
//! - 记录 `hooks/upload/render/total` 阶段耗时，便于性能诊断。

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use crate::adapters::AdapterRegistry;
use crate::clipboard::{ClipboardSink, SystemClipboard};
use crate::config::ConfigStore;
use crate::error::{AppError, SideEffectError};
use crate::history::{HistoryEntry, HistoryStore};
use crate::hooks::{Context, HookBus, Phase};
use crate::render::render;

/// 一次成功上传的完整结果
#[derive(Debug, Clone, PartialEq)]
pub struct UploadOutcome {
    pub host: String,
    pub format: String,
    pub urls: Vec<String>,
    /// 渲染后的文本，与 `run` 的返回值相同
    pub text: String,
    /// 上传成功后失败的附带动作
    pub side_effect_errors: Vec<SideEffectError>,
}

/// 上传编排器
pub struct UploadPipeline {
    registry: Arc<AdapterRegistry>,
    config: Arc<ConfigStore>,
    history: Arc<HistoryStore>,
    hooks: Arc<HookBus>,
    clipboard: Arc<dyn ClipboardSink>,
}

impl UploadPipeline {
    pub fn new(
        registry: Arc<AdapterRegistry>,
        config: Arc<ConfigStore>,
        history: Arc<HistoryStore>,
    ) -> Self {
        Self {
            registry,
            config,
            history,
            hooks: Arc::new(HookBus::new()),
            clipboard: Arc::new(SystemClipboard::new()),
        }
    }

    pub fn with_hooks(mut self, hooks: Arc<HookBus>) -> Self {
        self.hooks = hooks;
        self
    }

    /// 替换结果复制所用的剪贴板写入端
    pub fn with_clipboard(mut self, clipboard: Arc<dyn ClipboardSink>) -> Self {
        self.clipboard = clipboard;
        self
    }

    pub fn registry(&self) -> &Arc<AdapterRegistry> {
        &self.registry
    }

    pub fn config(&self) -> &Arc<ConfigStore> {
        &self.config
    }

    pub fn history(&self) -> &Arc<HistoryStore> {
        &self.history
    }

    pub fn hooks(&self) -> &Arc<HookBus> {
        &self.hooks
    }

    /// 上传文件并返回渲染后的文本
    ///
    /// `host` / `format` 为 `None` 时使用全局配置中的默认值。
    pub fn run(
        &self,
        files: &[PathBuf],
        host: Option<&str>,
        format: Option<&str>,
    ) -> Result<String, AppError> {
        self.run_detailed(files, host, format).map(|outcome| outcome.text)
    }

    /// 与 `run` 相同，但返回包含副作用错误在内的完整结果
    pub fn run_detailed(
        &self,
        files: &[PathBuf],
        host: Option<&str>,
        format: Option<&str>,
    ) -> Result<UploadOutcome, AppError> {
        let total_start = Instant::now();
        let global = self.config.global();
        let host = host.map(str::to_string).unwrap_or(global.default_host);
        let format = format.map(str::to_string).unwrap_or(global.format);

        log::debug!("🚀 开始上传 {} 个文件 → {}（{}）", files.len(), host, format);
        let initial_config = self.config.get_host_config(&host);
        let ctx = Context::new(files.to_vec(), host.clone(), initial_config.clone());

        let hooks_start = Instant::now();
        let ctx = self.hooks.run(Phase::Input, ctx)?;
        let mut ctx = self.hooks.run(Phase::BeforeUpload, ctx)?;
        let mut hooks_elapsed = hooks_start.elapsed();

        // 钩子改了 host 却没改 config 时，换成新图床的配置
        if ctx.host != host && ctx.config == initial_config {
            log::debug!("🪝 钩子将图床由 {} 改为 {}，重新读取配置", host, ctx.host);
            ctx.config = self.config.get_host_config(&ctx.host);
        }

        let adapter = self
            .registry
            .resolve(&ctx.host)
            .ok_or_else(|| AppError::AdapterNotFound {
                host: ctx.host.clone(),
            })?;

        let upload_start = Instant::now();
        let urls = adapter.upload(&ctx.files, &ctx.config)?;
        let upload_elapsed = upload_start.elapsed();
        ctx.urls = Some(urls);

        let after_start = Instant::now();
        let mut ctx = self.hooks.run(Phase::AfterUpload, ctx)?;
        hooks_elapsed += after_start.elapsed();

        let render_start = Instant::now();
        let urls = ctx.urls.take().unwrap_or_default();
        let text = render(&format, &urls);
        ctx.output_text = Some(text.clone());
        let render_elapsed = render_start.elapsed();

        let mut side_effect_errors = Vec::new();

        if global.history_enabled && !urls.is_empty() {
            let entry = HistoryEntry::new(&ctx.host, &ctx.files, &urls);
            if let Err(err) = self.history.append(entry) {
                log::warn!("⚠️ 写入上传历史失败（上传已成功）: {}", err);
                side_effect_errors.push(SideEffectError::History(err.to_string()));
            }
        }

        if global.copy_to_clipboard && !text.is_empty() {
            if let Err(err) = self.clipboard.copy_text(&text) {
                log::warn!("⚠️ 复制结果到剪贴板失败（上传已成功）: {}", err);
                side_effect_errors.push(SideEffectError::ClipboardCopy(err.to_string()));
            }
        }

        log::info!(
            "✅ 上传完成 - host={} files={} hooks={}ms upload={}ms render={}ms total={}ms",
            ctx.host,
            ctx.files.len(),
            hooks_elapsed.as_millis(),
            upload_elapsed.as_millis(),
            render_elapsed.as_millis(),
            total_start.elapsed().as_millis()
        );

        Ok(UploadOutcome {
            host: ctx.host,
            format,
            urls,
            text,
            side_effect_errors,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clipboard::NoopClipboard;
    use crate::config::HostConfig;
    use std::sync::atomic::{AtomicU64, Ordering};

    fn unique_temp_dir() -> PathBuf {
        static COUNTER: AtomicU64 = AtomicU64::new(0);
        let seq = COUNTER.fetch_add(1, Ordering::Relaxed);
        let nanos = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .expect("clock error")
            .as_nanos();
        let dir = std::env::temp_dir().join(format!(
            "picgo-pipeline-test-{}-{nanos}-{seq}",
            std::process::id()
        ));
        std::fs::create_dir_all(&dir).expect("create temp dir");
        dir
    }

    fn pipeline(dir: &std::path::Path) -> UploadPipeline {
        let config = Arc::new(ConfigStore::open(dir.join("config.json")).unwrap());
        let history = Arc::new(HistoryStore::open(dir.join("history.json")).unwrap());
        UploadPipeline::new(Arc::new(AdapterRegistry::with_builtin()), config, history)
            .with_clipboard(Arc::new(NoopClipboard))
    }

    #[test]
    fn explicit_host_and_format_override_defaults() {
        let dir = unique_temp_dir();
        let pipeline = pipeline(&dir);

        let outcome = pipeline
            .run_detailed(&[PathBuf::from("/tmp/a.png")], Some("mock"), Some("url"))
            .unwrap();
        assert_eq!(outcome.host, "mock");
        assert_eq!(outcome.format, "url");
        assert_eq!(outcome.text, outcome.urls[0]);
        assert!(outcome.side_effect_errors.is_empty());

        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn default_host_comes_from_global_config() {
        let dir = unique_temp_dir();
        let pipeline = pipeline(&dir);
        let mut global = serde_json::Map::new();
        global.insert("default_host".into(), "mock".into());
        pipeline.config().set_global_config(global).unwrap();
        pipeline
            .config()
            .set_host_config("mock", HostConfig::new().with("base_url", "https://img.test"))
            .unwrap();

        let text = pipeline.run(&[PathBuf::from("a.png")], None, None).unwrap();
        assert!(text.starts_with("![](https://img.test/"), "got {text}");

        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn missing_github_config_fails_before_history() {
        let dir = unique_temp_dir();
        let pipeline = pipeline(&dir);

        let err = pipeline
            .run(&[PathBuf::from("a.png")], Some("github"), None)
            .expect_err("github without token must fail");
        assert!(err.is_config_error());
        assert!(pipeline.history().list().is_empty());

        let _ = std::fs::remove_dir_all(&dir);
    }
}
