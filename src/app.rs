//! # 启动装配
//!
//! 把数据目录、配置、历史、钩子总线、图床注册表与插件组装成一个可用的 `App`。
//! 所有组件以 `Arc` 持有，由入口（CLI / 监控）显式传递，不使用全局单例。

use std::path::PathBuf;
use std::sync::Arc;

use crate::adapters::AdapterRegistry;
use crate::clipboard::{
    ClipboardSink, ClipboardSource, ClipboardWatcher, SystemClipboard, upload_clipboard,
};
use crate::config::ConfigStore;
use crate::error::AppError;
use crate::history::HistoryStore;
use crate::hooks::HookBus;
use crate::pipeline::{UploadOutcome, UploadPipeline};
use crate::plugins::{Plugin, PluginLoader};
use crate::storage::DataDir;

/// 已装配完成的应用
pub struct App {
    pub data_dir: DataDir,
    pub config: Arc<ConfigStore>,
    pub history: Arc<HistoryStore>,
    pub hooks: Arc<HookBus>,
    pub pipeline: Arc<UploadPipeline>,
    /// 成功加载的插件名
    pub plugins: Vec<String>,
}

impl App {
    /// 使用默认数据目录与系统剪贴板装配
    pub fn bootstrap(data_dir: Option<PathBuf>) -> Result<Self, AppError> {
        AppBuilder::new().data_dir(data_dir).build()
    }

    /// 创建绑定到本应用流水线的剪贴板监控器，临时图片写入数据目录下的 `tmp/`
    pub fn watcher(&self, source: Arc<dyn ClipboardSource>) -> Result<ClipboardWatcher, AppError> {
        Ok(ClipboardWatcher::new(Arc::clone(&self.pipeline), source)
            .with_temp_dir(self.data_dir.temp_dir()?))
    }

    /// 立即上传当前剪贴板中的图片
    pub fn upload_clipboard(
        &self,
        source: &dyn ClipboardSource,
        host: Option<&str>,
        format: Option<&str>,
    ) -> Result<UploadOutcome, AppError> {
        let temp_dir = self.data_dir.temp_dir()?;
        upload_clipboard(&self.pipeline, source, &temp_dir, host, format)
    }
}

/// `App` 构建器
#[derive(Default)]
pub struct AppBuilder {
    data_dir: Option<PathBuf>,
    plugins: PluginLoader,
    clipboard: Option<Arc<dyn ClipboardSink>>,
}

impl AppBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// 自定义数据目录；`None` 时依次使用 `PICGO_HOME` 与 `~/.picgo`
    pub fn data_dir(mut self, dir: Option<PathBuf>) -> Self {
        self.data_dir = dir;
        self
    }

    pub fn plugin(mut self, plugin: impl Plugin + 'static) -> Self {
        self.plugins.add(Box::new(plugin));
        self
    }

    /// 替换结果复制所用的剪贴板写入端，默认为系统剪贴板
    pub fn clipboard(mut self, sink: Arc<dyn ClipboardSink>) -> Self {
        self.clipboard = Some(sink);
        self
    }

    pub fn build(self) -> Result<App, AppError> {
        let data_dir = DataDir::resolve(self.data_dir)?;
        log::info!("📁 数据目录: {}", data_dir.root().display());

        let config = Arc::new(ConfigStore::open(data_dir.config_path())?);
        let history = Arc::new(HistoryStore::open(data_dir.history_path())?);
        let hooks = Arc::new(HookBus::new());

        let mut registry = AdapterRegistry::with_builtin();
        let plugins = self.plugins.load_all(&mut registry, &hooks);
        log::debug!(
            "🔌 可用图床: {}（插件 {} 个）",
            registry.names().join(", "),
            plugins.len()
        );

        let clipboard = self
            .clipboard
            .unwrap_or_else(|| Arc::new(SystemClipboard::new()));
        let pipeline = UploadPipeline::new(Arc::new(registry), Arc::clone(&config), Arc::clone(&history))
            .with_hooks(Arc::clone(&hooks))
            .with_clipboard(clipboard);

        Ok(App {
            data_dir,
            config,
            history,
            hooks,
            pipeline: Arc::new(pipeline),
            plugins,
        })
    }
}
