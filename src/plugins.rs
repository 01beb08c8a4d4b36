//! # 插件机制
//!
//! 插件在启动时向系统贡献图床适配器与流水线钩子。
//!
//! 每个插件的注册先写入暂存区，`register` 成功后才统一提交；
//! 注册失败的插件只记录日志并跳过，不留下半注册状态，也不影响其他插件。

use std::sync::Arc;

use crate::adapters::{AdapterRegistry, Uploader};
use crate::error::AppError;
use crate::hooks::{Context, Hook, HookBus, HookError, Phase};

/// 插件接口
pub trait Plugin: Send + Sync {
    fn name(&self) -> &str;

    fn register(&self, registrar: &mut PluginRegistrar<'_>) -> Result<(), AppError>;
}

/// 插件注册入口
pub struct PluginRegistrar<'a> {
    plugin: &'a str,
    adapters: Vec<(String, Arc<dyn Uploader>)>,
    hooks: Vec<(Phase, Arc<Hook>)>,
}

impl<'a> PluginRegistrar<'a> {
    fn new(plugin: &'a str) -> Self {
        Self {
            plugin,
            adapters: Vec::new(),
            hooks: Vec::new(),
        }
    }

    /// 以适配器自身名称注册图床，同名时覆盖已有实现
    pub fn add_adapter(&mut self, adapter: Arc<dyn Uploader>) {
        let name = adapter.name().to_string();
        self.adapters.push((name, adapter));
    }

    /// 注册流水线钩子，`Upload` 阶段会被拒绝
    pub fn add_hook<F>(&mut self, phase: Phase, hook: F) -> Result<(), AppError>
    where
        F: Fn(Context) -> Result<Context, HookError> + Send + Sync + 'static,
    {
        if !phase.is_hookable() {
            return Err(AppError::InvalidHookPhase(phase));
        }
        self.hooks.push((phase, Arc::new(hook)));
        Ok(())
    }

    fn commit(self, registry: &mut AdapterRegistry, bus: &HookBus) -> Result<(), AppError> {
        for (name, adapter) in self.adapters {
            log::debug!("🔌 插件 {} 提供图床 {}", self.plugin, name);
            registry.register_as(name, adapter);
        }
        for (phase, hook) in self.hooks {
            bus.add_hook(phase, move |ctx| hook(ctx))?;
        }
        Ok(())
    }
}

/// 启动时依次加载插件
#[derive(Default)]
pub struct PluginLoader {
    plugins: Vec<Box<dyn Plugin>>,
}

impl PluginLoader {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_plugin(mut self, plugin: impl Plugin + 'static) -> Self {
        self.plugins.push(Box::new(plugin));
        self
    }

    pub fn add(&mut self, plugin: Box<dyn Plugin>) {
        self.plugins.push(plugin);
    }

    /// 注册全部插件，返回成功加载的插件名
    pub fn load_all(&self, registry: &mut AdapterRegistry, bus: &HookBus) -> Vec<String> {
        let mut loaded = Vec::new();
        for plugin in &self.plugins {
            let name = plugin.name();
            let mut registrar = PluginRegistrar::new(name);
            let result = plugin
                .register(&mut registrar)
                .and_then(|()| registrar.commit(registry, bus));
            match result {
                Ok(()) => {
                    log::info!("🧩 已加载插件: {}", name);
                    loaded.push(name.to_string());
                }
                Err(err) => log::warn!("⚠️ 插件 {} 加载失败，已跳过: {}", name, err),
            }
        }
        loaded
    }
}
