//! 集成测试共用的临时目录、脚本化剪贴板与计数图床
#![allow(dead_code)]

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

use picgo::adapters::{AdapterRegistry, Uploader};
use picgo::clipboard::ClipboardSink;
use picgo::config::{ConfigStore, HostConfig};
use picgo::error::AppError;
use picgo::history::HistoryStore;
use picgo::pipeline::UploadPipeline;

pub fn unique_temp_dir(prefix: &str) -> PathBuf {
    static COUNTER: AtomicU64 = AtomicU64::new(0);
    let seq = COUNTER.fetch_add(1, Ordering::Relaxed);
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("clock error")
        .as_nanos();
    let dir = std::env::temp_dir().join(format!(
        "picgo-{prefix}-{}-{nanos}-{seq}",
        std::process::id()
    ));
    std::fs::create_dir_all(&dir).expect("create temp dir");
    dir
}

/// 轮询等待条件成立，超时返回 false
pub fn wait_until(timeout: Duration, mut condition: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + timeout;
    while Instant::now() < deadline {
        if condition() {
            return true;
        }
        std::thread::sleep(Duration::from_millis(5));
    }
    condition()
}

/// 记录每次调用的图床，可配置为总是失败
pub struct CountingAdapter {
    name: &'static str,
    fail: bool,
    calls: AtomicUsize,
    /// 每次调用时文件是否存在
    seen_files: Mutex<Vec<(PathBuf, bool)>>,
}

impl CountingAdapter {
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            fail: false,
            calls: AtomicUsize::new(0),
            seen_files: Mutex::new(Vec::new()),
        }
    }

    pub fn failing(name: &'static str) -> Self {
        Self {
            fail: true,
            ..Self::new(name)
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn seen_files(&self) -> Vec<(PathBuf, bool)> {
        self.seen_files.lock().unwrap().clone()
    }
}

impl Uploader for CountingAdapter {
    fn name(&self) -> &str {
        self.name
    }

    fn upload(&self, files: &[PathBuf], _config: &HostConfig) -> Result<Vec<String>, AppError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        {
            let mut seen = self.seen_files.lock().unwrap();
            for file in files {
                seen.push((file.clone(), file.exists()));
            }
        }
        if self.fail {
            return Err(AppError::UploadFailed {
                host: self.name.to_string(),
                status: Some(503),
                message: "service unavailable".to_string(),
            });
        }
        Ok(files
            .iter()
            .enumerate()
            .map(|(i, _)| format!("https://{}.test/{}.png", self.name, i))
            .collect())
    }
}

/// 记录复制内容的剪贴板写入端
#[derive(Default)]
pub struct RecordingSink {
    pub fail: bool,
    pub copied: Mutex<Vec<String>>,
}

impl RecordingSink {
    pub fn failing() -> Self {
        Self {
            fail: true,
            copied: Mutex::new(Vec::new()),
        }
    }

    pub fn copied(&self) -> Vec<String> {
        self.copied.lock().unwrap().clone()
    }
}

impl ClipboardSink for RecordingSink {
    fn copy_text(&self, text: &str) -> Result<(), AppError> {
        if self.fail {
            return Err(AppError::Clipboard("no display".to_string()));
        }
        self.copied.lock().unwrap().push(text.to_string());
        Ok(())
    }
}

pub struct Fixture {
    pub dir: PathBuf,
    pub config: Arc<ConfigStore>,
    pub history: Arc<HistoryStore>,
}

impl Fixture {
    pub fn new(prefix: &str) -> Self {
        let dir = unique_temp_dir(prefix);
        let config = Arc::new(ConfigStore::open(dir.join("config.json")).expect("open config"));
        let history = Arc::new(HistoryStore::open(dir.join("history.json")).expect("open history"));
        Self {
            dir,
            config,
            history,
        }
    }

    pub fn path(&self) -> &Path {
        &self.dir
    }

    /// 内置图床 + 额外图床组成的流水线
    pub fn pipeline(
        &self,
        extra: Vec<Arc<dyn Uploader>>,
        sink: Arc<dyn ClipboardSink>,
    ) -> UploadPipeline {
        let mut registry = AdapterRegistry::with_builtin();
        for adapter in extra {
            registry.register(adapter);
        }
        UploadPipeline::new(
            Arc::new(registry),
            Arc::clone(&self.config),
            Arc::clone(&self.history),
        )
        .with_clipboard(sink)
    }

    pub fn set_global(&self, key: &str, value: serde_json::Value) {
        let mut map = serde_json::Map::new();
        map.insert(key.to_string(), value);
        self.config.set_global_config(map).expect("set global config");
    }
}

impl Drop for Fixture {
    fn drop(&mut self) {
        let _ = std::fs::remove_dir_all(&self.dir);
    }
}
