//! 剪贴板监控器
//!
//! 后台线程按固定间隔采样剪贴板，发现新图片后写入临时 PNG 并交给上传流水线。
//!
//! 状态机：
//!
//! ```text
//! Idle --start--> Running --stop--> Idle
//! Running -> Uploading -> Uploaded -> Running
//! Running -> Uploading -> Error -> Running
//! Running -> Error（读取失败，仅上报一次）-> Running（下一次成功读取）
//! ```
//!
//! 采样而非订阅：两次采样之间出现又被替换的图片会被错过。

use std::fs;
use std::panic::{self, AssertUnwindSafe};
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::sync::{Arc, Mutex, MutexGuard};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use super::{ClipboardContent, ClipboardImage, ClipboardSource, Fingerprint, TempPng};
use crate::error::AppError;
use crate::pipeline::UploadPipeline;

pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(1);
pub const STOP_JOIN_TIMEOUT: Duration = Duration::from_secs(2);
const MIN_POLL_INTERVAL: Duration = Duration::from_millis(10);
const MAX_POLL_INTERVAL: Duration = Duration::from_secs(60);

/// 监控器状态
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WatcherState {
    Idle,
    Running,
    Uploading,
    Uploaded,
    Error(String),
}

impl WatcherState {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Running => "running",
            Self::Uploading => "uploading",
            Self::Uploaded => "uploaded",
            Self::Error(_) => "error",
        }
    }
}

impl std::fmt::Display for WatcherState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Error(message) => write!(f, "error: {message}"),
            other => f.write_str(other.name()),
        }
    }
}

/// 状态回调，在监控线程上同步调用，实现方需保持快速返回
pub type StatusCallback = Arc<dyn Fn(&WatcherState) + Send + Sync>;

fn normalize_poll_interval(interval: Duration) -> Duration {
    interval.clamp(MIN_POLL_INTERVAL, MAX_POLL_INTERVAL)
}

/// 监控线程与控制端共享的状态
struct Shared {
    state: Mutex<WatcherState>,
    callback: Option<StatusCallback>,
    /// 每次 start/stop 递增；旧线程的上报据此被丢弃
    generation: AtomicU64,
}

impl Shared {
    fn lock_state(&self) -> MutexGuard<'_, WatcherState> {
        match self.state.lock() {
            Ok(guard) => guard,
            Err(poisoned) => {
                log::warn!("监控器状态锁中毒，继续使用恢复数据");
                poisoned.into_inner()
            }
        }
    }

    fn set(&self, next: WatcherState) {
        *self.lock_state() = next.clone();
        log::debug!("📋 监控器状态 → {}", next);
        if let Some(callback) = &self.callback {
            callback(&next);
        }
    }

    /// 仅当上报方仍是当前代的线程时才切换状态
    fn report(&self, generation: u64, next: WatcherState) {
        if self.generation.load(Ordering::SeqCst) == generation {
            self.set(next);
        }
    }
}

struct Worker {
    stop_tx: Sender<()>,
    /// 线程退出时发送端随之销毁，用于有界等待
    exited_rx: Receiver<()>,
    handle: JoinHandle<()>,
}

/// 剪贴板监控器
pub struct ClipboardWatcher {
    pipeline: Arc<UploadPipeline>,
    source: Arc<dyn ClipboardSource>,
    poll_interval: Duration,
    temp_dir: PathBuf,
    shared: Arc<Shared>,
    worker: Mutex<Option<Worker>>,
}

impl ClipboardWatcher {
    pub fn new(pipeline: Arc<UploadPipeline>, source: Arc<dyn ClipboardSource>) -> Self {
        Self {
            pipeline,
            source,
            poll_interval: DEFAULT_POLL_INTERVAL,
            temp_dir: std::env::temp_dir().join("picgo"),
            shared: Arc::new(Shared {
                state: Mutex::new(WatcherState::Idle),
                callback: None,
                generation: AtomicU64::new(0),
            }),
            worker: Mutex::new(None),
        }
    }

    /// 设置状态回调（需在 `start` 之前调用）
    pub fn with_status_callback<F>(mut self, callback: F) -> Self
    where
        F: Fn(&WatcherState) + Send + Sync + 'static,
    {
        self.shared = Arc::new(Shared {
            state: Mutex::new(WatcherState::Idle),
            callback: Some(Arc::new(callback)),
            generation: AtomicU64::new(0),
        });
        self
    }

    /// 设置轮询间隔，限制在 10ms..=60s
    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = normalize_poll_interval(interval);
        self
    }

    /// 设置剪贴板图片的临时落盘目录
    pub fn with_temp_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.temp_dir = dir.into();
        self
    }

    pub fn state(&self) -> WatcherState {
        self.shared.lock_state().clone()
    }

    pub fn is_running(&self) -> bool {
        self.lock_worker().is_some()
    }

    /// 启动后台监控线程；已在运行时不做任何事
    pub fn start(&self) -> Result<(), AppError> {
        let mut worker = self.lock_worker();
        if worker.is_some() {
            log::debug!("📋 剪贴板监控已在运行，忽略重复启动");
            return Ok(());
        }

        fs::create_dir_all(&self.temp_dir)?;

        let generation = self.shared.generation.fetch_add(1, Ordering::SeqCst) + 1;
        let (stop_tx, stop_rx) = mpsc::channel();
        let (exited_tx, exited_rx) = mpsc::channel::<()>();
        let mut poller = Poller {
            pipeline: Arc::clone(&self.pipeline),
            source: Arc::clone(&self.source),
            shared: Arc::clone(&self.shared),
            temp_dir: self.temp_dir.clone(),
            generation,
            last_fingerprint: None,
            read_failing: false,
        };
        let interval = self.poll_interval;

        self.shared.set(WatcherState::Running);
        let handle = thread::Builder::new()
            .name("picgo-clipboard-watcher".to_string())
            .spawn(move || {
                let _exited = exited_tx;
                poller.run(interval, stop_rx);
            })
            .inspect_err(|_| {
                self.shared.generation.fetch_add(1, Ordering::SeqCst);
                self.shared.set(WatcherState::Idle);
            })?;

        *worker = Some(Worker {
            stop_tx,
            exited_rx,
            handle,
        });
        log::info!("📋 剪贴板监控已启动，轮询间隔 {}ms", interval.as_millis());
        Ok(())
    }

    /// 停止监控；未运行时不做任何事
    ///
    /// 正在进行的上传允许完成，最多等待 `STOP_JOIN_TIMEOUT`，超时后线程被分离。
    pub fn stop(&self) {
        let Some(worker) = self.lock_worker().take() else {
            log::debug!("📋 剪贴板监控未运行，忽略停止请求");
            return;
        };

        self.shared.generation.fetch_add(1, Ordering::SeqCst);
        let _ = worker.stop_tx.send(());

        match worker.exited_rx.recv_timeout(STOP_JOIN_TIMEOUT) {
            Err(RecvTimeoutError::Timeout) => {
                log::warn!(
                    "📋 监控线程 {}ms 内未退出，已分离",
                    STOP_JOIN_TIMEOUT.as_millis()
                );
            }
            _ => {
                if worker.handle.join().is_err() {
                    log::warn!("📋 监控线程异常退出");
                }
            }
        }

        self.shared.set(WatcherState::Idle);
        log::info!("📋 剪贴板监控已停止");
    }

    fn lock_worker(&self) -> MutexGuard<'_, Option<Worker>> {
        match self.worker.lock() {
            Ok(guard) => guard,
            Err(poisoned) => {
                log::warn!("监控器线程句柄锁中毒，继续使用恢复数据");
                poisoned.into_inner()
            }
        }
    }
}

impl Drop for ClipboardWatcher {
    fn drop(&mut self) {
        self.stop();
    }
}

// ============================================================================
// 监控线程
// ============================================================================

struct Poller {
    pipeline: Arc<UploadPipeline>,
    source: Arc<dyn ClipboardSource>,
    shared: Arc<Shared>,
    temp_dir: PathBuf,
    generation: u64,
    last_fingerprint: Option<Fingerprint>,
    read_failing: bool,
}

impl Poller {
    fn run(&mut self, interval: Duration, stop_rx: Receiver<()>) {
        loop {
            let outcome = panic::catch_unwind(AssertUnwindSafe(|| self.poll_once()));
            if let Err(payload) = outcome {
                let message = panic_message(payload.as_ref());
                log::error!("📋 剪贴板轮询异常: {}", message);
                self.enter_error(format!("轮询异常: {message}"));
            }

            match stop_rx.recv_timeout(interval) {
                Err(RecvTimeoutError::Timeout) => continue,
                _ => break,
            }
        }
    }

    fn poll_once(&mut self) {
        let content = match self.source.read() {
            Ok(content) => content,
            Err(err) => {
                log::error!("📋 读取剪贴板失败: {}", err);
                self.enter_error(err.to_string());
                return;
            }
        };

        if self.read_failing {
            self.read_failing = false;
            self.shared.report(self.generation, WatcherState::Running);
        }

        match content {
            ClipboardContent::Image(image) => {
                let fingerprint = image.fingerprint();
                if self.last_fingerprint == Some(fingerprint) {
                    log::trace!("⏭️ 剪贴板图片未变化，跳过 {:?}", fingerprint);
                    return;
                }
                log::debug!("🖼️ 检测到新剪贴板图片 {}x{} {:?}", image.width, image.height, fingerprint);
                self.last_fingerprint = Some(fingerprint);
                self.upload(&image);
            }
            ClipboardContent::Files(_) | ClipboardContent::Other => {
                if self.last_fingerprint.take().is_some() {
                    log::debug!("📋 剪贴板已不是图片，清除记忆的指纹");
                }
            }
        }
    }

    /// 读取失败只上报一次，直到下一次成功读取
    fn enter_error(&mut self, message: String) {
        if !self.read_failing {
            self.read_failing = true;
            self.shared.report(self.generation, WatcherState::Error(message));
        }
    }

    fn upload(&self, image: &ClipboardImage) {
        // 上传中途 panic 时同样会删除
        let temp = match TempPng::write(&self.temp_dir, image) {
            Ok(temp) => temp,
            Err(err) => {
                log::error!("📋 剪贴板图片落盘失败: {}", err);
                self.shared.report(self.generation, WatcherState::Error(err.to_string()));
                self.shared.report(self.generation, WatcherState::Running);
                return;
            }
        };

        self.shared.report(self.generation, WatcherState::Uploading);
        let started = Instant::now();
        match self.pipeline.run(&[temp.path().to_path_buf()], None, None) {
            Ok(text) => {
                log::info!(
                    "✅ 剪贴板图片上传完成，耗时 {}ms: {}",
                    started.elapsed().as_millis(),
                    text
                );
                self.shared.report(self.generation, WatcherState::Uploaded);
            }
            Err(err) => {
                log::error!("❌ 剪贴板图片上传失败: {}", err);
                self.shared.report(self.generation, WatcherState::Error(err.to_string()));
            }
        }
        self.shared.report(self.generation, WatcherState::Running);
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
