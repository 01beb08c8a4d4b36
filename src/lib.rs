//! # picgo — 库入口
//!
//! ## 架构总览
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────┐
//! │      入口：CLI (main.rs) ── ClipboardWatcher（轮询线程）   │
//! └───────┬───────────────────────────┬──────────────────────┘
//!         ↓ run(files, host, format)  ↓ 新图片 → 临时 PNG
//! ┌───────┴───────────────────────────┴──────────────────────┐
//! │                    UploadPipeline                        │
//! │                                                          │
//! │  Input 钩子 → BeforeUpload 钩子 → Uploader::upload       │
//! │     → AfterUpload 钩子 → render → 历史 / 剪贴板（副作用）  │
//! │                                                          │
//! │  ┌─ hooks ────── HookBus（分阶段钩子）                    │
//! │  ├─ adapters ─── AdapterRegistry                         │
//! │  │   ├─ github / smms / bilibili   reqwest 阻塞客户端     │
//! │  │   └─ mock                       确定性假图床           │
//! │  ├─ config ───── ConfigStore（JSON，RwLock）              │
//! │  ├─ history ──── HistoryStore（JSON 数组，Mutex）         │
//! │  └─ clipboard ── arboard 读写 + 图片指纹                  │
//! └──────────────────────────────────────────────────────────┘
//! ```
//!
//! ## 模块职责
//!
//! | 模块 | 职责 |
//! |------|------|
//! | [`error`] | 统一错误类型 `AppError` 与非致命的 `SideEffectError` |
//! | [`storage`] | 数据目录解析、原子写 JSON |
//! | [`config`] | 全局配置与按图床划分的配置，持久化到 `config.json` |
//! | [`history`] | 只追加的上传历史，持久化到 `history.json` |
//! | [`hooks`] | 流水线阶段、请求上下文与钩子总线 |
//! | [`render`] | URL 列表渲染为 Markdown / HTML / 裸 URL |
//! | [`adapters`] | `Uploader` 接口、注册表与内置图床 |
//! | [`pipeline`] | 上传编排器 `UploadPipeline` |
//! | [`clipboard`] | 剪贴板读写抽象、系统实现、单次上传与轮询监控器 |
//! | [`plugins`] | 启动时注册额外图床与钩子 |
//! | [`app`] | 组装以上组件 |

pub mod error;
pub mod storage;
pub mod config;
pub mod history;
pub mod hooks;
pub mod render;
pub mod adapters;
pub mod pipeline;
pub mod clipboard;
pub mod plugins;
pub mod app;
