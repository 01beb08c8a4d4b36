//! # picgo — 命令行入口
//!
//! 本文件仅负责参数解析、日志初始化与结果输出。
//! 业务逻辑分布在库的各子模块中，详见 `lib.rs` 架构文档。

use std::io::BufRead;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use serde_json::{Map, Value};

use picgo::app::App;
use picgo::clipboard::SystemClipboard;
use picgo::error::AppError;
use picgo::pipeline::UploadOutcome;

#[derive(Parser)]
#[command(name = "picgo")]
#[command(about = "上传图片到图床，并把链接渲染为 Markdown / HTML / URL", long_about = None)]
struct Cli {
    /// 数据目录（默认 $PICGO_HOME 或 ~/.picgo）
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// 上传本地文件，或当前剪贴板中的图片
    Upload {
        #[arg(required_unless_present = "clipboard")]
        files: Vec<PathBuf>,
        /// 上传剪贴板中的位图或图片文件
        #[arg(long, conflicts_with = "files")]
        clipboard: bool,
        /// 图床名称，默认使用配置中的 default_host
        #[arg(long)]
        host: Option<String>,
        /// 输出格式：markdown / html / url
        #[arg(long)]
        format: Option<String>,
    },
    /// 读取或修改配置
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
    /// 上传历史
    History {
        #[command(subcommand)]
        action: HistoryAction,
    },
    /// 监听剪贴板，自动上传新图片（Ctrl+C 或 stdin EOF 退出）
    Watch,
}

#[derive(Subcommand)]
enum ConfigAction {
    /// 打印完整配置，或某个图床的配置
    Get {
        #[arg(long)]
        host: Option<String>,
    },
    /// 写入 key=value；指定 --host 时写入图床配置，否则写入全局配置
    Set {
        #[arg(long)]
        host: Option<String>,
        #[arg(required = true)]
        pairs: Vec<String>,
    },
}

#[derive(Subcommand)]
enum HistoryAction {
    List,
    Clear,
}

fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();
    match run(cli) {
        Ok(code) => code,
        Err(err) => {
            eprintln!("{}", error_report(&err));
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> Result<ExitCode, AppError> {
    let app = App::bootstrap(cli.data_dir)?;

    match cli.command {
        Commands::Upload {
            clipboard: true,
            host,
            format,
            ..
        } => {
            let outcome =
                app.upload_clipboard(&SystemClipboard::new(), host.as_deref(), format.as_deref())?;
            print_outcome(&outcome);
        }
        Commands::Upload {
            files,
            host,
            format,
            ..
        } => {
            let files: Vec<PathBuf> = files
                .into_iter()
                .filter(|path| {
                    let is_file = path.is_file();
                    if !is_file {
                        log::warn!("跳过不存在或非文件的路径: {}", path.display());
                    }
                    is_file
                })
                .collect();
            if files.is_empty() {
                println!("no files found");
                return Ok(ExitCode::FAILURE);
            }

            let outcome = app
                .pipeline
                .run_detailed(&files, host.as_deref(), format.as_deref())?;
            print_outcome(&outcome);
        }
        Commands::Config { action } => match action {
            ConfigAction::Get { host: Some(host) } => {
                print_json(&app.config.get_host_config(&host))?;
            }
            ConfigAction::Get { host: None } => {
                print_json(&app.config.snapshot())?;
            }
            ConfigAction::Set { host, pairs } => {
                let values = parse_pairs(&pairs)?;
                match host {
                    Some(host) => {
                        let mut merged = app.config.get_host_config(&host);
                        for (key, value) in values {
                            merged.insert(key, value);
                        }
                        app.config.set_host_config(&host, merged)?;
                    }
                    None => app.config.set_global_config(values)?,
                }
                println!("ok");
            }
        },
        Commands::History { action } => match action {
            HistoryAction::List => {
                for entry in app.history.list() {
                    println!(
                        "{}  [{}]  {}",
                        entry.timestamp.to_rfc3339(),
                        entry.host,
                        entry.urls.join(" ")
                    );
                }
            }
            HistoryAction::Clear => {
                app.history.clear()?;
                println!("ok");
            }
        },
        Commands::Watch => watch(&app)?,
    }
    Ok(ExitCode::SUCCESS)
}

fn watch(app: &App) -> Result<(), AppError> {
    let watcher = app
        .watcher(Arc::new(SystemClipboard::new()))?
        .with_status_callback(|state| println!("[watch] {state}"));
    watcher.start()?;
    println!("clipboard watcher started, press Ctrl+C or close stdin to stop");

    // 阻塞到 stdin 关闭
    let stdin = std::io::stdin();
    for line in stdin.lock().lines() {
        if line.is_err() {
            break;
        }
    }

    watcher.stop();
    Ok(())
}

/// 错误输出；`ConfigMissing` 的消息已包含修复命令
fn error_report(err: &AppError) -> String {
    format!("Error: {err}")
}

fn print_outcome(outcome: &UploadOutcome) {
    println!("{}", outcome.text);
    for err in &outcome.side_effect_errors {
        eprintln!("warning: {err}");
    }
}

fn print_json<T: serde::Serialize>(value: &T) -> Result<(), AppError> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

/// 解析 `key=value` 列表；值能按 JSON 解析时保留其类型（`true`、`3`），否则作为字符串
fn parse_pairs(pairs: &[String]) -> Result<Map<String, Value>, AppError> {
    let mut values = Map::new();
    for pair in pairs {
        let (key, raw) = pair
            .split_once('=')
            .filter(|(key, _)| !key.trim().is_empty())
            .ok_or_else(|| AppError::ConfigInvalid {
                host: "cli".to_string(),
                reason: format!("参数应为 key=value 形式: '{}'", pair),
            })?;
        let value = serde_json::from_str::<Value>(raw).unwrap_or_else(|_| Value::String(raw.to_string()));
        values.insert(key.trim().to_string(), value);
    }
    Ok(values)
}
