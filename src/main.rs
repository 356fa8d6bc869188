use std::path::PathBuf;
use std::process::ExitCode;
use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{CommandFactory, Parser};
use tracing::{error, info, warn};

use drive_pdf_capture::error::{AppError, InputError};
use drive_pdf_capture::models::load_urls_from_file;
use drive_pdf_capture::services::sweep_stale_workspaces;
use drive_pdf_capture::utils::logging;
use drive_pdf_capture::{App, Config};

/// 用户中断时的退出码
const INTERRUPTED_EXIT_CODE: u8 = 130;

/// 从 Google Drive 在线预览中抓取 PDF
#[derive(Parser, Debug)]
#[command(
    name = "drive-pdf-capture",
    version,
    about = "Capture view-only Google Drive PDFs (files or whole folders) as local PDF files",
    after_help = "Examples:\n  \
        drive-pdf-capture --link \"https://drive.google.com/file/d/XXXXX/view\"\n  \
        drive-pdf-capture --link \"https://drive.google.com/drive/folders/XXXXX\"\n  \
        drive-pdf-capture --file links.csv --headless"
)]
struct Cli {
    /// Single Google Drive file or folder link
    #[arg(short, long)]
    link: Option<String>,

    /// Text or CSV file with one link per line
    #[arg(short, long, value_name = "PATH")]
    file: Option<PathBuf>,

    /// Run the browser in headless mode
    #[arg(long)]
    headless: bool,

    /// Page load timeout in seconds
    #[arg(long, value_name = "SECS")]
    timeout: Option<u64>,

    /// Output directory
    #[arg(short, long, value_name = "DIR")]
    output: Option<PathBuf>,

    /// TOML config file
    #[arg(short, long, env = "GDDOWN_CONFIG", value_name = "PATH")]
    config: Option<PathBuf>,

    /// Chrome/Chromium executable
    #[arg(long, value_name = "PATH")]
    chrome: Option<PathBuf>,

    /// Attach to a running browser on this remote debugging port instead of launching one
    #[arg(long, value_name = "PORT")]
    debug_port: Option<u16>,

    /// JPEG quality used when flattening transparent pages
    #[arg(short, long, value_parser = clap::value_parser!(u8).range(1..=100))]
    quality: Option<u8>,

    /// Maximum pages captured per document
    #[arg(long, value_name = "N")]
    max_pages: Option<usize>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, value_name = "LEVEL")]
    log_level: Option<String>,
}

impl Cli {
    /// 命令行参数覆盖配置
    fn apply(&self, mut config: Config) -> Config {
        if self.headless {
            config.headless = true;
        }
        if let Some(timeout) = self.timeout {
            config.timeout_secs = timeout;
        }
        if let Some(output) = &self.output {
            config.output_dir = output.clone();
        }
        if let Some(chrome) = &self.chrome {
            config.chrome_path = Some(chrome.clone());
        }
        if let Some(port) = self.debug_port {
            config.debug_port = Some(port);
        }
        if let Some(quality) = self.quality {
            config.image_quality = quality;
        }
        if let Some(max_pages) = self.max_pages {
            config.max_pages = max_pages;
        }
        if let Some(level) = &self.log_level {
            config.log_level = level.clone();
        }
        config
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    if cli.link.is_none() && cli.file.is_none() {
        let _ = Cli::command().print_help();
        return ExitCode::from(1);
    }

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) if is_interrupted(&e) => {
            info!("下载已被用户中断");
            ExitCode::from(INTERRUPTED_EXIT_CODE)
        }
        Err(e) => {
            // 日志系统可能还没初始化
            error!("❌ 致命错误: {:#}", e);
            eprintln!("Fatal error: {:#}", e);
            ExitCode::from(1)
        }
    }
}

async fn run(cli: Cli) -> Result<()> {
    // 加载配置
    let base = match &cli.config {
        Some(path) => Config::from_file(path)?,
        None => Config::default(),
    };
    let config = cli.apply(base.with_env_overrides());
    config.validate()?;

    // 初始化日志
    logging::init(&config.log_level, &config.log_file)?;

    sweep_stale_workspaces(&config.temp_dir);

    let urls = collect_urls(&cli).await?;

    // 初始化并运行应用
    let app = App::initialize(config).await?;

    let cancel = app.cancel_flag();
    tokio::spawn(async move {
        if watch_interrupts(tokio::signal::ctrl_c, cancel).await {
            std::process::exit(INTERRUPTED_EXIT_CODE.into());
        }
    });

    let result = app.run(&urls).await;
    app.shutdown().await;
    result.map(|_| ())
}

/// 合并 --link 与 --file 中的链接
async fn collect_urls(cli: &Cli) -> Result<Vec<String>> {
    let mut urls = Vec::new();
    if let Some(link) = &cli.link {
        urls.push(link.trim().to_string());
    }
    if let Some(path) = &cli.file {
        let loaded = load_urls_from_file(path)
            .await
            .with_context(|| format!("无法读取链接文件: {}", path.display()))?;
        urls.extend(loaded);
    }

    if urls.is_empty() {
        return Err(AppError::from(InputError::NoUrls).into());
    }
    Ok(urls)
}

/// 第一次中断信号置位取消标志，当前文件完成后停止；第二次返回 true，由调用方立即退出
async fn watch_interrupts<S, F>(mut signal: S, cancel: Arc<AtomicBool>) -> bool
where
    S: FnMut() -> F,
    F: Future<Output = std::io::Result<()>>,
{
    if signal().await.is_err() {
        return false;
    }
    warn!("\n⚠️ 收到中断信号，当前文件完成后停止（再按一次 Ctrl-C 立即退出）...");
    cancel.store(true, Ordering::SeqCst);

    if signal().await.is_err() {
        return false;
    }
    warn!("⚠️ 再次收到中断信号，立即退出");
    true
}

fn is_interrupted(e: &anyhow::Error) -> bool {
    e.chain()
        .any(|cause| cause.downcast_ref::<AppError>().is_some_and(AppError::is_interrupted))
}
