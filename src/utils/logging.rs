/// 日志工具模块
///
/// 负责初始化 tracing，并提供批处理各阶段的日志输出
use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::Path;
use std::sync::Mutex;

use anyhow::{Context, Result};
use tracing::info;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};

use crate::models::{BatchSummary, OutcomeStatus};

/// 初始化日志：同时输出到终端和日志文件
///
/// `RUST_LOG` 优先于 `level`。只应调用一次
pub fn init(level: &str, log_file_path: &Path) -> Result<()> {
    let log_file = init_log_file(log_file_path)?;

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_target(false))
        .with(
            fmt::layer()
                .with_target(false)
                .with_ansi(false)
                .with_writer(Mutex::new(log_file)),
        )
        .try_init()
        .context("日志系统已经初始化")?;

    Ok(())
}

/// 打开日志文件（追加模式）并写入本次运行的头部
fn init_log_file(log_file_path: &Path) -> Result<File> {
    if let Some(parent) = log_file_path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("无法创建日志目录: {}", parent.display()))?;
    }
    let mut file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(log_file_path)
        .with_context(|| format!("无法打开日志文件: {}", log_file_path.display()))?;

    let log_header = format!(
        "{}\nPDF 下载日志 - {}\n{}\n",
        "=".repeat(60),
        chrono::Local::now().format("%Y-%m-%d %H:%M:%S"),
        "=".repeat(60)
    );
    file.write_all(log_header.as_bytes())?;
    Ok(file)
}

/// 记录程序启动信息
pub fn log_startup(total_links: usize, output_dir: &Path) {
    info!("{}", "=".repeat(60));
    info!("🚀 程序启动 - 顺序下载模式");
    info!("🔗 待处理链接: {}", total_links);
    info!("📂 输出目录: {}", output_dir.display());
    info!("{}", "=".repeat(60));
}

/// 记录阶段切换
pub fn log_phase(title: &str, count: usize) {
    info!("\n{}", "=".repeat(60));
    info!("📦 {} ({} 个)", title, count);
    info!("{}", "=".repeat(60));
}

/// 记录单个条目开始
pub fn log_unit_start(label: &str, index: usize, total: usize) {
    info!("\n{}", "─".repeat(60));
    info!("{} {}/{}", label, index, total);
    info!("{}", "─".repeat(60));
}

/// 打印最终统计信息
pub fn print_summary(summary: &BatchSummary) {
    info!("\n{}", "=".repeat(60));
    info!("📊 下载汇总");
    info!(
        "完成时间: {}",
        chrono::Local::now().format("%Y-%m-%d %H:%M:%S")
    );
    info!("{}", "=".repeat(60));
    info!("总计: {}", summary.total());
    info!("✅ 成功: {}", summary.success_count());
    info!("❌ 失败: {}", summary.failed_count());
    info!("{}", "=".repeat(60));

    for outcome in summary.outcomes() {
        let icon = match outcome.status {
            OutcomeStatus::Success => "[OK]",
            OutcomeStatus::Failed => "[FAIL]",
        };
        info!("{} {}", icon, outcome.resource);
        info!("  {}", outcome.detail);
    }
}

/// 截断长文本用于日志显示
pub fn truncate_text(text: &str, max_len: usize) -> String {
    if text.chars().count() > max_len {
        text.chars().take(max_len).collect::<String>() + "..."
    } else {
        text.to_string()
    }
}
