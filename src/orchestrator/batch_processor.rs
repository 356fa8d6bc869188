//! 批量处理器 - 编排层
//!
//! ## 职责
//!
//! 本模块是整个应用的入口，负责批量资源的调度和浏览器资源管理。
//!
//! ## 状态流转
//!
//! ```text
//! Init → ExpandFolders → ProcessFolderFiles → ProcessStandaloneFiles → Summarize → Done
//! ```
//!
//! - 所有文件夹先展开，再依次处理文件夹中的文件，最后处理单独的文件
//! - 严格顺序执行，同一时间只打开一个资源
//! - 单个文件/文件夹的失败只记录结果，不会中断整批
//! - 用户中断在两个文件/文件夹之间生效

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use tokio::time::sleep;
use tracing::{error, info, warn};

use crate::browser::LaunchOptions;
use crate::config::Config;
use crate::error::AppError;
use crate::infrastructure::{BrowserSession, ViewOpener};
use crate::models::{BatchOutcome, BatchSummary, ResourceKind, ResourceRef};
use crate::orchestrator::folder_expander::FolderExpander;
use crate::utils::logging::{log_phase, log_startup, log_unit_start, print_summary, truncate_text};
use crate::workflow::{DocumentCtx, DocumentFlow};

/// 批处理阶段
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BatchPhase {
    Init,
    ExpandFolders,
    ProcessFolderFiles,
    ProcessStandaloneFiles,
    Summarize,
    Done,
}

/// 一次批处理的工作集
#[derive(Debug, Default)]
struct BatchState {
    folders: Vec<ResourceRef>,
    folder_files: Vec<ResourceRef>,
    standalone: Vec<ResourceRef>,
    summary: BatchSummary,
}

/// 应用主结构
///
/// 唯一持有浏览器（`ViewOpener`）的模块，整批共享
pub struct App<O: ViewOpener = BrowserSession> {
    config: Config,
    opener: O,
    flow: DocumentFlow,
    expander: FolderExpander,
    cancelled: Arc<AtomicBool>,
}

impl App<BrowserSession> {
    /// 初始化应用：启动或连接浏览器
    pub async fn initialize(config: Config) -> Result<Self> {
        let load_timeout = config.load_timeout();

        let session = match config.debug_port {
            Some(port) => BrowserSession::connect(port, load_timeout)
                .await
                .context("无法连接到浏览器")?,
            None => {
                let options = LaunchOptions {
                    headless: config.headless,
                    executable: config.chrome_path.clone(),
                    request_timeout: load_timeout,
                };
                BrowserSession::launch(&options, load_timeout)
                    .await
                    .context("无法启动浏览器")?
            }
        };

        Ok(Self::with_opener(config, session))
    }

    /// 关闭浏览器
    pub async fn shutdown(self) {
        self.opener.shutdown().await;
    }
}

impl<O: ViewOpener> App<O> {
    /// 使用任意 `ViewOpener` 构建
    pub fn with_opener(config: Config, opener: O) -> Self {
        Self {
            flow: DocumentFlow::new(&config),
            expander: FolderExpander::new(&config),
            config,
            opener,
            cancelled: Arc::new(AtomicBool::new(false)),
        }
    }

    /// 中断标志，置位后在下一个文件/文件夹之前停止
    pub fn cancel_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.cancelled)
    }

    pub fn into_opener(self) -> O {
        self.opener
    }

    /// 运行整批任务，返回每个文件的结果
    ///
    /// 只有用户中断会返回错误，此时会先输出已完成部分的汇总
    pub async fn run(&self, urls: &[String]) -> Result<BatchSummary> {
        let mut state = BatchState::default();
        let mut phase = BatchPhase::Init;

        while phase != BatchPhase::Done {
            let step = match phase {
                BatchPhase::Init => self.init(urls, &mut state).await,
                BatchPhase::ExpandFolders => self.expand_folders(&mut state).await,
                BatchPhase::ProcessFolderFiles => self.process_folder_files(&mut state).await,
                BatchPhase::ProcessStandaloneFiles => self.process_standalone(&mut state).await,
                BatchPhase::Summarize => {
                    print_summary(&state.summary);
                    Ok(())
                }
                BatchPhase::Done => Ok(()),
            };

            if let Err(e) = step {
                if e.downcast_ref::<AppError>().is_some_and(AppError::is_interrupted) {
                    warn!("\n⚠️ 用户中断，停止处理");
                    print_summary(&state.summary);
                }
                return Err(e);
            }

            phase = next_phase(phase);
        }

        Ok(state.summary)
    }

    async fn init(&self, urls: &[String], state: &mut BatchState) -> Result<()> {
        log_startup(urls.len(), &self.config.output_dir);

        tokio::fs::create_dir_all(&self.config.output_dir)
            .await
            .with_context(|| format!("无法创建输出目录: {}", self.config.output_dir.display()))?;

        for url in urls {
            let resource = ResourceRef::classify(url.trim());
            match resource.kind() {
                ResourceKind::Folder => state.folders.push(resource),
                ResourceKind::Document => state.standalone.push(resource),
                ResourceKind::Unclassified => {
                    warn!("⚠️ 无法识别链接类型，按文件处理: {}", resource);
                    state.standalone.push(resource);
                }
            }
        }

        info!(
            "✓ 文件夹 {} 个, 单独文件 {} 个",
            state.folders.len(),
            state.standalone.len()
        );
        Ok(())
    }

    async fn expand_folders(&self, state: &mut BatchState) -> Result<()> {
        if state.folders.is_empty() {
            return Ok(());
        }
        log_phase("展开文件夹", state.folders.len());

        let folders = std::mem::take(&mut state.folders);
        let total = folders.len();
        for (idx, folder) in folders.into_iter().enumerate() {
            self.ensure_not_cancelled()?;
            if idx > 0 {
                self.pace(self.config.folder_delay_ms).await;
            }
            log_unit_start("📁 文件夹", idx + 1, total);

            match self.expander.expand(&self.opener, &folder).await {
                Ok(expansion) if expansion.entries.is_empty() => {
                    warn!("⚠️ 文件夹中没有找到 PDF 文件: {}", expansion.title);
                    state
                        .summary
                        .push(BatchOutcome::failed(folder, "no PDF files found in folder"));
                }
                Ok(expansion) => {
                    info!(
                        "✓ 文件夹 \"{}\" 中找到 {} 个 PDF",
                        expansion.title,
                        expansion.entries.len()
                    );
                    state.folder_files.extend(expansion.entries);
                }
                Err(e) => {
                    error!("❌ 文件夹处理失败: {}", e);
                    state.summary.push(BatchOutcome::failed(folder, e.to_string()));
                }
            }
        }
        Ok(())
    }

    async fn process_folder_files(&self, state: &mut BatchState) -> Result<()> {
        let files = std::mem::take(&mut state.folder_files);
        if files.is_empty() {
            return Ok(());
        }
        log_phase("处理文件夹中的文件", files.len());
        self.process_files(files, self.config.folder_file_delay_ms, &mut state.summary)
            .await
    }

    async fn process_standalone(&self, state: &mut BatchState) -> Result<()> {
        let files = std::mem::take(&mut state.standalone);
        if files.is_empty() {
            return Ok(());
        }
        log_phase("处理单独的文件", files.len());
        self.process_files(files, self.config.file_delay_ms, &mut state.summary)
            .await
    }

    /// 依次处理文件，单个失败只记录
    async fn process_files(
        &self,
        files: Vec<ResourceRef>,
        delay_ms: u64,
        summary: &mut BatchSummary,
    ) -> Result<()> {
        let total = files.len();
        for (idx, resource) in files.into_iter().enumerate() {
            self.ensure_not_cancelled()?;
            if idx > 0 {
                self.pace(delay_ms).await;
            }
            log_unit_start("📄 文件", idx + 1, total);

            let ctx = DocumentCtx::new(idx + 1, total, resource, &self.config.output_dir);
            match self.flow.run(&self.opener, &ctx).await {
                Ok(report) => {
                    info!(
                        "{} ✅ 《{}》已保存 {} ({}/{} 页)",
                        ctx,
                        truncate_text(&report.title, 60),
                        report.destination.display(),
                        report.pages_written,
                        report.discovered
                    );
                    summary.push(BatchOutcome::success(
                        ctx.resource,
                        format!(
                            "saved {} ({} of {} pages)",
                            report.destination.display(),
                            report.pages_written,
                            report.discovered
                        ),
                    ));
                }
                Err(e) => {
                    error!("{} ❌ 处理失败: {}", ctx, e);
                    summary.push(BatchOutcome::failed(ctx.resource, e.to_string()));
                }
            }
        }
        Ok(())
    }

    fn ensure_not_cancelled(&self) -> Result<()> {
        if self.cancelled.load(Ordering::SeqCst) {
            return Err(AppError::Interrupted.into());
        }
        Ok(())
    }

    async fn pace(&self, delay_ms: u64) {
        if delay_ms > 0 {
            sleep(Duration::from_millis(delay_ms)).await;
        }
    }
}

fn next_phase(phase: BatchPhase) -> BatchPhase {
    match phase {
        BatchPhase::Init => BatchPhase::ExpandFolders,
        BatchPhase::ExpandFolders => BatchPhase::ProcessFolderFiles,
        BatchPhase::ProcessFolderFiles => BatchPhase::ProcessStandaloneFiles,
        BatchPhase::ProcessStandaloneFiles => BatchPhase::Summarize,
        BatchPhase::Summarize | BatchPhase::Done => BatchPhase::Done,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn phases_advance_in_fixed_order() {
        let mut phase = BatchPhase::Init;
        let mut seen = vec![phase];
        while phase != BatchPhase::Done {
            phase = next_phase(phase);
            seen.push(phase);
        }
        assert_eq!(
            seen,
            vec![
                BatchPhase::Init,
                BatchPhase::ExpandFolders,
                BatchPhase::ProcessFolderFiles,
                BatchPhase::ProcessStandaloneFiles,
                BatchPhase::Summarize,
                BatchPhase::Done,
            ]
        );
    }
}
