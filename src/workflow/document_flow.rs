//! 单个文档处理流程 - 流程层
//!
//! 核心职责：定义"一个文档"从打开到落盘的完整流程
//!
//! 流程顺序：
//! 1. 打开（退避重试）
//! 2. 等待首个页面出现（等待门）
//! 3. 读取标题 → 收敛发现所有页面
//! 4. 逐页抓取（直接获取 → 画布回退）
//! 5. 合成 PDF → 关闭视图

use std::path::PathBuf;

use tracing::{debug, info, warn};

use crate::config::Config;
use crate::error::{AppResult, CaptureError};
use crate::infrastructure::{close_quietly, open_with_retry, RemoteView, ViewOpener};
use crate::services::extractor::{
    clean_document_title, parse_page_images, DEFAULT_DOCUMENT_TITLE, PAGE_IMAGE_PROBE_JS,
};
use crate::services::{
    discover, sanitize_filename, strip_pdf_extension, unique_destination, CaptureRouter,
    DiscoveryConfig, DocumentAssembler, PageImageSource,
};
use crate::utils::logging::truncate_text;
use crate::utils::{wait_until, RetryPolicy};
use crate::workflow::document_ctx::DocumentCtx;

/// 文档处理结果
#[derive(Debug, Clone)]
pub struct DocumentReport {
    pub title: String,
    pub destination: PathBuf,
    /// 发现的页数
    pub discovered: usize,
    /// 写入 PDF 的页数
    pub pages_written: usize,
}

/// 文档处理流程
///
/// - 编排单个文档的完整流程
/// - 不持有浏览器，只借用 `ViewOpener`
/// - 视图在任何出口都会被关闭
pub struct DocumentFlow {
    open_retry: RetryPolicy,
    pages_gate: RetryPolicy,
    discovery: DiscoveryConfig,
    capture: CaptureRouter,
    assembler: DocumentAssembler,
}

impl DocumentFlow {
    pub fn new(config: &Config) -> Self {
        Self {
            open_retry: config.open_retry(),
            pages_gate: config.pages_gate(),
            discovery: config.page_discovery(),
            capture: CaptureRouter::new(),
            assembler: DocumentAssembler::new(
                &config.temp_dir,
                config.image_quality,
                config.page_dpi,
            ),
        }
    }

    pub async fn run(&self, opener: &dyn ViewOpener, ctx: &DocumentCtx) -> AppResult<DocumentReport> {
        info!("{} 🌐 正在打开: {}", ctx, ctx.resource);
        if let Some(id) = ctx.resource.file_id() {
            debug!("{} 文件 ID: {}", ctx, id);
        }
        let view = open_with_retry(opener, ctx.resource.url(), &self.open_retry).await?;

        let result = self.process(view.as_ref(), ctx).await;
        close_quietly(view.as_ref()).await;
        result
    }

    async fn process(&self, view: &dyn RemoteView, ctx: &DocumentCtx) -> AppResult<DocumentReport> {
        // ========== 1. 等待首个页面出现 ==========
        info!("{} ⏳ 等待文档加载...", ctx);
        let ready = wait_until(&self.pages_gate, "等待页面出现", |_| async move {
            count_visible_pages(view).await > 0
        })
        .await;
        if !ready {
            warn!("{} ⚠️ 未检测到任何页面", ctx);
            return Err(CaptureError::NoPagesDetected.into());
        }

        let title = match view.title().await {
            Ok(raw) => clean_document_title(&raw),
            Err(e) => {
                debug!("读取标题失败，使用默认名: {}", e);
                DEFAULT_DOCUMENT_TITLE.to_string()
            }
        };
        info!("{} 📖 文档: {}", ctx, truncate_text(&title, 80));

        // ========== 2. 发现所有页面 ==========
        let mut source = PageImageSource::new(view);
        let outcome = discover(&mut source, &self.discovery).await;
        let discovered = outcome.items.len();
        if discovered == 0 {
            return Err(CaptureError::NoPagesDetected.into());
        }

        // ========== 3. 逐页抓取 ==========
        info!("{} 📸 开始抓取 {} 页...", ctx, discovered);
        let mut pages = Vec::with_capacity(discovered);
        for item in &outcome.items {
            if let Some(page) = self.capture.capture(view, item).await {
                pages.push(page);
            }
            if (item.order + 1) % 10 == 0 {
                info!("{} 已处理 {}/{} 页", ctx, item.order + 1, discovered);
            }
        }
        info!("{} ✓ 成功抓取 {}/{} 页", ctx, pages.len(), discovered);
        if pages.is_empty() {
            return Err(CaptureError::NothingCaptured {
                attempted: discovered,
            }
            .into());
        }

        // ========== 4. 合成 PDF ==========
        let stem = sanitize_filename(strip_pdf_extension(&title), DEFAULT_DOCUMENT_TITLE);
        let destination = unique_destination(&ctx.output_dir, &stem, "pdf");
        let report = self
            .assembler
            .scoped(&ctx.temp_scope())
            .assemble(pages, &destination)
            .await?;

        if !report.dropped.is_empty() {
            warn!("{} ⚠️ {} 页无法解码，已丢弃", ctx, report.dropped.len());
        }

        Ok(DocumentReport {
            title,
            destination: report.destination,
            discovered,
            pages_written: report.pages_written,
        })
    }
}

/// 当前已渲染的页面数量，查询失败按 0 处理
async fn count_visible_pages(view: &dyn RemoteView) -> usize {
    match view.eval(PAGE_IMAGE_PROBE_JS).await {
        Ok(value) => parse_page_images(&value).len(),
        Err(e) => {
            debug!("检测页面失败: {}", e);
            0
        }
    }
}
