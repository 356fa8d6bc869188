//! 文件夹展开器 - 编排层
//!
//! 打开一个文件夹视图，收敛发现其中的 PDF 条目，
//! 并把每个条目转换为带输出子目录的文件资源

use std::time::Duration;

use tokio::time::sleep;
use tracing::{debug, info};

use crate::config::Config;
use crate::error::AppResult;
use crate::infrastructure::{close_quietly, open_with_retry, RemoteView, ViewOpener};
use crate::models::ResourceRef;
use crate::services::extractor::{clean_folder_title, DEFAULT_FOLDER_TITLE};
use crate::services::{discover, sanitize_filename, DiscoveryConfig, FolderEntrySource};
use crate::utils::logging::truncate_text;
use crate::utils::RetryPolicy;

/// 展开结果
#[derive(Debug, Clone)]
pub struct FolderExpansion {
    pub title: String,
    /// 输出子目录名（已规范化）
    pub subdir: String,
    /// 按发现顺序排列
    pub entries: Vec<ResourceRef>,
}

/// 文件夹展开器
pub struct FolderExpander {
    open_retry: RetryPolicy,
    settle: Duration,
    discovery: DiscoveryConfig,
}

impl FolderExpander {
    pub fn new(config: &Config) -> Self {
        Self {
            open_retry: config.open_retry(),
            settle: Duration::from_millis(config.folder_settle_ms),
            discovery: config.folder_discovery(),
        }
    }

    pub async fn expand(&self, opener: &dyn ViewOpener, folder: &ResourceRef) -> AppResult<FolderExpansion> {
        info!("📁 正在打开文件夹: {}", folder);
        if let Some(id) = folder.folder_id() {
            debug!("文件夹 ID: {}", id);
        }
        let view = open_with_retry(opener, folder.url(), &self.open_retry).await?;

        let result = self.collect(view.as_ref()).await;
        close_quietly(view.as_ref()).await;
        result
    }

    async fn collect(&self, view: &dyn RemoteView) -> AppResult<FolderExpansion> {
        // 等待文件列表渲染
        sleep(self.settle).await;

        let title = match view.title().await {
            Ok(raw) => clean_folder_title(&raw),
            Err(e) => {
                debug!("读取文件夹标题失败，使用默认名: {}", e);
                DEFAULT_FOLDER_TITLE.to_string()
            }
        };
        let subdir = sanitize_filename(&title, DEFAULT_FOLDER_TITLE);
        info!("📂 文件夹: {}", title);

        info!("🔍 正在扫描文件列表...");
        let mut source = FolderEntrySource::new(view);
        let outcome = discover(&mut source, &self.discovery).await;

        let entries: Vec<ResourceRef> = outcome
            .items
            .iter()
            .map(|item| {
                debug!(
                    "  {}. {}",
                    item.order + 1,
                    truncate_text(item.name.as_deref().unwrap_or(&item.id), 80)
                );
                ResourceRef::folder_entry(&item.id, &subdir)
            })
            .collect();

        Ok(FolderExpansion {
            title,
            subdir,
            entries,
        })
    }
}
