//! 条目标识提取 - 业务能力层
//!
//! 探测脚本返回的动态 JSON 在这里被收敛为固定结构，
//! 结构不符的元素直接忽略，不向上传播原始值。

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value as JsonValue;
use tracing::debug;

use crate::error::AppResult;
use crate::infrastructure::RemoteView;
use crate::models::ProbedItem;
use crate::services::discovery::DiscoverySource;

/// 文档标题缺失时的默认名
pub const DEFAULT_DOCUMENT_TITLE: &str = "gdrive_document";
/// 文件夹标题缺失时的默认名
pub const DEFAULT_FOLDER_TITLE: &str = "gdrive_folder";

const TITLE_SUFFIX: &str = " - Google Drive";

/// 回退推进使用的按键
pub const FALLBACK_ADVANCE_KEY: &str = "PageDown";

/// 枚举当前已渲染的页面图片
pub const PAGE_IMAGE_PROBE_JS: &str = r#"
(() => {
    const imgs = document.getElementsByTagName('img');
    const pages = [];
    for (let i = 0; i < imgs.length; i++) {
        const src = imgs[i].src || '';
        if (src.startsWith('blob:https://drive.google.com/')) {
            pages.push({ src: src });
        }
    }
    return pages;
})()
"#;

/// 把最后一张图片滚动到视野中央
pub const PAGE_ADVANCE_JS: &str = r#"
(() => {
    const imgs = document.getElementsByTagName('img');
    if (imgs.length > 0) {
        imgs[imgs.length - 1].scrollIntoView({ behavior: 'auto', block: 'center' });
    } else {
        window.scrollBy(0, window.innerHeight);
    }
    return true;
})()
"#;

/// 枚举文件夹列表中看起来是 PDF 的行
pub const FOLDER_ENTRY_PROBE_JS: &str = r#"
(() => {
    const files = [];
    const rows = document.querySelectorAll('[data-id][role="row"], tr[data-id]');
    for (const row of rows) {
        const fileId = row.getAttribute('data-id');
        if (!fileId) continue;

        const nameElem = row.querySelector('[data-tooltip]') || row.querySelector('.a65Cwf') || row;
        let name = '';
        if (nameElem && nameElem.getAttribute('data-tooltip')) {
            name = nameElem.getAttribute('data-tooltip');
        } else {
            name = nameElem ? (nameElem.textContent || '') : '';
        }

        const rowText = (row.textContent || '').toLowerCase();
        if (name.toLowerCase().includes('.pdf') || rowText.includes('pdf')) {
            files.push({ id: fileId, name: name.trim() });
        }
    }
    return files;
})()
"#;

/// 文件夹列表向下滚动两屏
pub const FOLDER_ADVANCE_JS: &str = r#"
(() => {
    window.scrollBy(0, window.innerHeight * 2);
    return true;
})()
"#;

#[derive(Debug, Deserialize)]
struct FolderEntryRecord {
    id: String,
    #[serde(default)]
    name: Option<String>,
}

#[derive(Debug, Deserialize)]
struct PageImageRecord {
    src: String,
}

/// 解析文件夹探测结果
pub fn parse_folder_entries(value: &JsonValue) -> Vec<ProbedItem> {
    parse_records::<FolderEntryRecord, _>(value, |r| {
        let id = r.id.trim().to_string();
        (!id.is_empty()).then(|| ProbedItem {
            id,
            name: r.name.map(|n| n.trim().to_string()).filter(|n| !n.is_empty()),
        })
    })
}

/// 解析页面图片探测结果，图片地址即标识
pub fn parse_page_images(value: &JsonValue) -> Vec<ProbedItem> {
    parse_records::<PageImageRecord, _>(value, |r| {
        (!r.src.is_empty()).then(|| ProbedItem::new(r.src))
    })
}

fn parse_records<R, F>(value: &JsonValue, mut convert: F) -> Vec<ProbedItem>
where
    R: for<'de> Deserialize<'de>,
    F: FnMut(R) -> Option<ProbedItem>,
{
    let Some(elements) = value.as_array() else {
        debug!("探测结果不是数组，忽略: {}", value);
        return Vec::new();
    };

    let mut skipped = 0;
    let items: Vec<ProbedItem> = elements
        .iter()
        .filter_map(|element| {
            let parsed = R::deserialize(element).ok().and_then(&mut convert);
            if parsed.is_none() {
                skipped += 1;
            }
            parsed
        })
        .collect();

    if skipped > 0 {
        debug!("忽略了 {} 个结构不符的探测元素", skipped);
    }
    items
}

/// 文档标题：去掉站点后缀，空则使用默认名
pub fn clean_document_title(raw: &str) -> String {
    let title = raw.replace(TITLE_SUFFIX, "");
    let title = title.trim();
    if title.is_empty() {
        DEFAULT_DOCUMENT_TITLE.to_string()
    } else {
        title.to_string()
    }
}

/// 文件夹标题：站点首页标题或空标题都使用默认名
pub fn clean_folder_title(raw: &str) -> String {
    if raw.trim() == "Google Drive" {
        return DEFAULT_FOLDER_TITLE.to_string();
    }
    let title = raw.replace(TITLE_SUFFIX, "");
    let title = title.trim();
    if title.is_empty() {
        DEFAULT_FOLDER_TITLE.to_string()
    } else {
        title.to_string()
    }
}

/// 优先执行滚动脚本，失败时按键回退；回退本身的失败也会返回给调用方忽略
pub async fn advance_with_fallback(view: &dyn RemoteView, script: &str) -> AppResult<()> {
    match view.eval(script).await {
        Ok(_) => Ok(()),
        Err(e) => {
            debug!("滚动脚本失败，改用 {} 键: {}", FALLBACK_ADVANCE_KEY, e);
            view.press_key(FALLBACK_ADVANCE_KEY).await
        }
    }
}

/// 文档页面图片的发现来源
pub struct PageImageSource<'a> {
    view: &'a dyn RemoteView,
}

impl<'a> PageImageSource<'a> {
    pub fn new(view: &'a dyn RemoteView) -> Self {
        Self { view }
    }
}

#[async_trait]
impl<'a> DiscoverySource for PageImageSource<'a> {
    async fn probe(&mut self) -> AppResult<Vec<ProbedItem>> {
        let value = self.view.eval(PAGE_IMAGE_PROBE_JS).await?;
        Ok(parse_page_images(&value))
    }

    async fn advance(&mut self) -> AppResult<()> {
        advance_with_fallback(self.view, PAGE_ADVANCE_JS).await
    }

    fn label(&self) -> &'static str {
        "页面"
    }
}

/// 文件夹条目的发现来源
pub struct FolderEntrySource<'a> {
    view: &'a dyn RemoteView,
}

impl<'a> FolderEntrySource<'a> {
    pub fn new(view: &'a dyn RemoteView) -> Self {
        Self { view }
    }
}

#[async_trait]
impl<'a> DiscoverySource for FolderEntrySource<'a> {
    async fn probe(&mut self) -> AppResult<Vec<ProbedItem>> {
        let value = self.view.eval(FOLDER_ENTRY_PROBE_JS).await?;
        let entries = parse_folder_entries(&value);
        for entry in &entries {
            debug!("找到 PDF: {}", entry.name.as_deref().unwrap_or("Unknown"));
        }
        Ok(entries)
    }

    async fn advance(&mut self) -> AppResult<()> {
        advance_with_fallback(self.view, FOLDER_ADVANCE_JS).await
    }

    fn label(&self) -> &'static str {
        "文件"
    }
}
