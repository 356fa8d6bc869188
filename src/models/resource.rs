//! 远程资源引用
//!
//! 一个链接在解析输入时被分类一次，之后只读

use std::fmt::Display;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use regex::Regex;

static FOLDER_ID_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"/drive/folders/([A-Za-z0-9_-]+)").expect("valid regex"));
static FILE_ID_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"/file/d/([A-Za-z0-9_-]+)/").expect("valid regex"));

/// 资源分类
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResourceKind {
    /// 文件夹（展开为若干文件）
    Folder,
    /// 单个文档
    Document,
    /// 无法识别的链接，按文档处理
    Unclassified,
}

impl ResourceKind {
    /// 根据链接形状分类
    pub fn classify(url: &str) -> Self {
        if url.contains("/drive/folders/") {
            ResourceKind::Folder
        } else if url.contains("/file/d/") {
            ResourceKind::Document
        } else {
            ResourceKind::Unclassified
        }
    }
}

/// 资源引用
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceRef {
    url: String,
    kind: ResourceKind,
    /// 来自文件夹展开时的输出子目录名
    output_subdir: Option<PathBuf>,
}

impl ResourceRef {
    /// 从用户输入的链接创建
    pub fn classify(url: impl Into<String>) -> Self {
        let url = url.into();
        let kind = ResourceKind::classify(&url);
        Self {
            url,
            kind,
            output_subdir: None,
        }
    }

    /// 文件夹中发现的文件条目
    pub fn folder_entry(file_id: &str, subdir: impl Into<PathBuf>) -> Self {
        Self {
            url: format!("https://drive.google.com/file/d/{}/view", file_id),
            kind: ResourceKind::Document,
            output_subdir: Some(subdir.into()),
        }
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn kind(&self) -> ResourceKind {
        self.kind
    }

    pub fn output_subdir(&self) -> Option<&Path> {
        self.output_subdir.as_deref()
    }

    /// 文件夹 ID（仅文件夹链接）
    pub fn folder_id(&self) -> Option<&str> {
        FOLDER_ID_RE
            .captures(&self.url)
            .and_then(|c| c.get(1))
            .map(|m| m.as_str())
    }

    /// 文件 ID（仅文件链接）
    pub fn file_id(&self) -> Option<&str> {
        FILE_ID_RE
            .captures(&self.url)
            .and_then(|c| c.get(1))
            .map(|m| m.as_str())
    }
}

impl Display for ResourceRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.url)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classifies_by_url_shape() {
        let folder = ResourceRef::classify("https://drive.google.com/drive/folders/AbC_-1?usp=sharing");
        assert_eq!(folder.kind(), ResourceKind::Folder);
        assert_eq!(folder.folder_id(), Some("AbC_-1"));

        let file = ResourceRef::classify("https://drive.google.com/file/d/XyZ-9_/view?usp=sharing");
        assert_eq!(file.kind(), ResourceKind::Document);
        assert_eq!(file.file_id(), Some("XyZ-9_"));

        let other = ResourceRef::classify("https://example.com/some.pdf");
        assert_eq!(other.kind(), ResourceKind::Unclassified);
        assert_eq!(other.file_id(), None);
    }

    #[test]
    fn folder_entries_are_documents_with_subdir() {
        let entry = ResourceRef::folder_entry("abc", "Reports");
        assert_eq!(entry.url(), "https://drive.google.com/file/d/abc/view");
        assert_eq!(entry.kind(), ResourceKind::Document);
        assert_eq!(entry.output_subdir(), Some(Path::new("Reports")));
        assert_eq!(entry.file_id(), Some("abc"));
    }
}
