//! 文档处理上下文
//!
//! 封装"我正在处理第几个文件、输出到哪里"这一信息

use std::fmt::Display;
use std::path::{Path, PathBuf};

use crate::models::ResourceRef;

/// 文档处理上下文
#[derive(Debug, Clone)]
pub struct DocumentCtx {
    /// 当前阶段中的序号（从1开始，仅用于日志显示）
    pub index: usize,

    /// 当前阶段的文件总数
    pub total: usize,

    pub resource: ResourceRef,

    /// 最终输出目录（已包含文件夹子目录）
    pub output_dir: PathBuf,
}

impl DocumentCtx {
    /// 创建上下文，文件夹条目会落到对应子目录
    pub fn new(index: usize, total: usize, resource: ResourceRef, output_root: &Path) -> Self {
        let output_dir = match resource.output_subdir() {
            Some(subdir) => output_root.join(subdir),
            None => output_root.to_path_buf(),
        };
        Self {
            index,
            total,
            resource,
            output_dir,
        }
    }

    /// 临时区域的分区名：同一文件夹的文件共用一个分区
    pub fn temp_scope(&self) -> String {
        match self.resource.output_subdir() {
            Some(subdir) => subdir.to_string_lossy().into_owned(),
            None => "standalone".to_string(),
        }
    }
}

impl Display for DocumentCtx {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[文件 {}/{}]", self.index, self.total)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn folder_entries_land_in_subdir() {
        let entry = ResourceRef::folder_entry("abc", "Reports");
        let ctx = DocumentCtx::new(2, 5, entry, Path::new("downloads"));
        assert_eq!(ctx.output_dir, Path::new("downloads/Reports"));
        assert_eq!(ctx.temp_scope(), "Reports");
        assert_eq!(ctx.to_string(), "[文件 2/5]");
    }

    #[test]
    fn standalone_files_use_output_root() {
        let file = ResourceRef::classify("https://drive.google.com/file/d/x/view");
        let ctx = DocumentCtx::new(1, 1, file, Path::new("out"));
        assert_eq!(ctx.output_dir, Path::new("out"));
        assert_eq!(ctx.temp_scope(), "standalone");
    }
}
