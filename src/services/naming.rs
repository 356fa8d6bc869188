//! 文件名规范化与重名处理

use std::path::{Path, PathBuf};

const MAX_NAME_CHARS: usize = 200;

fn is_forbidden(c: char) -> bool {
    c.is_control() || matches!(c, '<' | '>' | ':' | '"' | '/' | '\\' | '|' | '?' | '*')
}

/// 去掉控制字符和 `<>:"/\|?*`，去掉末尾的点和空格，最长 200 个字符。
/// 结果为空时返回 `fallback`
pub fn sanitize_filename(input: &str, fallback: &str) -> String {
    let cleaned: String = input.chars().filter(|c| !is_forbidden(*c)).collect();
    let truncated: String = cleaned
        .trim_end_matches(['.', ' '])
        .chars()
        .take(MAX_NAME_CHARS)
        .collect();
    let name = truncated.trim_end_matches(['.', ' ']);
    if name.trim().is_empty() {
        fallback.to_string()
    } else {
        name.to_string()
    }
}

/// 去掉标题末尾的 `.pdf`（不区分大小写），避免生成 `x.pdf.pdf`
pub fn strip_pdf_extension(title: &str) -> &str {
    let len = title.len();
    if len > 4 && title.is_char_boundary(len - 4) && title[len - 4..].eq_ignore_ascii_case(".pdf") {
        &title[..len - 4]
    } else {
        title
    }
}

/// 在 `dir` 中为 `stem.extension` 找一个不存在的路径：
/// `stem.ext`、`stem_1.ext`、`stem_2.ext` ...
///
/// 只检查不创建，同一状态下重复调用结果相同
pub fn unique_destination(dir: &Path, stem: &str, extension: &str) -> PathBuf {
    let first = dir.join(format!("{}.{}", stem, extension));
    if !first.exists() {
        return first;
    }
    let mut counter = 1usize;
    loop {
        let candidate = dir.join(format!("{}_{}.{}", stem, counter, extension));
        if !candidate.exists() {
            return candidate;
        }
        counter += 1;
    }
}
