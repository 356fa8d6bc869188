use std::path::Path;

use tokio::fs;

use crate::error::{AppResult, InputError};

/// 从文本或 CSV 文件加载链接列表
///
/// - `.csv`：取每行第一个字段
/// - 其他：每行一个链接
///
/// 不以 `http` 开头的行/字段会被忽略
pub async fn load_urls_from_file(path: &Path) -> AppResult<Vec<String>> {
    if !path.exists() {
        return Err(InputError::ListNotFound {
            path: path.to_path_buf(),
        }
        .into());
    }

    let content = fs::read_to_string(path)
        .await
        .map_err(|source| InputError::ReadFailed {
            path: path.to_path_buf(),
            source,
        })?;

    let is_csv = path
        .extension()
        .and_then(|s| s.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case("csv"));

    let urls = parse_url_list(&content, is_csv);
    tracing::info!("📄 从 {} 加载了 {} 个链接", path.display(), urls.len());
    Ok(urls)
}

/// 解析链接列表内容
pub fn parse_url_list(content: &str, is_csv: bool) -> Vec<String> {
    content
        .lines()
        .filter_map(|line| {
            let candidate = if is_csv {
                first_csv_field(line)
            } else {
                line.trim().to_string()
            };
            candidate.starts_with("http").then_some(candidate)
        })
        .collect()
}

/// 取 CSV 行的第一个字段（支持双引号包裹）
fn first_csv_field(line: &str) -> String {
    let line = line.trim_start();
    if let Some(rest) = line.strip_prefix('"') {
        let mut field = String::new();
        let mut chars = rest.chars().peekable();
        while let Some(c) = chars.next() {
            if c == '"' {
                if chars.peek() == Some(&'"') {
                    field.push('"');
                    chars.next();
                } else {
                    break;
                }
            } else {
                field.push(c);
            }
        }
        field.trim().to_string()
    } else {
        line.split(',').next().unwrap_or_default().trim().to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_text_keeps_http_lines_only() {
        let content = "https://drive.google.com/file/d/a/view\n\n# comment\n  https://drive.google.com/drive/folders/b  \nftp://nope\n";
        let urls = parse_url_list(content, false);
        assert_eq!(
            urls,
            vec![
                "https://drive.google.com/file/d/a/view",
                "https://drive.google.com/drive/folders/b",
            ]
        );
    }

    #[test]
    fn csv_takes_first_field() {
        let content = "url,label\nhttps://drive.google.com/file/d/a/view,first\n\"https://drive.google.com/file/d/b/view\",\"second, quoted\"\nnot-a-url,x\n";
        let urls = parse_url_list(content, true);
        assert_eq!(
            urls,
            vec![
                "https://drive.google.com/file/d/a/view",
                "https://drive.google.com/file/d/b/view",
            ]
        );
    }

    #[tokio::test]
    async fn missing_file_is_reported() {
        let err = load_urls_from_file(Path::new("definitely/not/here.txt"))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            crate::error::AppError::Input(InputError::ListNotFound { .. })
        ));
    }

    #[tokio::test]
    async fn csv_extension_is_case_insensitive() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("links.CSV");
        std::fs::write(&path, "https://x/file/d/1/view,one\n").unwrap();
        let urls = load_urls_from_file(&path).await.unwrap();
        assert_eq!(urls, vec!["https://x/file/d/1/view"]);
    }
}
