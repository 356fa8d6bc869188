//! 单页抓取路由 - 业务能力层
//!
//! 每一页先在页面上下文里直接 fetch 图片地址，失败后再把已渲染的
//! 图片画到离屏画布上导出。两种策略都失败时只记录警告，该页缺席，
//! 不影响其余页面。本模块不做重试。

use base64::{engine::general_purpose::STANDARD, Engine as _};
use serde::Deserialize;
use tracing::{debug, warn};

use crate::error::CaptureError;
use crate::infrastructure::{eval_as, RemoteView};
use crate::models::{CaptureStrategy, CapturedPage, DiscoveredItem};

/// 直接获取时附带的 Accept 头
pub const ACCEPT_HINT: &str = "image/*";

/// 画布回退在无法获得图片固有尺寸时使用的边长
pub const DEFAULT_CANVAS_EXTENT: u32 = 1000;

#[derive(Debug, Deserialize)]
struct FetchReply {
    ok: bool,
    #[serde(default)]
    status: Option<u16>,
    #[serde(default)]
    data: Option<String>,
    #[serde(default)]
    error: Option<String>,
}

#[derive(Debug, Deserialize)]
struct CanvasReply {
    data: String,
}

/// 抓取路由
#[derive(Debug, Clone, Default)]
pub struct CaptureRouter;

impl CaptureRouter {
    pub fn new() -> Self {
        Self
    }

    /// 抓取一页，两种策略都失败时返回 `None`
    pub async fn capture(&self, view: &dyn RemoteView, item: &DiscoveredItem) -> Option<CapturedPage> {
        let page_no = item.order + 1;

        match self.fetch_direct(view, &item.id).await {
            Ok(bytes) => {
                debug!("第 {} 页直接获取成功 ({} 字节)", page_no, bytes.len());
                return Some(CapturedPage {
                    order: item.order,
                    bytes,
                    strategy: CaptureStrategy::DirectFetch,
                });
            }
            Err(e) => debug!("第 {} 页直接获取失败，尝试画布回退: {}", page_no, e),
        }

        match self.render_to_canvas(view, &item.id).await {
            Ok(bytes) => {
                debug!("第 {} 页画布回退成功 ({} 字节)", page_no, bytes.len());
                Some(CapturedPage {
                    order: item.order,
                    bytes,
                    strategy: CaptureStrategy::CanvasRender,
                })
            }
            Err(e) => {
                warn!("⚠️ 第 {} 页抓取失败，已跳过: {}", page_no, e);
                None
            }
        }
    }

    /// 主策略：在页面上下文中 fetch
    async fn fetch_direct(&self, view: &dyn RemoteView, src: &str) -> Result<Vec<u8>, CaptureError> {
        let script = fetch_script(src);
        let reply: FetchReply = eval_as(view, &script)
            .await
            .map_err(|e| CaptureError::FetchFailed(e.to_string()))?;

        if !reply.ok {
            return Err(match (reply.status, reply.error) {
                (Some(status), _) => CaptureError::HttpStatus { status },
                (None, Some(error)) => CaptureError::FetchFailed(error),
                (None, None) => CaptureError::UnexpectedReply("fetch reported failure".into()),
            });
        }

        decode_payload(reply.data.as_deref().unwrap_or_default())
    }

    /// 回退策略：画到离屏画布再导出 PNG
    async fn render_to_canvas(&self, view: &dyn RemoteView, src: &str) -> Result<Vec<u8>, CaptureError> {
        let script = canvas_script(src);
        let reply: Option<CanvasReply> = eval_as(view, &script)
            .await
            .map_err(|e| CaptureError::UnexpectedReply(e.to_string()))?;

        match reply {
            Some(reply) => decode_payload(&reply.data),
            None => Err(CaptureError::NotRendered),
        }
    }
}

fn decode_payload(data: &str) -> Result<Vec<u8>, CaptureError> {
    let bytes = STANDARD.decode(data.trim())?;
    if bytes.is_empty() {
        return Err(CaptureError::EmptyPayload);
    }
    Ok(bytes)
}

/// 字符串以 JSON 字面量形式嵌入脚本
fn js_string(value: &str) -> String {
    serde_json::to_string(value).unwrap_or_else(|_| "\"\"".to_string())
}

fn fetch_script(src: &str) -> String {
    format!(
        r#"
        (async () => {{
            try {{
                const response = await fetch({url}, {{ headers: {{ 'Accept': {accept} }} }});
                if (!response.ok) {{
                    return {{ ok: false, status: response.status }};
                }}
                const blob = await response.blob();
                const data = await new Promise((resolve, reject) => {{
                    const reader = new FileReader();
                    reader.onloadend = () => resolve(String(reader.result || '').split(',')[1] || '');
                    reader.onerror = () => reject(reader.error);
                    reader.readAsDataURL(blob);
                }});
                return {{ ok: true, status: response.status, data: data }};
            }} catch (error) {{
                return {{ ok: false, error: String((error && error.message) || error) }};
            }}
        }})()
        "#,
        url = js_string(src),
        accept = js_string(ACCEPT_HINT),
    )
}

fn canvas_script(src: &str) -> String {
    format!(
        r#"
        (() => {{
            const url = {url};
            for (const img of document.getElementsByTagName('img')) {{
                if (img.src !== url) continue;
                const canvas = document.createElement('canvas');
                canvas.width = img.naturalWidth || img.width || {extent};
                canvas.height = img.naturalHeight || img.height || {extent};
                const ctx = canvas.getContext('2d');
                try {{
                    ctx.drawImage(img, 0, 0);
                    return {{ data: canvas.toDataURL('image/png').split(',')[1] || '' }};
                }} catch (e) {{
                    return null;
                }}
            }}
            return null;
        }})()
        "#,
        url = js_string(src),
        extent = DEFAULT_CANVAS_EXTENT,
    )
}
