//! JS 执行器 - 基础设施层
//!
//! 持有唯一的 page 资源，只暴露"执行 JS"的能力

use std::time::Duration;

use async_trait::async_trait;
use chromiumoxide::Page;
use serde_json::Value as JsonValue;
use tokio::time::timeout;
use tracing::debug;

use crate::error::{AppError, AppResult};
use crate::infrastructure::remote_view::RemoteView;

/// JS 执行器
///
/// 职责：
/// - 持有唯一的 Page 资源
/// - 每次调用都受单次超时约束
/// - 不认识文件夹 / 文档
/// - 不处理业务流程
pub struct JsExecutor {
    page: Page,
    call_timeout: Duration,
}

impl JsExecutor {
    /// 创建新的 JS 执行器
    pub fn new(page: Page, call_timeout: Duration) -> Self {
        Self { page, call_timeout }
    }

    fn timeout_millis(&self) -> u64 {
        self.call_timeout.as_millis() as u64
    }
}

#[async_trait]
impl RemoteView for JsExecutor {
    async fn eval(&self, script: &str) -> AppResult<JsonValue> {
        let result = timeout(self.call_timeout, self.page.evaluate(script.to_string()))
            .await
            .map_err(|_| AppError::timeout("eval", self.timeout_millis()))??;
        // 脚本返回 undefined 时没有值，按 null 处理
        Ok(result.into_value().unwrap_or(JsonValue::Null))
    }

    async fn press_key(&self, key: &str) -> AppResult<()> {
        let fut = async {
            let body = self.page.find_element("body").await?;
            body.press_key(key).await?;
            Ok::<_, AppError>(())
        };
        timeout(self.call_timeout, fut)
            .await
            .map_err(|_| AppError::timeout("press_key", self.timeout_millis()))?
    }

    async fn title(&self) -> AppResult<String> {
        let title = timeout(self.call_timeout, self.page.get_title())
            .await
            .map_err(|_| AppError::timeout("title", self.timeout_millis()))??;
        Ok(title.unwrap_or_default())
    }

    async fn close(&self) -> AppResult<()> {
        debug!("关闭页面");
        self.page.clone().close().await?;
        Ok(())
    }
}
