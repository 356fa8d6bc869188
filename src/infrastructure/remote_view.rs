//! 远程视图能力 - 基础设施层
//!
//! 上层只依赖这两个 trait，不直接接触 chromiumoxide

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde_json::Value as JsonValue;
use tracing::warn;

use crate::error::AppResult;
use crate::utils::retry::{retry_async, RetryPolicy};

/// 一个已打开的远程视图
#[async_trait]
pub trait RemoteView: Send + Sync {
    /// 在当前渲染状态上执行无副作用查询，返回 JSON 结果
    async fn eval(&self, script: &str) -> AppResult<JsonValue>;

    /// 发送一次按键（滚动失败时的回退动作）
    async fn press_key(&self, key: &str) -> AppResult<()>;

    /// 视图标题
    async fn title(&self) -> AppResult<String>;

    /// 关闭视图
    async fn close(&self) -> AppResult<()>;
}

/// 打开远程资源的能力（整批共享同一个浏览器上下文）
#[async_trait]
pub trait ViewOpener: Send + Sync {
    async fn open(&self, url: &str) -> AppResult<Box<dyn RemoteView>>;
}

/// 执行查询并反序列化为指定类型
pub async fn eval_as<T: DeserializeOwned>(view: &dyn RemoteView, script: &str) -> AppResult<T> {
    let value = view.eval(script).await?;
    Ok(serde_json::from_value(value)?)
}

/// 带重试地打开资源
pub async fn open_with_retry(
    opener: &dyn ViewOpener,
    url: &str,
    policy: &RetryPolicy,
) -> AppResult<Box<dyn RemoteView>> {
    retry_async(policy, "打开资源", |_| opener.open(url)).await
}

/// 关闭视图，失败只记录
pub async fn close_quietly(view: &dyn RemoteView) {
    if let Err(e) = view.close().await {
        warn!("关闭视图失败: {}", e);
    }
}
