//! 统一的有界重试工具
//!
//! 打开资源的退避重试、"已检测到页面"等待门都复用这里

use std::fmt::Display;
use std::future::Future;
use std::time::Duration;

use rand::Rng;
use tokio::time::sleep;
use tracing::{debug, warn};

/// 重试策略
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// 最大尝试次数（至少 1 次）
    pub max_attempts: usize,
    /// 第一次重试前的等待
    pub delay: Duration,
    /// 每次重试等待的倍数，1 表示固定间隔
    pub backoff_factor: u32,
    /// 额外随机等待上限
    pub jitter: Duration,
}

impl RetryPolicy {
    /// 固定间隔、无抖动
    pub fn fixed(max_attempts: usize, delay: Duration) -> Self {
        Self {
            max_attempts,
            delay,
            backoff_factor: 1,
            jitter: Duration::ZERO,
        }
    }

    /// 指数退避 + 随机抖动
    pub fn backoff(max_attempts: usize, delay: Duration, jitter: Duration) -> Self {
        Self {
            max_attempts,
            delay,
            backoff_factor: 2,
            jitter,
        }
    }

    /// 第 `attempt` 次（从 0 开始）失败后的等待时间
    pub fn delay_for(&self, attempt: usize) -> Duration {
        let exponent = u32::try_from(attempt).unwrap_or(u32::MAX).min(16);
        let base = self
            .delay
            .saturating_mul(self.backoff_factor.max(1).saturating_pow(exponent));
        let jitter_ms = self.jitter.as_millis() as u64;
        if jitter_ms == 0 {
            base
        } else {
            base + Duration::from_millis(rand::rng().random_range(0..=jitter_ms))
        }
    }

    fn attempts(&self) -> usize {
        self.max_attempts.max(1)
    }
}

/// 重试一个可能失败的异步操作，用尽次数后返回最后一次的错误
pub async fn retry_async<T, E, F, Fut>(policy: &RetryPolicy, what: &str, mut op: F) -> Result<T, E>
where
    E: Display,
    F: FnMut(usize) -> Fut,
    Fut: Future<Output = Result<T, E>>,
{
    let attempts = policy.attempts();
    let mut attempt = 0;
    loop {
        match op(attempt).await {
            Ok(value) => return Ok(value),
            Err(e) if attempt + 1 >= attempts => {
                warn!("{} 失败，已尝试 {} 次: {}", what, attempts, e);
                return Err(e);
            }
            Err(e) => {
                let wait = policy.delay_for(attempt);
                warn!(
                    "{} 失败 (尝试 {}/{}), {}ms 后重试: {}",
                    what,
                    attempt + 1,
                    attempts,
                    wait.as_millis(),
                    e
                );
                sleep(wait).await;
            }
        }
        attempt += 1;
    }
}

/// 反复检查条件直到满足，用尽次数后放弃并返回 false
pub async fn wait_until<F, Fut>(policy: &RetryPolicy, what: &str, mut check: F) -> bool
where
    F: FnMut(usize) -> Fut,
    Fut: Future<Output = bool>,
{
    let attempts = policy.attempts();
    for attempt in 0..attempts {
        if check(attempt).await {
            return true;
        }
        debug!("{}: 尝试 {}/{} 未满足", what, attempt + 1, attempts);
        if attempt + 1 < attempts {
            sleep(policy.delay_for(attempt)).await;
        }
    }
    false
}
