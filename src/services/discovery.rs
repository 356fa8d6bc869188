//! 收敛发现循环 - 业务能力层
//!
//! 懒加载视图没有"已全部加载"的信号，只能反复 探测 → 推进 → 探测，
//! 直到连续若干次没有新条目、达到条目上限或达到探测次数上限。
//!
//! 探测/推进过程中的错误一律视为"本轮没有新条目"，循环本身从不返回错误。

use std::collections::HashSet;
use std::time::Duration;

use async_trait::async_trait;
use tokio::time::sleep;
use tracing::{debug, info, warn};

use crate::error::AppResult;
use crate::models::{DiscoveredItem, ProbedItem};

/// 发现循环参数
#[derive(Debug, Clone)]
pub struct DiscoveryConfig {
    /// 连续多少次探测没有新条目即视为收敛
    pub max_idle_probes: usize,
    /// 条目总数硬上限
    pub max_items: usize,
    /// 两次探测之间的等待
    pub inter_probe_delay: Duration,
    /// 探测次数硬上限，与空闲计数无关
    pub max_probes: usize,
}

impl DiscoveryConfig {
    /// 文档页面图片的默认参数
    pub fn page_images() -> Self {
        Self {
            max_idle_probes: 8,
            max_items: 200,
            inter_probe_delay: Duration::from_secs(1),
            max_probes: 1000,
        }
    }

    /// 文件夹条目的默认参数
    pub fn folder_entries() -> Self {
        Self {
            max_idle_probes: 15,
            max_items: 10_000,
            inter_probe_delay: Duration::from_secs(1),
            max_probes: 100,
        }
    }
}

/// 循环结束原因
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    /// 连续空闲探测达到阈值
    Converged,
    /// 条目数达到上限
    CapReached,
    /// 探测次数达到上限（返回部分结果）
    ProbeCeiling,
}

/// 发现结果
#[derive(Debug, Clone)]
pub struct DiscoveryOutcome {
    /// 按首次出现顺序排列，无重复 id
    pub items: Vec<DiscoveredItem>,
    pub reason: StopReason,
    pub probes: usize,
}

/// 可被探测的懒加载集合
#[async_trait]
pub trait DiscoverySource: Send {
    /// 当前可见的条目（可能与上次重叠）
    async fn probe(&mut self) -> AppResult<Vec<ProbedItem>>;

    /// 推进视图以触发更多条目加载
    async fn advance(&mut self) -> AppResult<()>;

    /// 日志中使用的名称
    fn label(&self) -> &'static str {
        "条目"
    }
}

/// 单次发现过程的状态
#[derive(Debug, Default)]
struct DiscoverySession {
    collected: Vec<DiscoveredItem>,
    seen: HashSet<String>,
    no_progress_count: usize,
    probe_count: usize,
}

impl DiscoverySession {
    /// 合并一批探测结果，返回新增数量
    fn absorb(&mut self, batch: Vec<ProbedItem>, max_items: usize) -> usize {
        let mut added = 0;
        for item in batch {
            if self.collected.len() >= max_items {
                break;
            }
            if self.seen.insert(item.id.clone()) {
                self.collected.push(DiscoveredItem {
                    id: item.id,
                    name: item.name,
                    order: self.collected.len(),
                });
                added += 1;
            }
        }
        added
    }
}

/// 运行发现循环
pub async fn discover(source: &mut dyn DiscoverySource, config: &DiscoveryConfig) -> DiscoveryOutcome {
    let label = source.label();
    let max_items = config.max_items.max(1);
    let mut session = DiscoverySession::default();

    let reason = loop {
        session.probe_count += 1;

        let added = match source.probe().await {
            Ok(batch) => {
                let seen_now = batch.len();
                let added = session.absorb(batch, max_items);
                debug!(
                    "探测 {}: 可见 {} 个{}, 累计 {} (新增 {})",
                    session.probe_count,
                    seen_now,
                    label,
                    session.collected.len(),
                    added
                );
                added
            }
            Err(e) => {
                debug!("探测 {} 失败，按无新增处理: {}", session.probe_count, e);
                0
            }
        };

        if session.collected.len() >= max_items {
            warn!("⚠️ 已达到{}上限 ({})，停止发现", label, max_items);
            break StopReason::CapReached;
        }

        if added == 0 {
            session.no_progress_count += 1;
        } else {
            session.no_progress_count = 0;
        }

        if session.no_progress_count >= config.max_idle_probes {
            debug!("连续 {} 次没有新{}，发现完成", session.no_progress_count, label);
            break StopReason::Converged;
        }

        if session.probe_count >= config.max_probes {
            warn!(
                "⚠️ 已达到探测次数上限 ({})，返回已发现的 {} 个{}",
                config.max_probes,
                session.collected.len(),
                label
            );
            break StopReason::ProbeCeiling;
        }

        if let Err(e) = source.advance().await {
            debug!("推进视图失败，忽略: {}", e);
        }

        sleep(config.inter_probe_delay).await;
    };

    info!(
        "🔎 发现 {} 个{} (探测 {} 次)",
        session.collected.len(),
        label,
        session.probe_count
    );

    DiscoveryOutcome {
        items: session.collected,
        reason,
        probes: session.probe_count,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{AppError, BrowserError};

    /// 按脚本返回探测结果，脚本用尽后重复最后一帧
    struct ScriptedSource {
        frames: Vec<AppResult<Vec<ProbedItem>>>,
        probes: usize,
        advances: usize,
        fail_advance: bool,
    }

    impl ScriptedSource {
        fn new(frames: Vec<AppResult<Vec<ProbedItem>>>) -> Self {
            Self {
                frames,
                probes: 0,
                advances: 0,
                fail_advance: false,
            }
        }
    }

    fn ids(list: &[&str]) -> AppResult<Vec<ProbedItem>> {
        Ok(list.iter().map(|id| ProbedItem::new(*id)).collect())
    }

    fn probe_error() -> AppResult<Vec<ProbedItem>> {
        Err(AppError::Browser(BrowserError::Timeout {
            operation: "eval".into(),
            millis: 10,
        }))
    }

    fn clone_frame(frame: &AppResult<Vec<ProbedItem>>) -> AppResult<Vec<ProbedItem>> {
        match frame {
            Ok(items) => Ok(items.clone()),
            Err(_) => probe_error(),
        }
    }

    #[async_trait]
    impl DiscoverySource for ScriptedSource {
        async fn probe(&mut self) -> AppResult<Vec<ProbedItem>> {
            let idx = self.probes.min(self.frames.len() - 1);
            self.probes += 1;
            clone_frame(&self.frames[idx])
        }

        async fn advance(&mut self) -> AppResult<()> {
            self.advances += 1;
            if self.fail_advance {
                return Err(AppError::Other("scroll failed".into()));
            }
            Ok(())
        }
    }

    fn config(max_idle: usize, max_items: usize, max_probes: usize) -> DiscoveryConfig {
        DiscoveryConfig {
            max_idle_probes: max_idle,
            max_items,
            inter_probe_delay: Duration::ZERO,
            max_probes,
        }
    }

    fn collected_ids(outcome: &DiscoveryOutcome) -> Vec<&str> {
        outcome.items.iter().map(|i| i.id.as_str()).collect()
    }

    #[tokio::test]
    async fn converges_after_idle_probes_following_last_new_id() {
        // 每次最多新增一个，第 4 次探测之后不再有新 id
        let mut source = ScriptedSource::new(vec![
            ids(&["a"]),
            ids(&["a", "b"]),
            ids(&["a", "b", "c"]),
            ids(&["a", "b", "c", "d"]),
        ]);
        let outcome = discover(&mut source, &config(3, 100, 1000)).await;

        assert_eq!(outcome.reason, StopReason::Converged);
        assert_eq!(collected_ids(&outcome), vec!["a", "b", "c", "d"]);
        assert!(outcome.probes <= 4 + 3 + 1);
        assert_eq!(outcome.probes, 7);
    }

    #[tokio::test]
    async fn dedup_keeps_first_seen_order_and_ignores_name_changes() {
        let mut source = ScriptedSource::new(vec![
            Ok(vec![ProbedItem::named("b", "second.pdf"), ProbedItem::named("a", "first.pdf")]),
            Ok(vec![
                ProbedItem::named("a", "renamed.pdf"),
                ProbedItem::named("b", "other.pdf"),
                ProbedItem::named("c", "third.pdf"),
            ]),
            Ok(vec![ProbedItem::new("c"), ProbedItem::new("a")]),
        ]);
        let outcome = discover(&mut source, &config(2, 100, 1000)).await;

        assert_eq!(collected_ids(&outcome), vec!["b", "a", "c"]);
        assert_eq!(outcome.items[1].name.as_deref(), Some("first.pdf"));
        let orders: Vec<usize> = outcome.items.iter().map(|i| i.order).collect();
        assert_eq!(orders, vec![0, 1, 2]);
    }

    /// 每次探测都返回全新的 id
    struct EndlessSource {
        next: usize,
    }

    #[async_trait]
    impl DiscoverySource for EndlessSource {
        async fn probe(&mut self) -> AppResult<Vec<ProbedItem>> {
            let batch = (self.next..self.next + 7)
                .map(|n| ProbedItem::new(format!("id-{}", n)))
                .collect();
            self.next += 7;
            Ok(batch)
        }

        async fn advance(&mut self) -> AppResult<()> {
            Ok(())
        }
    }

    #[tokio::test]
    async fn safety_cap_bounds_unbounded_sources() {
        let mut source = EndlessSource { next: 0 };
        let outcome = discover(&mut source, &config(3, 50, 10_000)).await;

        assert_eq!(outcome.reason, StopReason::CapReached);
        assert_eq!(outcome.items.len(), 50);
        assert_eq!(outcome.items.last().map(|i| i.id.as_str()), Some("id-49"));
    }

    #[tokio::test]
    async fn probe_ceiling_returns_partial_result() {
        let mut source = EndlessSource { next: 0 };
        let outcome = discover(&mut source, &config(3, 10_000, 4)).await;

        assert_eq!(outcome.reason, StopReason::ProbeCeiling);
        assert_eq!(outcome.probes, 4);
        assert_eq!(outcome.items.len(), 28);
    }

    #[tokio::test]
    async fn probe_errors_count_as_idle_and_never_abort() {
        let mut source = ScriptedSource::new(vec![
            ids(&["a"]),
            probe_error(),
            ids(&["a", "b"]),
            probe_error(),
        ]);
        source.fail_advance = true;
        let outcome = discover(&mut source, &config(2, 100, 1000)).await;

        assert_eq!(outcome.reason, StopReason::Converged);
        assert_eq!(collected_ids(&outcome), vec!["a", "b"]);
        // 推进失败也不影响循环继续
        assert_eq!(source.advances, outcome.probes - 1);
    }

    #[tokio::test]
    async fn empty_view_converges_with_nothing() {
        let mut source = ScriptedSource::new(vec![ids(&[])]);
        let outcome = discover(&mut source, &config(3, 100, 1000)).await;

        assert_eq!(outcome.reason, StopReason::Converged);
        assert!(outcome.items.is_empty());
        assert_eq!(outcome.probes, 3);
    }
}
