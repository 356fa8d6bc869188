//! 发现与抓取过程中的条目

/// 单次探测看到的条目（尚未分配顺序）
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProbedItem {
    /// 稳定标识，去重键
    pub id: String,
    /// 展示名，可能缺失或在多次探测间变化
    pub name: Option<String>,
}

impl ProbedItem {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: None,
        }
    }

    pub fn named(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: Some(name.into()),
        }
    }
}

/// 已发现条目
///
/// `order` 是首次出现的位置，插入后不再修改
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiscoveredItem {
    pub id: String,
    pub name: Option<String>,
    pub order: usize,
}

/// 抓取成功所使用的策略
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CaptureStrategy {
    /// 在页面上下文中直接 fetch
    DirectFetch,
    /// 画布重绘回退
    CanvasRender,
}

/// 已抓取的页面
#[derive(Debug, Clone)]
pub struct CapturedPage {
    /// 对应 `DiscoveredItem::order`
    pub order: usize,
    pub bytes: Vec<u8>,
    pub strategy: CaptureStrategy,
}
