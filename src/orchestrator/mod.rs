//! 编排层（Orchestration Layer）
//!
//! ## 职责
//!
//! 本层负责批量调度，是整个系统的"指挥中心"。
//!
//! ## 模块划分
//!
//! ### `batch_processor` - 批量处理器
//! - 管理应用生命周期（初始化、运行、关闭浏览器）
//! - 按阶段推进：展开文件夹 → 文件夹中的文件 → 单独的文件 → 汇总
//! - 控制节奏（文件之间、文件夹之间的固定间隔）
//! - 响应用户中断
//!
//! ### `folder_expander` - 文件夹展开器
//! - 打开单个文件夹，发现其中的 PDF 条目
//! - 根据文件夹标题确定输出子目录
//!
//! ## 层次关系
//!
//! ```text
//! batch_processor (处理 Vec<ResourceRef>)
//!     ↓
//! folder_expander (文件夹 → Vec<ResourceRef>)
//!     ↓
//! workflow::DocumentFlow (处理单个文档)
//!     ↓
//! services (能力层：discovery / capture / assembler)
//!     ↓
//! infrastructure (基础设施：BrowserSession / JsExecutor)
//! ```

pub mod batch_processor;
pub mod folder_expander;

// 重新导出主要类型
pub use batch_processor::{App, BatchPhase};
pub use folder_expander::{FolderExpander, FolderExpansion};
