//! # Drive PDF Capture
//!
//! 从懒加载的在线预览页面中抓取页面图片并合成为 PDF 的 Rust 应用程序
//!
//! ## 架构设计
//!
//! 本系统采用严格的四层架构：
//!
//! ### ① 基础设施层（Infrastructure）
//! - `infrastructure/` - 持有稀缺资源（Browser、Page），只暴露能力
//! - `RemoteView` / `ViewOpener` - 上层唯一依赖的远程视图能力
//! - `BrowserSession` - 唯一的 Browser owner，为每个资源打开新页面
//! - `JsExecutor` - 持有单个 Page，提供 eval() 能力
//!
//! ### ② 业务能力层（Services）
//! - `services/` - 描述"我能做什么"，只处理单个条目
//! - `discover` - 收敛发现循环（探测 → 推进 → 探测）
//! - `CaptureRouter` - 单页抓取（直接获取 → 画布回退）
//! - `DocumentAssembler` - 图片规范化与 PDF 合成
//!
//! ### ③ 流程层（Workflow）
//! - `workflow/` - 定义"一个文档"的完整处理流程
//! - `DocumentCtx` - 上下文封装（序号 + 资源 + 输出目录）
//! - `DocumentFlow` - 流程编排（打开 → 等待 → 发现 → 抓取 → 合成）
//!
//! ### ④ 编排层（Orchestration）
//! - `orchestrator/batch_processor` - 批量处理器，管理浏览器和批处理阶段
//! - `orchestrator/folder_expander` - 文件夹展开器
//!
//! ## 模块结构

pub mod browser;
pub mod config;
pub mod error;
pub mod infrastructure;

pub mod models;
pub mod orchestrator;
pub mod services;
pub mod utils;
pub mod workflow;

// 重新导出常用类型
pub use config::Config;
pub use error::{AppError, AppResult};
pub use infrastructure::{BrowserSession, JsExecutor, RemoteView, ViewOpener};
pub use models::{BatchOutcome, BatchSummary, OutcomeStatus, ResourceKind, ResourceRef};
pub use orchestrator::App;
pub use workflow::{DocumentCtx, DocumentFlow};
