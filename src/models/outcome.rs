//! 批处理结果记录

use std::fmt::Display;

use crate::models::resource::ResourceRef;

/// 单个文件的最终状态
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutcomeStatus {
    Success,
    Failed,
}

impl Display for OutcomeStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OutcomeStatus::Success => write!(f, "SUCCESS"),
            OutcomeStatus::Failed => write!(f, "FAILED"),
        }
    }
}

/// 单个资源的处理结果
#[derive(Debug, Clone)]
pub struct BatchOutcome {
    pub resource: ResourceRef,
    pub status: OutcomeStatus,
    pub detail: String,
}

impl BatchOutcome {
    pub fn success(resource: ResourceRef, detail: impl Into<String>) -> Self {
        Self {
            resource,
            status: OutcomeStatus::Success,
            detail: detail.into(),
        }
    }

    pub fn failed(resource: ResourceRef, detail: impl Into<String>) -> Self {
        Self {
            resource,
            status: OutcomeStatus::Failed,
            detail: detail.into(),
        }
    }

    pub fn is_success(&self) -> bool {
        self.status == OutcomeStatus::Success
    }
}

/// 整批汇总（只追加）
#[derive(Debug, Default, Clone)]
pub struct BatchSummary {
    outcomes: Vec<BatchOutcome>,
}

impl BatchSummary {
    pub fn push(&mut self, outcome: BatchOutcome) {
        self.outcomes.push(outcome);
    }

    pub fn outcomes(&self) -> &[BatchOutcome] {
        &self.outcomes
    }

    pub fn success_count(&self) -> usize {
        self.outcomes.iter().filter(|o| o.is_success()).count()
    }

    pub fn failed_count(&self) -> usize {
        self.outcomes.len() - self.success_count()
    }

    pub fn total(&self) -> usize {
        self.outcomes.len()
    }
}
