//! Job and item records as reported by the processing backend.
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub type JobId = String;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Queued,
    Running,
    Paused,
    Completed,
    Failed,
    Cancelled,
}

impl JobStatus {
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            JobStatus::Completed | JobStatus::Failed | JobStatus::Cancelled
        )
    }

    /// Statuses from which a "job finished" notification can fire.
    pub fn is_active(self) -> bool {
        matches!(self, JobStatus::Queued | JobStatus::Running)
    }

    /// Client-initiated cancel is allowed from any non-terminal status.
    pub fn can_cancel(self) -> bool {
        !self.is_terminal()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ItemStatus {
    Queued,
    Submitting,
    Processing,
    Succeeded,
    Failed,
    Skipped,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobType {
    #[default]
    Flag,
    Edit,
    Review,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReasoningEffort {
    Minimal,
    #[default]
    Low,
    Medium,
    High,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ServiceTier {
    #[default]
    Default,
    Flex,
    Priority,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Job {
    pub id: JobId,
    #[serde(default)]
    pub label: String,
    pub status: JobStatus,
    #[serde(default)]
    pub entity_type: Option<String>,
    pub total_items: u64,
    pub submitted_items: u64,
    pub processed_items: u64,
    pub succeeded_items: u64,
    pub failed_items: u64,
    #[serde(default)]
    pub flagged_items: u64,
    #[serde(default)]
    pub input_tokens: u64,
    #[serde(default)]
    pub output_tokens: u64,
    #[serde(default)]
    pub cost: Option<f64>,
    #[serde(default)]
    pub seen: bool,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub started_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub completed_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
}

impl Job {
    /// `succeeded + failed <= processed <= submitted <= total`.
    pub fn counters_consistent(&self) -> bool {
        self.succeeded_items.saturating_add(self.failed_items) <= self.processed_items
            && self.processed_items <= self.submitted_items
            && self.submitted_items <= self.total_items
    }

    /// Processed share in `[0, 1]`; zero-sized jobs count as done.
    pub fn progress(&self) -> f64 {
        if self.total_items == 0 {
            return 1.0;
        }
        (self.processed_items as f64 / self.total_items as f64).min(1.0)
    }
}

/// Reference to the record an item works on.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TargetRef {
    pub record_type: String,
    pub code: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobItem {
    pub id: String,
    pub job_id: JobId,
    pub target: TargetRef,
    pub status: ItemStatus,
    #[serde(default)]
    pub last_error: Option<String>,
    #[serde(default)]
    pub response: Option<serde_json::Value>,
    #[serde(default)]
    pub flagged: bool,
    #[serde(default)]
    pub has_edits: bool,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
}

/// A job plus the currently fetched page of its items.
///
/// Both halves are reference-counted so an unchanged half can be carried across
/// polls without copying and compared by pointer.
#[derive(Debug, Clone, PartialEq)]
pub struct JobDetail {
    pub job: Arc<Job>,
    pub items: Arc<Vec<JobItem>>,
}

/// Item page sizes requested with a job detail fetch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ItemLimits {
    pub pending: u32,
    pub succeeded: u32,
    pub failed: u32,
}

impl Default for ItemLimits {
    fn default() -> Self {
        Self {
            pending: 50,
            succeeded: 50,
            failed: 50,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn paused_is_neither_active_nor_terminal() {
        assert!(!JobStatus::Paused.is_active());
        assert!(!JobStatus::Paused.is_terminal());
        assert!(JobStatus::Paused.can_cancel());
        assert!(!JobStatus::Failed.can_cancel());
    }

    #[test]
    fn job_deserializes_from_backend_json() {
        let job: Job = serde_json::from_value(serde_json::json!({
            "id": "job-1",
            "status": "running",
            "totalItems": 10,
            "submittedItems": 10,
            "processedItems": 4,
            "succeededItems": 3,
            "failedItems": 1,
            "createdAt": "2026-01-01T00:00:00Z"
        }))
        .unwrap();
        assert_eq!(job.status, JobStatus::Running);
        assert!(job.counters_consistent());
        assert!((job.progress() - 0.4).abs() < f64::EPSILON);
    }
}
