use std::sync::Arc;

use crate::job::{Job, JobId, JobItem, JobStatus};
use crate::scope::IdValidation;
use crate::state::SubmissionState;

#[derive(Debug, Clone, PartialEq, Default)]
pub struct AppViewModel {
    pub jobs: Vec<JobRowView>,
    pub selected_job_id: Option<JobId>,
    pub selected: Option<SelectedJobView>,
    pub list_open: bool,
    pub unseen_count: u32,
    pub validation: IdValidation,
    pub submission: SubmissionState,
    pub last_error: Option<String>,
    pub polling: bool,
    pub dirty: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct JobRowView {
    pub job_id: JobId,
    pub label: String,
    pub status: JobStatus,
    pub processed: u64,
    pub total: u64,
    pub flagged: u64,
    pub cost: Option<f64>,
    pub seen: bool,
}

/// Shares the tracker's cached `Arc`s, so an unchanged detail is pointer-equal.
#[derive(Debug, Clone, PartialEq)]
pub struct SelectedJobView {
    pub job: Arc<Job>,
    pub items: Arc<Vec<JobItem>>,
}
