use crate::job::{ItemLimits, JobId, JobStatus};
use crate::planner::{JobDraft, SubmissionPlan};
use crate::scope::{IdKind, JobScope};

#[derive(Debug, Clone, PartialEq)]
pub enum Effect {
    /// Fetch the job list and, if `detail` is set, that job's item page.
    PollJobs {
        include_completed: bool,
        limit: u32,
        entity_type: Option<String>,
        detail: Option<(JobId, ItemLimits)>,
    },
    FetchUnseenCount,
    MarkSeen { job_id: JobId },
    CancelJob { job_id: JobId },
    DeleteJob { job_id: JobId },
    /// (Re)start the validation debounce timer, dropping any earlier one.
    ScheduleValidation { generation: u64 },
    CancelValidation,
    ValidateIds {
        generation: u64,
        kind: IdKind,
        target_type: String,
        ids: Vec<String>,
    },
    CountScope { draft: JobDraft, scope: JobScope },
    /// Create the job, then append the remaining windows one at a time.
    SubmitPlan(SubmissionPlan),
    NotifyCompleted {
        job_id: JobId,
        label: String,
        status: JobStatus,
    },
}
