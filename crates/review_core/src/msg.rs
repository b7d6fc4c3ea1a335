use crate::job::{Job, JobId, JobItem};
use crate::planner::JobDraft;
use crate::scope::{IdKind, ScopeDescriptor};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    /// Timeout, connection loss, "try again": resolved by the next poll.
    Transient,
    NotFound,
    /// Validation and other client errors; surfaced to the operator.
    Persistent,
}

/// A backend call that failed, reduced to what the state machine needs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackendFailure {
    pub kind: FailureKind,
    pub message: String,
}

impl BackendFailure {
    pub fn new(kind: FailureKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }
}

/// Outcome of a failed create/append sequence, after the cleanup cancel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubmissionFailure {
    /// Operator-facing message.
    pub message: String,
    /// Job that was created and then cancelled, if creation got that far.
    pub cancelled_job: Option<JobId>,
}

/// Ids the backend recognised and rejected.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct IdCheck {
    pub valid: Vec<String>,
    pub unknown: Vec<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DetailPoll {
    pub job_id: JobId,
    pub result: Result<(Job, Vec<JobItem>), BackendFailure>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Msg {
    /// Job poll interval elapsed.
    PollTick,
    /// A poll cycle returned.
    PollCompleted {
        jobs: Result<Vec<Job>, BackendFailure>,
        detail: Option<DetailPoll>,
    },
    /// Unseen-count interval elapsed.
    UnseenTick,
    UnseenCountFetched(Result<u32, BackendFailure>),
    JobListOpened,
    JobListClosed,
    JobSelected(JobId),
    SelectionCleared,
    CancelClicked(JobId),
    CancelFinished {
        job_id: JobId,
        result: Result<(), BackendFailure>,
    },
    DeleteClicked(JobId),
    DeleteFinished {
        job_id: JobId,
        result: Result<(), BackendFailure>,
    },
    /// Operator edited the manual or frame id box.
    /// `target_type` is the record type the ids belong to; empty for frames.
    IdsEdited {
        kind: IdKind,
        target_type: String,
        raw: String,
    },
    /// Debounce timer for id validation fired.
    ValidationDue { generation: u64 },
    IdsValidated {
        generation: u64,
        result: Result<IdCheck, BackendFailure>,
    },
    SubmitClicked {
        draft: JobDraft,
        descriptor: ScopeDescriptor,
    },
    ScopeCounted(Result<u64, BackendFailure>),
    SubmissionFinished(Result<Job, SubmissionFailure>),
    /// Restore completion notifications already shown in a previous run.
    RestoreNotified(Vec<JobId>),
}
