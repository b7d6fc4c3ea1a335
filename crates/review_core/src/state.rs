use crate::job::{ItemLimits, JobId};
use crate::planner::{JobDraft, MAX_BATCH_SIZE};
use crate::scope::{IdKind, IdValidation, JobScope};
use crate::tracker::TrackerState;
use crate::view_model::{AppViewModel, JobRowView, SelectedJobView};

/// Knobs the state machine needs when it builds poll and submit effects.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrackerConfig {
    pub job_list_limit: u32,
    pub include_completed: bool,
    pub entity_type: Option<String>,
    pub item_limits: ItemLimits,
    pub max_batch_size: u64,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            job_list_limit: 50,
            include_completed: true,
            entity_type: None,
            item_limits: ItemLimits::default(),
            max_batch_size: MAX_BATCH_SIZE,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum SubmissionState {
    #[default]
    Idle,
    /// Waiting on `count-scope` before planning.
    Counting { label: String },
    Submitting { label: String, total_items: u64 },
    Submitted { job_id: JobId },
    Failed { message: String },
}

impl SubmissionState {
    pub fn is_busy(&self) -> bool {
        matches!(
            self,
            SubmissionState::Counting { .. } | SubmissionState::Submitting { .. }
        )
    }
}

/// In-flight guard for the job poll. A tick arriving while a poll is outstanding
/// is dropped; a forced poll is remembered once and issued when the poll returns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub(crate) struct PollGuard {
    pub in_flight: bool,
    pub force_pending: bool,
    pub tick: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub(crate) struct IdInput {
    pub kind: Option<IdKind>,
    pub target_type: String,
    pub generation: u64,
    pub validation: IdValidation,
    /// Last non-transient validation failure for the current generation.
    pub error: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct PendingSubmission {
    pub draft: JobDraft,
    pub scope: JobScope,
}

#[derive(Debug, Clone, Default)]
pub struct AppState {
    pub(crate) config: TrackerConfig,
    pub(crate) tracker: TrackerState,
    pub(crate) poll: PollGuard,
    pub(crate) loaded: bool,
    pub(crate) list_open: bool,
    pub(crate) unseen_count: u32,
    pub(crate) unseen_in_flight: bool,
    pub(crate) ids: IdInput,
    pub(crate) submission: SubmissionState,
    pub(crate) pending: Option<PendingSubmission>,
    pub(crate) last_error: Option<String>,
    dirty: bool,
}

impl AppState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config(config: TrackerConfig) -> Self {
        Self {
            config,
            ..Self::default()
        }
    }

    pub fn tracker(&self) -> &TrackerState {
        &self.tracker
    }

    pub fn poll_tick(&self) -> u64 {
        self.poll.tick
    }

    pub fn poll_in_flight(&self) -> bool {
        self.poll.in_flight
    }

    pub fn id_validation(&self) -> &IdValidation {
        &self.ids.validation
    }

    pub fn id_validation_error(&self) -> Option<&str> {
        self.ids.error.as_deref()
    }

    pub fn submission(&self) -> &SubmissionState {
        &self.submission
    }

    /// Job ids whose completion was already announced, for persistence.
    pub fn notified_jobs(&self) -> Vec<JobId> {
        self.tracker.notified().cloned().collect()
    }

    /// True while the job poll should keep ticking.
    pub fn needs_polling(&self) -> bool {
        !self.loaded || self.tracker.has_active_jobs()
    }

    pub fn view(&self) -> AppViewModel {
        let jobs = self
            .tracker
            .jobs()
            .iter()
            .map(|job| JobRowView {
                job_id: job.id.clone(),
                label: job.label.clone(),
                status: job.status,
                processed: job.processed_items,
                total: job.total_items,
                flagged: job.flagged_items,
                cost: job.cost,
                seen: job.seen,
            })
            .collect();

        let selected = self.tracker.detail().map(|detail| SelectedJobView {
            job: detail.job.clone(),
            items: detail.items.clone(),
        });

        AppViewModel {
            jobs,
            selected_job_id: self.tracker.selected().cloned(),
            selected,
            list_open: self.list_open,
            unseen_count: self.unseen_count,
            validation: self.ids.validation.clone(),
            submission: self.submission.clone(),
            last_error: self.last_error.clone(),
            polling: self.poll.in_flight,
            dirty: self.dirty,
        }
    }

    pub(crate) fn mark_dirty(&mut self) {
        self.dirty = true;
    }

    /// Returns whether the state changed since the last call, clearing the flag.
    pub fn consume_dirty(&mut self) -> bool {
        std::mem::take(&mut self.dirty)
    }
}
