use std::sync::Mutex;

use chrono::{TimeZone, Utc};
use pretty_assertions::assert_eq;
use review_core::{
    build_submission_plan, AppendItemsPayload, CreateJobPayload, Estimate, IdCheck, IdKind,
    ItemLimits, Job, JobDraft, JobScope, JobStatus,
};
use review_engine::{
    submit_plan, Backend, BackendError, JobDetailResponse, JobListQuery, PreviewSet,
    ScopedRequest, SubmissionError,
};

#[derive(Debug, Clone, PartialEq, Eq)]
enum Call {
    Create { total_items: u64 },
    Append { job_id: String, submitted_through: u64 },
    Cancel { job_id: String },
}

/// Records calls and fails the append whose 1-based position is `fail_append`.
#[derive(Default)]
struct FakeBackend {
    calls: Mutex<Vec<Call>>,
    appends_seen: Mutex<usize>,
    fail_append: Option<usize>,
    fail_append_with: Option<BackendError>,
    status: Mutex<Option<JobStatus>>,
}

impl FakeBackend {
    fn failing_append(n: usize, error: BackendError) -> Self {
        Self {
            fail_append: Some(n),
            fail_append_with: Some(error),
            ..Self::default()
        }
    }

    fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    fn record(&self, call: Call) {
        self.calls.lock().unwrap().push(call);
    }
}

fn job(id: &str, total: u64) -> Job {
    Job {
        id: id.into(),
        label: "Spelling pass".into(),
        status: JobStatus::Queued,
        entity_type: None,
        total_items: total,
        submitted_items: 0,
        processed_items: 0,
        succeeded_items: 0,
        failed_items: 0,
        flagged_items: 0,
        input_tokens: 0,
        output_tokens: 0,
        cost: None,
        seen: true,
        created_at: Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0).unwrap(),
        started_at: None,
        completed_at: None,
        updated_at: None,
    }
}

#[async_trait::async_trait]
impl Backend for FakeBackend {
    async fn create_job(&self, payload: &CreateJobPayload) -> Result<Job, BackendError> {
        self.record(Call::Create {
            total_items: payload.total_items,
        });
        *self.status.lock().unwrap() = Some(JobStatus::Queued);
        Ok(job("job-1", payload.total_items))
    }

    async fn append_items(
        &self,
        job_id: &str,
        payload: &AppendItemsPayload,
    ) -> Result<(), BackendError> {
        self.record(Call::Append {
            job_id: job_id.into(),
            submitted_through: payload.submitted_through,
        });
        let mut seen = self.appends_seen.lock().unwrap();
        *seen += 1;
        if Some(*seen) == self.fail_append {
            return Err(self
                .fail_append_with
                .clone()
                .unwrap_or(BackendError::Timeout("append".into())));
        }
        Ok(())
    }

    async fn cancel(&self, job_id: &str) -> Result<(), BackendError> {
        self.record(Call::Cancel {
            job_id: job_id.into(),
        });
        *self.status.lock().unwrap() = Some(JobStatus::Cancelled);
        Ok(())
    }

    async fn delete(&self, _job_id: &str) -> Result<(), BackendError> {
        unreachable!("not used by submission")
    }

    async fn mark_seen(&self, _job_id: &str) -> Result<(), BackendError> {
        unreachable!("not used by submission")
    }

    async fn get_job(
        &self,
        _job_id: &str,
        _limits: ItemLimits,
    ) -> Result<JobDetailResponse, BackendError> {
        unreachable!("not used by submission")
    }

    async fn list_jobs(&self, _query: &JobListQuery) -> Result<Vec<Job>, BackendError> {
        unreachable!("not used by submission")
    }

    async fn count_scope(&self, _request: &ScopedRequest) -> Result<u64, BackendError> {
        unreachable!("not used by submission")
    }

    async fn estimate(&self, _request: &ScopedRequest) -> Result<Estimate, BackendError> {
        unreachable!("not used by submission")
    }

    async fn preview(&self, _request: &ScopedRequest) -> Result<PreviewSet, BackendError> {
        unreachable!("not used by submission")
    }

    async fn validate_ids(
        &self,
        _kind: IdKind,
        _target_type: &str,
        _ids: &[String],
    ) -> Result<IdCheck, BackendError> {
        unreachable!("not used by submission")
    }

    async fn unseen_count(&self) -> Result<u32, BackendError> {
        unreachable!("not used by submission")
    }
}

fn plan(total: u64, batch: u64) -> review_core::SubmissionPlan {
    let draft = JobDraft {
        label: "Spelling pass".into(),
        model: "small-model".into(),
        template: "Check {{title}}".into(),
        ..JobDraft::default()
    };
    let scope = JobScope::ByIds {
        target_type: "entry".into(),
        ids: (0..total).map(|i| format!("e{i}")).collect(),
    };
    build_submission_plan(&draft, &scope, total, batch).expect("plan")
}

#[tokio::test]
async fn all_windows_are_submitted_in_order() {
    review_logging::initialize_for_tests();
    let backend = FakeBackend::default();
    let job = submit_plan(&backend, &plan(10, 4)).await.expect("submitted");

    assert_eq!(job.id, "job-1");
    assert_eq!(
        backend.calls(),
        vec![
            Call::Create { total_items: 10 },
            Call::Append {
                job_id: "job-1".into(),
                submitted_through: 8
            },
            Call::Append {
                job_id: "job-1".into(),
                submitted_through: 10
            },
        ]
    );
}

#[tokio::test]
async fn failure_on_second_of_three_appends_cancels_once_and_stops() {
    let backend = FakeBackend::failing_append(2, BackendError::Timeout("slow".into()));
    // Four windows: the create plus three appends.
    let err = submit_plan(&backend, &plan(16, 4)).await.unwrap_err();

    assert_eq!(
        backend.calls(),
        vec![
            Call::Create { total_items: 16 },
            Call::Append {
                job_id: "job-1".into(),
                submitted_through: 8
            },
            Call::Append {
                job_id: "job-1".into(),
                submitted_through: 12
            },
            Call::Cancel {
                job_id: "job-1".into()
            },
        ]
    );
    assert_eq!(*backend.status.lock().unwrap(), Some(JobStatus::Cancelled));
    assert!(matches!(err, SubmissionError::Append { batch: 3, batches: 4, .. }));
    assert_eq!(err.cancelled_job().map(String::as_str), Some("job-1"));
}

#[tokio::test]
async fn payload_too_large_yields_specific_message() {
    let backend =
        FakeBackend::failing_append(1, BackendError::PayloadTooLarge("entity too large".into()));
    let err = submit_plan(&backend, &plan(8, 4)).await.unwrap_err();
    let failure = err.to_failure();
    assert!(failure.message.contains("too large"));
    assert_eq!(failure.cancelled_job.as_deref(), Some("job-1"));
}

#[tokio::test]
async fn single_window_plan_makes_one_call() {
    let backend = FakeBackend::default();
    submit_plan(&backend, &plan(3, 3000)).await.expect("submitted");
    assert_eq!(backend.calls(), vec![Call::Create { total_items: 3 }]);
}
