//! Executes a [`SubmissionPlan`]: create, then append the remaining windows one at a time.
use review_core::{Job, JobId, SubmissionFailure, SubmissionPlan};
use review_logging::{review_error, review_info, review_warn};
use thiserror::Error;

use crate::client::Backend;
use crate::types::BackendError;

/// The single error a failed submission attempt produces.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SubmissionError {
    #[error("job creation failed: {source}")]
    Create { source: BackendError },
    #[error("batch {batch} of {batches} for job {job_id} failed: {source}")]
    Append {
        job_id: JobId,
        /// 1-based, counting the create call as batch 1.
        batch: usize,
        batches: usize,
        source: BackendError,
        /// Set when the cleanup cancel failed too.
        cancel_error: Option<BackendError>,
    },
}

impl SubmissionError {
    fn source_error(&self) -> &BackendError {
        match self {
            SubmissionError::Create { source } | SubmissionError::Append { source, .. } => source,
        }
    }

    /// Job that was created and then cancelled.
    pub fn cancelled_job(&self) -> Option<&JobId> {
        match self {
            SubmissionError::Append {
                job_id,
                cancel_error: None,
                ..
            } => Some(job_id),
            _ => None,
        }
    }

    /// Operator-facing text.
    pub fn user_message(&self) -> String {
        if matches!(self.source_error(), BackendError::PayloadTooLarge(_)) {
            return "The backend rejected a batch as too large. Lower the batch size or narrow \
                    the scope with a filter, then submit again."
                .to_string();
        }
        match self {
            SubmissionError::Create { source } => {
                format!("Could not create the job: {source}. Nothing was submitted.")
            }
            SubmissionError::Append {
                job_id,
                batch,
                batches,
                source,
                cancel_error,
            } => {
                let cleanup = match cancel_error {
                    None => format!("Job {job_id} was cancelled."),
                    Some(err) => {
                        format!("Cancelling job {job_id} also failed ({err}); cancel it manually.")
                    }
                };
                format!(
                    "Preparing batch {batch} of {batches} failed: {source}. {cleanup} \
                     Retry with a smaller batch or a filtered scope."
                )
            }
        }
    }

    /// The failure as the state machine sees it.
    pub fn to_failure(&self) -> SubmissionFailure {
        SubmissionFailure {
            message: self.user_message(),
            cancelled_job: self.cancelled_job().cloned(),
        }
    }
}

/// Creates the job with its first window, then appends the rest strictly in order.
///
/// Any append failure cancels the job once and stops; no window is retried.
pub async fn submit_plan(
    backend: &dyn Backend,
    plan: &SubmissionPlan,
) -> Result<Job, SubmissionError> {
    let batches = plan.appends.len() + 1;
    let job = backend
        .create_job(&plan.create)
        .await
        .map_err(|source| SubmissionError::Create { source })?;
    review_info!(
        "Created job {} ({} items, {} batches)",
        job.id,
        plan.total_items(),
        batches
    );

    for (index, append) in plan.appends.iter().enumerate() {
        if let Err(source) = backend.append_items(&job.id, append).await {
            let batch = index + 2;
            review_warn!(
                "Append {} of {} for job {} failed: {}; cancelling",
                batch,
                batches,
                job.id,
                source
            );
            let cancel_error = backend.cancel(&job.id).await.err();
            if let Some(err) = &cancel_error {
                review_error!("Cleanup cancel of job {} failed: {}", job.id, err);
            }
            return Err(SubmissionError::Append {
                job_id: job.id.clone(),
                batch,
                batches,
                source,
                cancel_error,
            });
        }
    }

    Ok(job)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn payload_too_large_gets_its_own_message() {
        let err = SubmissionError::Append {
            job_id: "j1".into(),
            batch: 2,
            batches: 3,
            source: BackendError::PayloadTooLarge("413".into()),
            cancel_error: None,
        };
        assert!(err.user_message().contains("too large"));
        assert!(!err.user_message().contains("Preparing batch"));
    }

    #[test]
    fn append_failure_names_the_batch_and_the_cancel() {
        let err = SubmissionError::Append {
            job_id: "j1".into(),
            batch: 2,
            batches: 3,
            source: BackendError::Timeout("slow".into()),
            cancel_error: None,
        };
        let message = err.user_message();
        assert!(message.contains("batch 2 of 3"));
        assert!(message.contains("Job j1 was cancelled."));
        assert_eq!(err.to_failure().cancelled_job.as_deref(), Some("j1"));
    }

    #[test]
    fn failed_cleanup_is_not_reported_as_cancelled() {
        let err = SubmissionError::Append {
            job_id: "j1".into(),
            batch: 3,
            batches: 3,
            source: BackendError::Timeout("slow".into()),
            cancel_error: Some(BackendError::Connection("reset".into())),
        };
        assert_eq!(err.cancelled_job(), None);
        assert!(err.user_message().contains("cancel it manually"));
    }
}
