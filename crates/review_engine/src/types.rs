use std::fmt;

use review_core::planner::RequestMetadata;
use review_core::template::ClusteringError;
use review_core::{
    BackendFailure, FailureKind, IdCheck, Job, JobDraft, JobId, JobItem, JobScope, ReasoningEffort,
    ServiceTier, TargetRef,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::submit::SubmissionError;

/// A failed backend call.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BackendError {
    #[error("request timed out: {0}")]
    Timeout(String),
    #[error("connection failed: {0}")]
    Connection(String),
    /// 429 and 5xx responses.
    #[error("backend unavailable ({status}): {message}")]
    Unavailable { status: u16, message: String },
    #[error("not found: {0}")]
    NotFound(String),
    #[error("rejected ({status}): {message}")]
    Validation { status: u16, message: String },
    #[error("payload too large: {0}")]
    PayloadTooLarge(String),
    #[error("http status {status}: {message}")]
    Http { status: u16, message: String },
    #[error("could not decode response: {0}")]
    Decode(String),
    #[error("invalid backend url: {0}")]
    InvalidUrl(String),
}

impl BackendError {
    pub fn from_status(status: u16, message: impl Into<String>) -> Self {
        let message = message.into();
        match status {
            404 => BackendError::NotFound(message),
            413 => BackendError::PayloadTooLarge(message),
            400 | 409 | 422 => BackendError::Validation { status, message },
            429 | 500..=599 => BackendError::Unavailable { status, message },
            _ => BackendError::Http { status, message },
        }
    }

    /// Safe to drop silently; the next poll retries.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            BackendError::Timeout(_)
                | BackendError::Connection(_)
                | BackendError::Unavailable { .. }
        )
    }

    /// Reduces the error to what the state machine acts on.
    pub fn failure(&self) -> BackendFailure {
        let kind = match self {
            _ if self.is_transient() => FailureKind::Transient,
            BackendError::NotFound(_) => FailureKind::NotFound,
            _ => FailureKind::Persistent,
        };
        BackendFailure::new(kind, self.to_string())
    }
}

/// Shared body of `estimate`, `preview`, `validate` and `count-scope`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScopedRequest {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub model: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub template: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub system_prompt: String,
    pub scope: JobScope,
    #[serde(default)]
    pub metadata: RequestMetadata,
    #[serde(default)]
    pub service_tier: ServiceTier,
    #[serde(default)]
    pub reasoning: ReasoningEffort,
}

impl ScopedRequest {
    pub fn new(draft: &JobDraft, scope: JobScope) -> Self {
        Self {
            model: draft.model.clone(),
            template: draft.template.clone(),
            system_prompt: draft.system_prompt.clone(),
            scope,
            metadata: draft.metadata(),
            service_tier: draft.service_tier,
            reasoning: draft.reasoning_effort,
        }
    }

    /// A request that only carries a scope, as used by id validation.
    pub fn scope_only(scope: JobScope) -> Self {
        Self {
            model: String::new(),
            template: String::new(),
            system_prompt: String::new(),
            scope,
            metadata: RequestMetadata::default(),
            service_tier: ServiceTier::default(),
            reasoning: ReasoningEffort::default(),
        }
    }
}

/// Query for `GET jobs`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobListQuery {
    pub include_completed: bool,
    pub limit: u32,
    pub entity_type: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobDetailResponse {
    pub job: Job,
    #[serde(default)]
    pub items: Vec<JobItem>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub(crate) struct JobListResponse {
    pub jobs: Vec<Job>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub(crate) struct CountResponse {
    pub count: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub(crate) struct UnseenCountResponse {
    pub count: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct ValidateResponse {
    #[serde(default)]
    pub valid_ids: Vec<String>,
    #[serde(default)]
    pub unknown_ids: Vec<String>,
}

impl From<ValidateResponse> for IdCheck {
    fn from(response: ValidateResponse) -> Self {
        IdCheck {
            valid: response.valid_ids,
            unknown: response.unknown_ids,
        }
    }
}

/// One rendered prompt from `POST preview`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PreviewRecord {
    pub target: TargetRef,
    pub prompt: String,
    #[serde(default)]
    pub unresolved_variables: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PreviewSet {
    pub records: Vec<PreviewRecord>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub clustering_error: Option<ClusteringError>,
}

/// Results flowing back from the engine thread.
#[derive(Debug, Clone, PartialEq)]
pub enum EngineEvent {
    PollTick,
    UnseenTick,
    ValidationDue {
        generation: u64,
    },
    PollCompleted {
        jobs: Result<Vec<Job>, BackendError>,
        detail: Option<(JobId, Result<JobDetailResponse, BackendError>)>,
    },
    UnseenCount(Result<u32, BackendError>),
    Cancelled {
        job_id: JobId,
        result: Result<(), BackendError>,
    },
    Deleted {
        job_id: JobId,
        result: Result<(), BackendError>,
    },
    IdsValidated {
        generation: u64,
        result: Result<IdCheck, BackendError>,
    },
    ScopeCounted(Result<u64, BackendError>),
    SubmissionFinished(Result<Job, SubmissionError>),
}

impl fmt::Display for EngineEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EngineEvent::PollTick => write!(f, "poll tick"),
            EngineEvent::UnseenTick => write!(f, "unseen tick"),
            EngineEvent::ValidationDue { generation } => {
                write!(f, "validation due (generation {generation})")
            }
            EngineEvent::PollCompleted { .. } => write!(f, "poll completed"),
            EngineEvent::UnseenCount(_) => write!(f, "unseen count"),
            EngineEvent::Cancelled { job_id, .. } => write!(f, "cancelled {job_id}"),
            EngineEvent::Deleted { job_id, .. } => write!(f, "deleted {job_id}"),
            EngineEvent::IdsValidated { generation, .. } => {
                write!(f, "ids validated (generation {generation})")
            }
            EngineEvent::ScopeCounted(_) => write!(f, "scope counted"),
            EngineEvent::SubmissionFinished(_) => write!(f, "submission finished"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_codes_classify_into_transient_and_persistent() {
        assert!(BackendError::from_status(503, "down").is_transient());
        assert!(BackendError::from_status(429, "slow down").is_transient());
        assert!(!BackendError::from_status(422, "bad scope").is_transient());
        assert_eq!(
            BackendError::from_status(404, "gone").failure().kind,
            FailureKind::NotFound
        );
        assert_eq!(
            BackendError::from_status(413, "big"),
            BackendError::PayloadTooLarge("big".into())
        );
        assert_eq!(
            BackendError::Timeout("t".into()).failure().kind,
            FailureKind::Transient
        );
    }

    #[test]
    fn scope_only_request_omits_template_fields() {
        let request = ScopedRequest::scope_only(JobScope::ByIds {
            target_type: "entry".into(),
            ids: vec!["e1".into()],
        });
        let json = serde_json::to_value(&request).unwrap();
        assert!(json.get("model").is_none());
        assert!(json.get("template").is_none());
        assert_eq!(json["scope"]["kind"], "byIds");
    }
}
