//! Batch review engine: backend client, sequential submission, scheduling and
//! effect execution.
mod client;
mod engine;
mod scheduler;
mod submit;
mod types;

pub use client::{
    validation_scope, Backend, BackendSettings, ReqwestBackend, IDEMPOTENCY_KEY_HEADER,
};
pub use engine::{block_on, poll_jobs, EngineError, EngineHandle};
pub use scheduler::{PollSettings, Scheduler};
pub use submit::{submit_plan, SubmissionError};
pub use types::{
    BackendError, EngineEvent, JobDetailResponse, JobListQuery, PreviewRecord, PreviewSet,
    ScopedRequest,
};
