//! Batch review core: scope resolution, prompt templates, estimation, submission
//! planning, and the pure job-tracking state machine.
mod effect;
pub mod estimate;
pub mod job;
mod msg;
pub mod planner;
pub mod scope;
mod state;
pub mod template;
pub mod token;
pub mod tracker;
mod update;
mod view_model;

pub use effect::Effect;
pub use estimate::{estimate_cost, Estimate, EstimateError, EstimateParams, ModelPrice, PriceTable};
pub use job::{
    ItemLimits, ItemStatus, Job, JobDetail, JobId, JobItem, JobStatus, JobType, ReasoningEffort,
    ServiceTier, TargetRef,
};
pub use msg::{BackendFailure, DetailPoll, FailureKind, IdCheck, Msg, SubmissionFailure};
pub use planner::{
    build_submission_plan, AppendItemsPayload, BatchWindow, CreateJobPayload, JobDraft, PlanError,
    SubmissionPlan, MAX_BATCH_SIZE,
};
pub use scope::{
    parse_id_list, resolve_scope, FlagTarget, IdKind, IdValidation, JobScope, ResolvedScope,
    ScopeDescriptor, ScopeError, ScopeSize,
};
pub use state::{AppState, SubmissionState, TrackerConfig};
pub use template::{Bindings, Template, TemplateError};
pub use token::{CharRatioTokenCounter, TokenCounter};
pub use tracker::TrackerState;
pub use update::update;
pub use view_model::{AppViewModel, JobRowView, SelectedJobView};
