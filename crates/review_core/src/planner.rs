//! Slices a resolved scope into bounded windows and builds the create/append payloads.
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::job::{JobType, ReasoningEffort, ServiceTier};
use crate::scope::JobScope;
use crate::template::{ClusteringOptions, Template, TemplateError};

/// Largest number of records submitted in one create or append call.
pub const MAX_BATCH_SIZE: u64 = 3000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchWindow {
    pub offset: u64,
    pub limit: u64,
}

impl BatchWindow {
    pub fn end(&self) -> u64 {
        self.offset + self.limit
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PlanError {
    #[error("scope resolved to zero records")]
    EmptyScope,
    #[error("batch size must be positive")]
    ZeroBatchSize,
    #[error("template is empty")]
    EmptyTemplate,
    #[error("template does not parse: {0}")]
    Template(#[from] TemplateError),
}

/// `[0,B), [B,2B), ...` covering `total`; the last window holds the remainder.
pub fn plan_windows(total: u64, max_batch: u64) -> Result<Vec<BatchWindow>, PlanError> {
    if max_batch == 0 {
        return Err(PlanError::ZeroBatchSize);
    }
    if total == 0 {
        return Err(PlanError::EmptyScope);
    }
    let mut windows = Vec::with_capacity(total.div_ceil(max_batch) as usize);
    let mut offset = 0;
    while offset < total {
        let limit = max_batch.min(total - offset);
        windows.push(BatchWindow { offset, limit });
        offset += limit;
    }
    Ok(windows)
}

/// Everything the operator configures for a job apart from its scope.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobDraft {
    pub label: String,
    pub model: String,
    pub template: String,
    #[serde(default)]
    pub system_prompt: String,
    #[serde(default)]
    pub job_type: JobType,
    #[serde(default)]
    pub target_fields: Vec<String>,
    #[serde(default)]
    pub reasoning_effort: ReasoningEffort,
    #[serde(default)]
    pub service_tier: ServiceTier,
    /// Tool-augmented processing.
    #[serde(default)]
    pub agentic: bool,
    #[serde(default)]
    pub clustering: Option<ClusteringOptions>,
}

impl JobDraft {
    pub fn metadata(&self) -> RequestMetadata {
        RequestMetadata {
            prompt_clustering: PromptClustering {
                enabled: self.clustering.is_some(),
                k_override: self.clustering.as_ref().and_then(|c| c.k_override),
            },
        }
    }

    /// Parses the template, rejecting blank ones.
    pub fn parsed_template(&self) -> Result<Template, PlanError> {
        let template = Template::parse(&self.template)?;
        if template.is_blank() {
            return Err(PlanError::EmptyTemplate);
        }
        Ok(template)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PromptClustering {
    pub enabled: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub k_override: Option<usize>,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RequestMetadata {
    pub prompt_clustering: PromptClustering,
}

/// Body of `POST job`: the job plus its first window of items.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateJobPayload {
    pub label: String,
    pub model: String,
    pub template: String,
    pub system_prompt: String,
    pub scope: JobScope,
    pub job_type: JobType,
    pub target_fields: Vec<String>,
    pub reasoning_effort: ReasoningEffort,
    pub service_tier: ServiceTier,
    pub agentic: bool,
    pub metadata: RequestMetadata,
    /// Full resolved size, even though only the first window is attached.
    pub total_items: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub initial_batch_size: Option<u64>,
}

/// Body of `POST job/{id}/append-items`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AppendItemsPayload {
    pub scope: JobScope,
    /// Records submitted once this append lands.
    pub submitted_through: u64,
}

impl AppendItemsPayload {
    /// Key a backend can use to dedupe a retried append.
    pub fn idempotency_key(&self, job_id: &str) -> String {
        format!("{job_id}:{}", self.submitted_through)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubmissionPlan {
    pub windows: Vec<BatchWindow>,
    pub create: CreateJobPayload,
    /// Executed strictly in order after the create call.
    pub appends: Vec<AppendItemsPayload>,
}

impl SubmissionPlan {
    pub fn total_items(&self) -> u64 {
        self.create.total_items
    }
}

pub fn build_submission_plan(
    draft: &JobDraft,
    scope: &JobScope,
    total: u64,
    max_batch: u64,
) -> Result<SubmissionPlan, PlanError> {
    draft.parsed_template()?;
    let windows = plan_windows(total, max_batch)?;
    let (first, rest) = windows.split_first().ok_or(PlanError::EmptyScope)?;

    let create = CreateJobPayload {
        label: draft.label.clone(),
        model: draft.model.clone(),
        template: draft.template.clone(),
        system_prompt: draft.system_prompt.clone(),
        scope: scope.window(first.offset, first.limit),
        job_type: draft.job_type,
        target_fields: draft.target_fields.clone(),
        reasoning_effort: draft.reasoning_effort,
        service_tier: draft.service_tier,
        agentic: draft.agentic,
        metadata: draft.metadata(),
        total_items: total,
        initial_batch_size: (!rest.is_empty()).then_some(first.limit),
    };

    let appends = rest
        .iter()
        .map(|window| AppendItemsPayload {
            scope: scope.window(window.offset, window.limit),
            submitted_through: window.end(),
        })
        .collect();

    Ok(SubmissionPlan {
        windows,
        create,
        appends,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn remainder_lands_in_last_window() {
        let windows = plan_windows(7500, 3000).unwrap();
        assert_eq!(
            windows,
            vec![
                BatchWindow { offset: 0, limit: 3000 },
                BatchWindow { offset: 3000, limit: 3000 },
                BatchWindow { offset: 6000, limit: 1500 },
            ]
        );
    }

    #[test]
    fn evenly_divisible_total_ends_with_full_window() {
        let windows = plan_windows(6000, 3000).unwrap();
        assert_eq!(windows.len(), 2);
        assert_eq!(windows[1].limit, 3000);
    }

    #[test]
    fn limits_sum_to_total() {
        for total in [1u64, 2, 999, 3000, 3001, 12_000, 12_345] {
            for batch in [1u64, 7, 3000] {
                let windows = plan_windows(total, batch).unwrap();
                assert_eq!(windows.iter().map(|w| w.limit).sum::<u64>(), total);
                assert!(windows.iter().all(|w| w.limit <= batch && w.limit > 0));
                for pair in windows.windows(2) {
                    assert_eq!(pair[0].end(), pair[1].offset);
                }
            }
        }
    }

    #[test]
    fn zero_sizes_are_rejected() {
        assert_eq!(plan_windows(0, 3000), Err(PlanError::EmptyScope));
        assert_eq!(plan_windows(10, 0), Err(PlanError::ZeroBatchSize));
    }
}
