//! Token and cost extrapolation from a handful of rendered sample records.
use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::job::ServiceTier;
use crate::template::{Bindings, ClusteringError, RenderOptions, RenderWarning, Template};
use crate::token::TokenCounter;

pub const DEFAULT_SAMPLE_SIZE: usize = 20;
/// Tool-call overhead applied to per-item tokens when agentic mode is on.
pub const AGENTIC_TOKEN_MULTIPLIER: u64 = 3;
pub const DEFAULT_OUTPUT_TOKENS_PER_ITEM: u64 = 256;

/// USD per million tokens.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ModelPrice {
    pub input_per_million: f64,
    pub output_per_million: f64,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct PriceTable {
    pub models: BTreeMap<String, ModelPrice>,
}

impl PriceTable {
    pub fn with_model(mut self, model: impl Into<String>, price: ModelPrice) -> Self {
        self.models.insert(model.into(), price);
        self
    }

    /// `None` when the model has no price entry.
    pub fn cost(
        &self,
        model: &str,
        tier: ServiceTier,
        input_tokens: u64,
        output_tokens: u64,
    ) -> Option<f64> {
        let price = self.models.get(model)?;
        let base = input_tokens as f64 / 1_000_000.0 * price.input_per_million
            + output_tokens as f64 / 1_000_000.0 * price.output_per_million;
        Some(base * tier_factor(tier))
    }
}

pub fn tier_factor(tier: ServiceTier) -> f64 {
    match tier {
        ServiceTier::Default => 1.0,
        ServiceTier::Flex => 0.5,
        ServiceTier::Priority => 2.0,
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct EstimateParams {
    pub model: String,
    pub service_tier: ServiceTier,
    pub agentic: bool,
    pub sample_size: usize,
    pub output_tokens_per_item: u64,
    pub system_prompt: String,
    pub render: RenderOptions,
}

impl EstimateParams {
    pub fn new(model: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            service_tier: ServiceTier::Default,
            agentic: false,
            sample_size: DEFAULT_SAMPLE_SIZE,
            output_tokens_per_item: DEFAULT_OUTPUT_TOKENS_PER_ITEM,
            system_prompt: String::new(),
            render: RenderOptions::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Estimate {
    pub sample_size: usize,
    pub total_items: u64,
    pub input_tokens_per_item: u64,
    pub output_tokens_per_item: u64,
    pub total_input_tokens: u64,
    pub total_output_tokens: u64,
    pub estimated_cost: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub clustering_error: Option<ClusteringError>,
    /// Unresolved top-level variables seen while rendering samples.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub unresolved_variables: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EstimateError {
    #[error("template is empty")]
    EmptyTemplate,
    #[error("no sample records to render")]
    NoSamples,
}

/// Picks up to `n` records spread evenly across `records`.
pub fn select_samples<T>(records: &[T], n: usize) -> Vec<&T> {
    if records.len() <= n {
        return records.iter().collect();
    }
    (0..n).map(|i| &records[i * records.len() / n]).collect()
}

/// Renders sampled records and extrapolates to `total_items`.
///
/// Per-item figures are whole tokens so totals scale exactly with `total_items`.
pub fn estimate_cost(
    template: &Template,
    records: &[Bindings],
    total_items: u64,
    params: &EstimateParams,
    prices: &PriceTable,
    counter: &dyn TokenCounter,
) -> Result<Estimate, EstimateError> {
    if template.is_blank() {
        return Err(EstimateError::EmptyTemplate);
    }
    let samples = select_samples(records, params.sample_size.max(1));
    if samples.is_empty() {
        if total_items == 0 {
            return Ok(Estimate::default());
        }
        return Err(EstimateError::NoSamples);
    }

    let system_tokens = counter.count(&params.system_prompt);
    let mut input_sum = 0u64;
    let mut clustering_error = None;
    let mut unresolved_variables = Vec::new();
    for bindings in &samples {
        let rendered = template.render_with(bindings, &params.render);
        input_sum += system_tokens + counter.count(&rendered.text);
        if clustering_error.is_none() {
            clustering_error = rendered.clustering_error;
        }
        for RenderWarning::UnresolvedVariable { path } in rendered.warnings {
            if !unresolved_variables.contains(&path) {
                unresolved_variables.push(path);
            }
        }
    }

    let mut input_tokens_per_item = input_sum.div_ceil(samples.len() as u64);
    let mut output_tokens_per_item = params.output_tokens_per_item;
    if params.agentic {
        input_tokens_per_item *= AGENTIC_TOKEN_MULTIPLIER;
        output_tokens_per_item *= AGENTIC_TOKEN_MULTIPLIER;
    }

    let total_input_tokens = input_tokens_per_item * total_items;
    let total_output_tokens = output_tokens_per_item * total_items;
    let estimated_cost = prices.cost(
        &params.model,
        params.service_tier,
        total_input_tokens,
        total_output_tokens,
    );

    Ok(Estimate {
        sample_size: samples.len(),
        total_items,
        input_tokens_per_item,
        output_tokens_per_item,
        total_input_tokens,
        total_output_tokens,
        estimated_cost,
        clustering_error,
        unresolved_variables,
    })
}
