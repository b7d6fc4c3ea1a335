//! RON configuration file and JSON job requests.
use std::fs;
use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result};
use review_core::estimate::{EstimateParams, DEFAULT_OUTPUT_TOKENS_PER_ITEM, DEFAULT_SAMPLE_SIZE};
use review_core::{ItemLimits, JobDraft, PriceTable, ScopeDescriptor, TrackerConfig, MAX_BATCH_SIZE};
use review_engine::{BackendSettings, PollSettings};
use review_logging::review_info;
use serde::{Deserialize, Serialize};

use super::logging::LogDestination;

pub const DEFAULT_CONFIG_FILE: &str = "batch-review.ron";

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub backend: BackendConfig,
    pub poll: PollConfig,
    pub prices: PriceTable,
    pub log_destination: LogDestination,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BackendConfig {
    pub base_url: String,
    pub connect_timeout_secs: u64,
    pub request_timeout_secs: u64,
    pub api_token: Option<String>,
}

impl Default for BackendConfig {
    fn default() -> Self {
        let settings = BackendSettings::default();
        Self {
            base_url: settings.base_url,
            connect_timeout_secs: settings.connect_timeout.as_secs(),
            request_timeout_secs: settings.request_timeout.as_secs(),
            api_token: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PollConfig {
    pub job_interval_secs: u64,
    pub unseen_interval_secs: u64,
    pub validation_debounce_ms: u64,
    pub job_list_limit: u32,
    pub include_completed: bool,
    pub entity_type: Option<String>,
    pub pending_limit: u32,
    pub succeeded_limit: u32,
    pub failed_limit: u32,
    pub max_batch_size: u64,
}

impl Default for PollConfig {
    fn default() -> Self {
        let poll = PollSettings::default();
        let tracker = TrackerConfig::default();
        Self {
            job_interval_secs: poll.job_interval.as_secs(),
            unseen_interval_secs: poll.unseen_interval.as_secs(),
            validation_debounce_ms: poll.validation_debounce.as_millis() as u64,
            job_list_limit: tracker.job_list_limit,
            include_completed: tracker.include_completed,
            entity_type: None,
            pending_limit: tracker.item_limits.pending,
            succeeded_limit: tracker.item_limits.succeeded,
            failed_limit: tracker.item_limits.failed,
            max_batch_size: MAX_BATCH_SIZE,
        }
    }
}

impl AppConfig {
    /// Missing file means defaults; a file that does not parse is an error.
    pub fn load(path: &Path) -> Result<Self> {
        let content = match fs::read_to_string(path) {
            Ok(text) => text,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                return Ok(Self::default());
            }
            Err(err) => {
                return Err(err).with_context(|| format!("reading config {}", path.display()));
            }
        };
        let config = ron::from_str(&content)
            .with_context(|| format!("parsing config {}", path.display()))?;
        review_info!("Loaded config from {:?}", path);
        Ok(config)
    }

    pub fn backend_settings(&self) -> BackendSettings {
        BackendSettings {
            base_url: self.backend.base_url.clone(),
            connect_timeout: Duration::from_secs(self.backend.connect_timeout_secs),
            request_timeout: Duration::from_secs(self.backend.request_timeout_secs),
            api_token: self.backend.api_token.clone(),
        }
    }

    pub fn poll_settings(&self) -> PollSettings {
        PollSettings {
            job_interval: Duration::from_secs(self.poll.job_interval_secs.max(1)),
            unseen_interval: Duration::from_secs(self.poll.unseen_interval_secs.max(1)),
            validation_debounce: Duration::from_millis(self.poll.validation_debounce_ms),
        }
    }

    pub fn tracker_config(&self) -> TrackerConfig {
        TrackerConfig {
            job_list_limit: self.poll.job_list_limit,
            include_completed: self.poll.include_completed,
            entity_type: self.poll.entity_type.clone(),
            item_limits: ItemLimits {
                pending: self.poll.pending_limit,
                succeeded: self.poll.succeeded_limit,
                failed: self.poll.failed_limit,
            },
            max_batch_size: self.poll.max_batch_size,
        }
    }
}

/// A job request file: the draft, how its scope is chosen, and typed ids if the
/// scope mode needs them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobRequest {
    pub draft: JobDraft,
    pub scope: ScopeDescriptor,
    #[serde(default)]
    pub ids: Option<String>,
    #[serde(default)]
    pub estimate: EstimateOptions,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct EstimateOptions {
    pub sample_size: usize,
    pub output_tokens_per_item: u64,
}

impl Default for EstimateOptions {
    fn default() -> Self {
        Self {
            sample_size: DEFAULT_SAMPLE_SIZE,
            output_tokens_per_item: DEFAULT_OUTPUT_TOKENS_PER_ITEM,
        }
    }
}

impl JobRequest {
    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("reading job request {}", path.display()))?;
        serde_json::from_str(&content)
            .with_context(|| format!("parsing job request {}", path.display()))
    }

    pub fn estimate_params(&self) -> EstimateParams {
        EstimateParams {
            service_tier: self.draft.service_tier,
            agentic: self.draft.agentic,
            sample_size: self.estimate.sample_size,
            output_tokens_per_item: self.estimate.output_tokens_per_item,
            system_prompt: self.draft.system_prompt.clone(),
            render: review_core::template::RenderOptions {
                clustering: self.draft.clustering.clone(),
            },
            ..EstimateParams::new(self.draft.model.clone())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_file_yields_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = AppConfig::load(&dir.path().join("absent.ron")).unwrap();
        assert_eq!(config, AppConfig::default());
        assert_eq!(config.poll_settings(), PollSettings::default());
        assert_eq!(config.tracker_config(), TrackerConfig::default());
    }

    #[test]
    fn partial_file_overrides_only_named_fields() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("batch-review.ron");
        fs::write(
            &path,
            r#"(
                backend: (base_url: "https://review.example.com/api/"),
                poll: (job_interval_secs: 2, entity_type: Some("entry")),
                prices: (models: {
                    "small-model": (input_per_million: 0.5, output_per_million: 2.0),
                }),
            )"#,
        )
        .unwrap();

        let config = AppConfig::load(&path).unwrap();
        assert_eq!(config.backend.base_url, "https://review.example.com/api/");
        assert_eq!(config.backend.request_timeout_secs, 30);
        assert_eq!(config.poll_settings().job_interval, Duration::from_secs(2));
        assert_eq!(config.tracker_config().entity_type.as_deref(), Some("entry"));
        assert!(config.prices.models.contains_key("small-model"));
    }

    #[test]
    fn malformed_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.ron");
        fs::write(&path, "(backend: [").unwrap();
        assert!(AppConfig::load(&path).is_err());
    }

    #[test]
    fn job_request_reads_wire_shaped_json() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("job.json");
        fs::write(
            &path,
            r#"{
                "draft": {"label": "Typos", "model": "small-model", "template": "{{title}}", "agentic": true},
                "scope": {"mode": "manual_ids", "target_type": "entry"},
                "ids": "e1, e2"
            }"#,
        )
        .unwrap();

        let request = JobRequest::load(&path).unwrap();
        assert_eq!(
            request.scope,
            ScopeDescriptor::ManualIds {
                target_type: "entry".into()
            }
        );
        let params = request.estimate_params();
        assert!(params.agentic);
        assert_eq!(params.sample_size, DEFAULT_SAMPLE_SIZE);
    }
}
