use std::time::Duration;

use reqwest::{Method, StatusCode};
use review_core::{
    AppendItemsPayload, CreateJobPayload, Estimate, IdCheck, IdKind, ItemLimits, Job, JobScope,
};
use review_logging::{review_debug, review_trace};
use serde::de::DeserializeOwned;
use serde::Serialize;
use url::Url;

use crate::types::{
    BackendError, CountResponse, JobDetailResponse, JobListQuery, JobListResponse, PreviewSet,
    ScopedRequest, UnseenCountResponse, ValidateResponse,
};

/// Header carrying the append dedupe key.
pub const IDEMPOTENCY_KEY_HEADER: &str = "Idempotency-Key";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackendSettings {
    pub base_url: String,
    pub connect_timeout: Duration,
    pub request_timeout: Duration,
    pub api_token: Option<String>,
}

impl Default for BackendSettings {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8080/api/".to_string(),
            connect_timeout: Duration::from_secs(10),
            request_timeout: Duration::from_secs(30),
            api_token: None,
        }
    }
}

/// The processing backend, as the orchestrator sees it.
#[async_trait::async_trait]
pub trait Backend: Send + Sync {
    async fn create_job(&self, payload: &CreateJobPayload) -> Result<Job, BackendError>;
    async fn append_items(
        &self,
        job_id: &str,
        payload: &AppendItemsPayload,
    ) -> Result<(), BackendError>;
    async fn cancel(&self, job_id: &str) -> Result<(), BackendError>;
    async fn delete(&self, job_id: &str) -> Result<(), BackendError>;
    async fn mark_seen(&self, job_id: &str) -> Result<(), BackendError>;
    async fn get_job(
        &self,
        job_id: &str,
        limits: ItemLimits,
    ) -> Result<JobDetailResponse, BackendError>;
    async fn list_jobs(&self, query: &JobListQuery) -> Result<Vec<Job>, BackendError>;
    async fn count_scope(&self, request: &ScopedRequest) -> Result<u64, BackendError>;
    async fn estimate(&self, request: &ScopedRequest) -> Result<Estimate, BackendError>;
    async fn preview(&self, request: &ScopedRequest) -> Result<PreviewSet, BackendError>;
    /// `target_type` names the record type of record ids; frame ids ignore it.
    async fn validate_ids(
        &self,
        kind: IdKind,
        target_type: &str,
        ids: &[String],
    ) -> Result<IdCheck, BackendError>;
    async fn unseen_count(&self) -> Result<u32, BackendError>;
}

#[derive(Debug, Clone)]
pub struct ReqwestBackend {
    client: reqwest::Client,
    base: Url,
    api_token: Option<String>,
}

impl ReqwestBackend {
    pub fn new(settings: &BackendSettings) -> Result<Self, BackendError> {
        // `Url::join` drops the last segment unless the base ends with a slash.
        let mut base = settings.base_url.trim().to_string();
        if !base.ends_with('/') {
            base.push('/');
        }
        let base = Url::parse(&base).map_err(|err| BackendError::InvalidUrl(err.to_string()))?;

        let client = reqwest::Client::builder()
            .connect_timeout(settings.connect_timeout)
            .timeout(settings.request_timeout)
            .build()
            .map_err(|err| BackendError::Connection(err.to_string()))?;

        Ok(Self {
            client,
            base,
            api_token: settings.api_token.clone(),
        })
    }

    fn url(&self, path: &str) -> Result<Url, BackendError> {
        self.base
            .join(path)
            .map_err(|err| BackendError::InvalidUrl(err.to_string()))
    }

    fn request(&self, method: Method, url: Url) -> reqwest::RequestBuilder {
        let builder = self.client.request(method, url);
        match &self.api_token {
            Some(token) => builder.bearer_auth(token),
            None => builder,
        }
    }

    async fn send(
        &self,
        builder: reqwest::RequestBuilder,
    ) -> Result<reqwest::Response, BackendError> {
        let response = builder.send().await.map_err(map_reqwest_error)?;
        let status = response.status();
        review_trace!("{} {}", status.as_u16(), response.url());
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().await.unwrap_or_default();
        Err(BackendError::from_status(status.as_u16(), error_message(status, &body)))
    }

    async fn get_json<T: DeserializeOwned + Send>(&self, url: Url) -> Result<T, BackendError> {
        let response = self.send(self.request(Method::GET, url)).await?;
        decode(response).await
    }

    async fn post_json<B, T>(&self, path: &str, body: &B) -> Result<T, BackendError>
    where
        B: Serialize + Sync,
        T: DeserializeOwned + Send,
    {
        let url = self.url(path)?;
        let response = self.send(self.request(Method::POST, url).json(body)).await?;
        decode(response).await
    }

    async fn post_empty(&self, path: &str) -> Result<(), BackendError> {
        let url = self.url(path)?;
        self.send(self.request(Method::POST, url)).await?;
        Ok(())
    }
}

#[async_trait::async_trait]
impl Backend for ReqwestBackend {
    async fn create_job(&self, payload: &CreateJobPayload) -> Result<Job, BackendError> {
        review_debug!(
            "Creating job '{}' with {} of {} items",
            payload.label,
            payload.initial_batch_size.unwrap_or(payload.total_items),
            payload.total_items
        );
        self.post_json("job", payload).await
    }

    async fn append_items(
        &self,
        job_id: &str,
        payload: &AppendItemsPayload,
    ) -> Result<(), BackendError> {
        let url = self.url(&format!("job/{job_id}/append-items"))?;
        let builder = self
            .request(Method::POST, url)
            .header(IDEMPOTENCY_KEY_HEADER, payload.idempotency_key(job_id))
            .json(payload);
        self.send(builder).await?;
        Ok(())
    }

    async fn cancel(&self, job_id: &str) -> Result<(), BackendError> {
        self.post_empty(&format!("job/{job_id}/cancel")).await
    }

    async fn delete(&self, job_id: &str) -> Result<(), BackendError> {
        let url = self.url(&format!("job/{job_id}"))?;
        self.send(self.request(Method::DELETE, url)).await?;
        Ok(())
    }

    async fn mark_seen(&self, job_id: &str) -> Result<(), BackendError> {
        self.post_empty(&format!("job/{job_id}/mark-seen")).await
    }

    async fn get_job(
        &self,
        job_id: &str,
        limits: ItemLimits,
    ) -> Result<JobDetailResponse, BackendError> {
        let mut url = self.url(&format!("job/{job_id}"))?;
        url.query_pairs_mut()
            .append_pair("pendingLimit", &limits.pending.to_string())
            .append_pair("succeededLimit", &limits.succeeded.to_string())
            .append_pair("failedLimit", &limits.failed.to_string());
        self.get_json(url).await
    }

    async fn list_jobs(&self, query: &JobListQuery) -> Result<Vec<Job>, BackendError> {
        let mut url = self.url("jobs")?;
        {
            let mut pairs = url.query_pairs_mut();
            pairs
                .append_pair("includeCompleted", &query.include_completed.to_string())
                .append_pair("limit", &query.limit.to_string());
            if let Some(entity_type) = &query.entity_type {
                pairs.append_pair("entityType", entity_type);
            }
        }
        let response: JobListResponse = self.get_json(url).await?;
        Ok(response.jobs)
    }

    async fn count_scope(&self, request: &ScopedRequest) -> Result<u64, BackendError> {
        let response: CountResponse = self.post_json("count-scope", request).await?;
        Ok(response.count)
    }

    async fn estimate(&self, request: &ScopedRequest) -> Result<Estimate, BackendError> {
        self.post_json("estimate", request).await
    }

    async fn preview(&self, request: &ScopedRequest) -> Result<PreviewSet, BackendError> {
        self.post_json("preview", request).await
    }

    async fn validate_ids(
        &self,
        kind: IdKind,
        target_type: &str,
        ids: &[String],
    ) -> Result<IdCheck, BackendError> {
        let request = ScopedRequest::scope_only(validation_scope(kind, target_type, ids));
        let response: ValidateResponse = self.post_json("validate", &request).await?;
        Ok(response.into())
    }

    async fn unseen_count(&self) -> Result<u32, BackendError> {
        let url = self.url("jobs/unseen-count")?;
        let response: UnseenCountResponse = self.get_json(url).await?;
        Ok(response.count)
    }
}

/// Scope used to ask the backend which typed ids exist.
pub fn validation_scope(kind: IdKind, target_type: &str, ids: &[String]) -> JobScope {
    match kind {
        IdKind::Record => JobScope::ByIds {
            target_type: target_type.to_string(),
            ids: ids.to_vec(),
        },
        IdKind::Frame => JobScope::ByFrameIds {
            frame_ids: ids.to_vec(),
            include_children: false,
            flag_target: Default::default(),
            offset: None,
            limit: None,
        },
    }
}

async fn decode<T>(response: reqwest::Response) -> Result<T, BackendError>
where
    T: DeserializeOwned + Send,
{
    response
        .json::<T>()
        .await
        .map_err(|err| BackendError::Decode(err.to_string()))
}

/// Prefers a JSON `message`/`error` field over the raw body.
fn error_message(status: StatusCode, body: &str) -> String {
    let parsed = serde_json::from_str::<serde_json::Value>(body).ok();
    let field = parsed.as_ref().and_then(|value| {
        value
            .get("message")
            .or_else(|| value.get("error"))
            .and_then(|v| v.as_str())
    });
    match field {
        Some(message) => message.to_string(),
        None if body.trim().is_empty() => status
            .canonical_reason()
            .unwrap_or("request failed")
            .to_string(),
        None => body.trim().to_string(),
    }
}

fn map_reqwest_error(err: reqwest::Error) -> BackendError {
    if err.is_timeout() {
        return BackendError::Timeout(err.to_string());
    }
    if let Some(status) = err.status() {
        return BackendError::from_status(status.as_u16(), err.to_string());
    }
    BackendError::Connection(err.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn json_error_field_is_preferred() {
        assert_eq!(
            error_message(StatusCode::BAD_REQUEST, r#"{"message":"scope is empty"}"#),
            "scope is empty"
        );
        assert_eq!(error_message(StatusCode::BAD_GATEWAY, "  "), "Bad Gateway");
        assert_eq!(error_message(StatusCode::CONFLICT, "busy\n"), "busy");
    }

    #[test]
    fn base_url_without_trailing_slash_keeps_its_path() {
        let backend = ReqwestBackend::new(&BackendSettings {
            base_url: "http://example.test/api".into(),
            ..BackendSettings::default()
        })
        .unwrap();
        assert_eq!(
            backend.url("job/7/cancel").unwrap().as_str(),
            "http://example.test/api/job/7/cancel"
        );
    }
}
