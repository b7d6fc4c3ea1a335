//! One-shot commands that talk to the backend directly, without the poll loop.
use std::fs;
use std::path::Path;

use anyhow::{bail, Context, Result};
use review_core::template::bindings_from;
use review_core::{
    estimate_cost, parse_id_list, resolve_scope, Bindings, CharRatioTokenCounter, IdKind,
    IdValidation, ItemLimits, JobScope, PriceTable,
};
use review_engine::{block_on, Backend, ReqwestBackend, ScopedRequest};
use review_logging::review_info;

use super::config::JobRequest;
use super::render;

/// Validates typed ids (if the scope mode needs them) and resolves the scope.
async fn resolve_request_scope(backend: &dyn Backend, request: &JobRequest) -> Result<JobScope> {
    let validation = match request.scope.id_kind() {
        Some(kind) => {
            let raw = request
                .ids
                .as_deref()
                .context("this scope mode needs an `ids` entry in the request")?;
            let ids = parse_id_list(raw);
            let check = backend
                .validate_ids(kind, request.scope.id_target_type(), &ids)
                .await?;
            if check.unknown.is_empty() {
                IdValidation::Valid { ids }
            } else {
                IdValidation::Invalid {
                    unknown: check.unknown,
                }
            }
        }
        None => IdValidation::Idle,
    };
    Ok(resolve_scope(&request.scope, &validation)?.scope)
}

/// Estimates locally from sample records when given, otherwise asks the backend.
pub fn estimate(
    backend: &ReqwestBackend,
    request: &JobRequest,
    records: Option<&Path>,
    total: Option<u64>,
    prices: &PriceTable,
) -> Result<()> {
    let estimate = match records {
        Some(path) => {
            let records = load_records(path)?;
            let template = request.draft.parsed_template()?;
            let total = total.unwrap_or(records.len() as u64);
            estimate_cost(
                &template,
                &records,
                total,
                &request.estimate_params(),
                prices,
                &CharRatioTokenCounter::default(),
            )?
        }
        None => block_on(async {
            let scope = resolve_request_scope(backend, request).await?;
            let estimate = backend
                .estimate(&ScopedRequest::new(&request.draft, scope))
                .await?;
            anyhow::Ok(estimate)
        })??,
    };
    for line in render::render_estimate(&estimate) {
        println!("{line}");
    }
    Ok(())
}

pub fn preview(backend: &ReqwestBackend, request: &JobRequest) -> Result<()> {
    request.draft.parsed_template()?;
    let preview = block_on(async {
        let scope = resolve_request_scope(backend, request).await?;
        let preview = backend
            .preview(&ScopedRequest::new(&request.draft, scope))
            .await?;
        anyhow::Ok(preview)
    })??;
    for line in render::render_preview(&preview) {
        println!("{line}");
    }
    Ok(())
}

pub fn cancel(backend: &ReqwestBackend, job_id: &str) -> Result<()> {
    block_on(backend.cancel(job_id))??;
    review_info!("Cancel requested for {}", job_id);
    println!("Cancel requested for job {job_id}");
    Ok(())
}

/// Only terminal jobs may be deleted.
pub fn delete(backend: &ReqwestBackend, job_id: &str) -> Result<()> {
    let no_items = ItemLimits {
        pending: 0,
        succeeded: 0,
        failed: 0,
    };
    block_on(async {
        let detail = backend.get_job(job_id, no_items).await?;
        if !detail.job.status.is_terminal() {
            bail!(
                "job {job_id} is {:?}; cancel it before deleting",
                detail.job.status
            );
        }
        backend.delete(job_id).await?;
        anyhow::Ok(())
    })??;
    println!("Deleted job {job_id}");
    Ok(())
}

/// Record ids need the record type they belong to.
pub fn validate(
    backend: &ReqwestBackend,
    kind: IdKind,
    target_type: Option<&str>,
    raw: &[String],
) -> Result<()> {
    let target_type = match (kind, target_type) {
        (IdKind::Record, None) => bail!("record ids need --target-type"),
        (IdKind::Record, Some(target_type)) => target_type,
        (IdKind::Frame, _) => "",
    };
    let ids = parse_id_list(&raw.join(" "));
    if ids.is_empty() {
        bail!("no ids entered");
    }
    let check = block_on(backend.validate_ids(kind, target_type, &ids))??;
    println!("{} of {} id(s) valid", check.valid.len(), ids.len());
    if !check.unknown.is_empty() {
        bail!("unknown ids: {}", check.unknown.join(", "));
    }
    Ok(())
}

/// A JSON array of record objects.
fn load_records(path: &Path) -> Result<Vec<Bindings>> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("reading sample records {}", path.display()))?;
    let values: Vec<serde_json::Value> = serde_json::from_str(&content)
        .with_context(|| format!("parsing sample records {}", path.display()))?;
    Ok(values.into_iter().map(bindings_from).collect())
}
