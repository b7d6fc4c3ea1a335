mod app;
mod commands;
pub mod config;
mod effects;
pub mod logging;
mod persistence;
mod render;

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use review_core::{IdKind, JobId};
use review_engine::{EngineHandle, ReqwestBackend};
use review_logging::review_info;

use self::app::Session;
use self::config::{AppConfig, JobRequest};
use self::effects::EffectRunner;

pub use self::persistence::DEFAULT_STATE_FILE;

/// What the operator asked the CLI to do.
pub enum Command {
    Submit { request: PathBuf, watch: bool },
    Estimate {
        request: PathBuf,
        records: Option<PathBuf>,
        total: Option<u64>,
    },
    Preview { request: PathBuf },
    Watch {
        job: Option<JobId>,
        resume: bool,
        follow: bool,
    },
    Cancel { job_id: JobId },
    Delete { job_id: JobId },
    Validate {
        kind: IdKind,
        target_type: Option<String>,
        ids: Vec<String>,
    },
}

pub fn run_app(config: &AppConfig, state_path: &Path, command: Command) -> Result<()> {
    match command {
        Command::Submit { request, watch } => {
            let request = JobRequest::load(&request)?;
            let mut session = start_session(config, state_path)?;
            if let Some(kind) = request.scope.id_kind() {
                let raw = request
                    .ids
                    .as_deref()
                    .context("this scope mode needs an `ids` entry in the request")?;
                let ids = session.validate_ids(kind, request.scope.id_target_type(), raw)?;
                review_info!("{} id(s) validated", ids.len());
            }
            let job_id = session.submit(request.draft, request.scope)?;
            if watch {
                session.watch(Some(job_id), false);
            }
            Ok(())
        }
        Command::Estimate {
            request,
            records,
            total,
        } => {
            let request = JobRequest::load(&request)?;
            let backend = ReqwestBackend::new(&config.backend_settings())?;
            commands::estimate(
                &backend,
                &request,
                records.as_deref(),
                total,
                &config.prices,
            )
        }
        Command::Preview { request } => {
            let request = JobRequest::load(&request)?;
            let backend = ReqwestBackend::new(&config.backend_settings())?;
            commands::preview(&backend, &request)
        }
        Command::Watch {
            job,
            resume,
            follow,
        } => {
            let mut session = start_session(config, state_path)?;
            let job = match job {
                Some(job) => Some(job),
                None if resume => Some(
                    session
                        .last_selected()
                        .context("no previously watched job to resume")?,
                ),
                None => None,
            };
            session.watch(job, follow);
            Ok(())
        }
        Command::Cancel { job_id } => {
            let backend = ReqwestBackend::new(&config.backend_settings())?;
            commands::cancel(&backend, &job_id)
        }
        Command::Delete { job_id } => {
            let backend = ReqwestBackend::new(&config.backend_settings())?;
            commands::delete(&backend, &job_id)
        }
        Command::Validate {
            kind,
            target_type,
            ids,
        } => {
            let backend = ReqwestBackend::new(&config.backend_settings())?;
            commands::validate(&backend, kind, target_type.as_deref(), &ids)
        }
    }
}

fn start_session(config: &AppConfig, state_path: &Path) -> Result<Session> {
    let engine = EngineHandle::new(&config.backend_settings(), config.poll_settings())?;
    Ok(Session::new(
        EffectRunner::new(engine),
        config.tracker_config(),
        state_path.to_path_buf(),
    ))
}
