use std::future::Future;
use std::sync::{mpsc, Arc};
use std::thread;
use std::time::Duration;

use review_core::{Effect, ItemLimits, JobId};
use review_logging::{review_debug, review_warn};

use crate::client::{Backend, BackendSettings, ReqwestBackend};
use crate::scheduler::{PollSettings, Scheduler};
use crate::submit::submit_plan;
use crate::types::{BackendError, EngineEvent, JobListQuery, ScopedRequest};

#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("could not start async runtime: {0}")]
    Runtime(#[from] std::io::Error),
    #[error(transparent)]
    Backend(#[from] BackendError),
}

enum EngineCommand {
    Execute(Effect),
    Shutdown,
}

/// Runs effects against the backend on a dedicated runtime thread and hands
/// results back as [`EngineEvent`]s.
pub struct EngineHandle {
    cmd_tx: mpsc::Sender<EngineCommand>,
    event_rx: mpsc::Receiver<EngineEvent>,
}

impl EngineHandle {
    pub fn new(backend: &BackendSettings, poll: PollSettings) -> Result<Self, EngineError> {
        let backend: Arc<dyn Backend> = Arc::new(ReqwestBackend::new(backend)?);
        Self::with_backend(backend, poll)
    }

    pub fn with_backend(
        backend: Arc<dyn Backend>,
        poll: PollSettings,
    ) -> Result<Self, EngineError> {
        let (cmd_tx, cmd_rx) = mpsc::channel();
        let (event_tx, event_rx) = mpsc::channel();
        let runtime = tokio::runtime::Runtime::new()?;

        thread::spawn(move || {
            let _guard = runtime.enter();
            let mut scheduler = Scheduler::new(event_tx.clone());
            scheduler.start_ticker(poll.job_interval, EngineEvent::PollTick);
            scheduler.start_ticker(poll.unseen_interval, EngineEvent::UnseenTick);

            while let Ok(command) = cmd_rx.recv() {
                match command {
                    EngineCommand::Execute(effect) => execute(
                        effect,
                        &backend,
                        &mut scheduler,
                        poll.validation_debounce,
                        &event_tx,
                    ),
                    EngineCommand::Shutdown => break,
                }
            }
            scheduler.shutdown();
        });

        Ok(Self { cmd_tx, event_rx })
    }

    pub fn execute(&self, effect: Effect) {
        let _ = self.cmd_tx.send(EngineCommand::Execute(effect));
    }

    pub fn try_recv(&self) -> Option<EngineEvent> {
        self.event_rx.try_recv().ok()
    }

    pub fn recv_timeout(&self, timeout: Duration) -> Option<EngineEvent> {
        self.event_rx.recv_timeout(timeout).ok()
    }

    pub fn shutdown(&self) {
        let _ = self.cmd_tx.send(EngineCommand::Shutdown);
    }
}

impl Drop for EngineHandle {
    fn drop(&mut self) {
        self.shutdown();
    }
}

/// Runs a single backend call to completion on a throwaway runtime, for one-shot commands.
pub fn block_on<F: Future>(future: F) -> Result<F::Output, EngineError> {
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?;
    Ok(runtime.block_on(future))
}

fn execute(
    effect: Effect,
    backend: &Arc<dyn Backend>,
    scheduler: &mut Scheduler,
    debounce: Duration,
    events: &mpsc::Sender<EngineEvent>,
) {
    let backend = Arc::clone(backend);
    let events = events.clone();
    match effect {
        Effect::ScheduleValidation { generation } => {
            scheduler.schedule_once(debounce, EngineEvent::ValidationDue { generation });
        }
        Effect::CancelValidation => scheduler.cancel_pending(),
        Effect::PollJobs {
            include_completed,
            limit,
            entity_type,
            detail,
        } => {
            let query = JobListQuery {
                include_completed,
                limit,
                entity_type,
            };
            tokio::spawn(async move {
                let event = poll_jobs(backend.as_ref(), &query, detail).await;
                let _ = events.send(event);
            });
        }
        Effect::FetchUnseenCount => {
            tokio::spawn(async move {
                let result = backend.unseen_count().await;
                let _ = events.send(EngineEvent::UnseenCount(result));
            });
        }
        Effect::MarkSeen { job_id } => {
            tokio::spawn(async move {
                if let Err(err) = backend.mark_seen(&job_id).await {
                    review_warn!("Could not mark job {} seen: {}", job_id, err);
                }
            });
        }
        Effect::CancelJob { job_id } => {
            tokio::spawn(async move {
                let result = backend.cancel(&job_id).await;
                let _ = events.send(EngineEvent::Cancelled { job_id, result });
            });
        }
        Effect::DeleteJob { job_id } => {
            tokio::spawn(async move {
                let result = backend.delete(&job_id).await;
                let _ = events.send(EngineEvent::Deleted { job_id, result });
            });
        }
        Effect::ValidateIds {
            generation,
            kind,
            target_type,
            ids,
        } => {
            tokio::spawn(async move {
                let result = backend.validate_ids(kind, &target_type, &ids).await;
                let _ = events.send(EngineEvent::IdsValidated { generation, result });
            });
        }
        Effect::CountScope { draft, scope } => {
            let request = ScopedRequest::new(&draft, scope);
            tokio::spawn(async move {
                let result = backend.count_scope(&request).await;
                let _ = events.send(EngineEvent::ScopeCounted(result));
            });
        }
        Effect::SubmitPlan(plan) => {
            tokio::spawn(async move {
                let result = submit_plan(backend.as_ref(), &plan).await;
                let _ = events.send(EngineEvent::SubmissionFinished(result));
            });
        }
        Effect::NotifyCompleted { job_id, .. } => {
            review_debug!("Completion of {} is announced by the app, not the engine", job_id);
        }
    }
}

/// Fetches the job list and the selected job's detail page concurrently.
pub async fn poll_jobs(
    backend: &dyn Backend,
    query: &JobListQuery,
    detail: Option<(JobId, ItemLimits)>,
) -> EngineEvent {
    let list = backend.list_jobs(query);
    match detail {
        Some((job_id, limits)) => {
            let (jobs, detail) = tokio::join!(list, backend.get_job(&job_id, limits));
            EngineEvent::PollCompleted {
                jobs,
                detail: Some((job_id, detail)),
            }
        }
        None => EngineEvent::PollCompleted {
            jobs: list.await,
            detail: None,
        },
    }
}
