use std::time::Duration;

use review_core::{DetailPoll, Effect, JobId, JobStatus, Msg};
use review_engine::{EngineEvent, EngineHandle};
use review_logging::{review_debug, review_info};

/// A completion the app announces itself.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Completion {
    pub job_id: JobId,
    pub label: String,
    pub status: JobStatus,
}

pub struct EffectRunner {
    engine: EngineHandle,
}

impl EffectRunner {
    pub fn new(engine: EngineHandle) -> Self {
        Self { engine }
    }

    /// Forwards IO effects to the engine and returns the completions to announce.
    pub fn enqueue(&self, effects: Vec<Effect>) -> Vec<Completion> {
        let mut completions = Vec::new();
        for effect in effects {
            match effect {
                Effect::NotifyCompleted {
                    job_id,
                    label,
                    status,
                } => {
                    review_info!("Job {} finished as {:?}", job_id, status);
                    completions.push(Completion {
                        job_id,
                        label,
                        status,
                    });
                }
                effect => {
                    review_debug!("Dispatching {:?}", effect);
                    self.engine.execute(effect);
                }
            }
        }
        completions
    }

    pub fn next_msg(&self, timeout: Duration) -> Option<Msg> {
        self.engine.recv_timeout(timeout).map(map_event)
    }
}

impl Drop for EffectRunner {
    fn drop(&mut self) {
        self.engine.shutdown();
    }
}

pub fn map_event(event: EngineEvent) -> Msg {
    match event {
        EngineEvent::PollTick => Msg::PollTick,
        EngineEvent::UnseenTick => Msg::UnseenTick,
        EngineEvent::ValidationDue { generation } => Msg::ValidationDue { generation },
        EngineEvent::PollCompleted { jobs, detail } => Msg::PollCompleted {
            jobs: jobs.map_err(|err| err.failure()),
            detail: detail.map(|(job_id, result)| DetailPoll {
                job_id,
                result: result
                    .map(|response| (response.job, response.items))
                    .map_err(|err| err.failure()),
            }),
        },
        EngineEvent::UnseenCount(result) => {
            Msg::UnseenCountFetched(result.map_err(|err| err.failure()))
        }
        EngineEvent::Cancelled { job_id, result } => Msg::CancelFinished {
            job_id,
            result: result.map_err(|err| err.failure()),
        },
        EngineEvent::Deleted { job_id, result } => Msg::DeleteFinished {
            job_id,
            result: result.map_err(|err| err.failure()),
        },
        EngineEvent::IdsValidated { generation, result } => Msg::IdsValidated {
            generation,
            result: result.map_err(|err| err.failure()),
        },
        EngineEvent::ScopeCounted(result) => Msg::ScopeCounted(result.map_err(|err| err.failure())),
        EngineEvent::SubmissionFinished(result) => {
            Msg::SubmissionFinished(result.map_err(|err| err.to_failure()))
        }
    }
}
