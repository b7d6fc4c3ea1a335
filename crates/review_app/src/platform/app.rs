//! The message loop: engine events in, state machine update, effects out.
use std::path::PathBuf;
use std::time::Duration;

use anyhow::{bail, Result};
use review_core::{
    update, AppState, IdKind, IdValidation, JobDraft, JobId, Msg, ScopeDescriptor,
    SubmissionState, TrackerConfig,
};
use review_logging::{review_debug, review_info};

use super::effects::EffectRunner;
use super::persistence::{load_watch_state, save_watch_state, WatchState};
use super::render;

const RECV_INTERVAL: Duration = Duration::from_millis(250);

pub struct Session {
    state: AppState,
    runner: EffectRunner,
    state_path: PathBuf,
    persisted: WatchState,
    restored_selection: Option<JobId>,
    last_frame: Vec<String>,
}

impl Session {
    /// Restores notified jobs from the watch-state file before any poll runs.
    pub fn new(runner: EffectRunner, config: TrackerConfig, state_path: PathBuf) -> Self {
        let persisted = load_watch_state(&state_path);
        let mut session = Self {
            state: AppState::with_config(config),
            runner,
            state_path,
            persisted: persisted.clone(),
            restored_selection: persisted.selected,
            last_frame: Vec::new(),
        };
        session.dispatch(Msg::RestoreNotified(persisted.notified));
        session
    }

    /// The job the operator followed last time, if any.
    pub fn last_selected(&self) -> Option<JobId> {
        self.restored_selection.clone()
    }

    pub fn dispatch(&mut self, msg: Msg) {
        let state = std::mem::take(&mut self.state);
        let (mut state, effects) = update(state, msg);
        let dirty = state.consume_dirty();
        let view = dirty.then(|| state.view());
        self.state = state;

        for completion in self.runner.enqueue(effects) {
            println!("{}", render::render_completion(&completion));
        }
        if let Some(view) = view {
            let frame = render::render(&view);
            if frame != self.last_frame {
                for line in &frame {
                    println!("{line}");
                }
                self.last_frame = frame;
            }
        }
        self.persist_if_changed();
    }

    /// Pumps engine events until `done` holds for the state.
    pub fn run_until(&mut self, done: impl Fn(&AppState) -> bool) {
        while !done(&self.state) {
            if let Some(msg) = self.runner.next_msg(RECV_INTERVAL) {
                self.dispatch(msg);
            }
        }
    }

    /// Types the ids into the id box and waits for the debounced validation.
    /// Errors from other requests, such as the job poll, do not end the wait.
    pub fn validate_ids(
        &mut self,
        kind: IdKind,
        target_type: &str,
        raw: &str,
    ) -> Result<Vec<String>> {
        self.dispatch(Msg::IdsEdited {
            kind,
            target_type: target_type.to_string(),
            raw: raw.to_string(),
        });
        self.run_until(|state| {
            !matches!(state.id_validation(), IdValidation::Pending { .. })
                || state.id_validation_error().is_some()
        });

        match self.state.id_validation() {
            IdValidation::Valid { ids } => Ok(ids.clone()),
            IdValidation::Invalid { unknown } => bail!("unknown ids: {}", unknown.join(", ")),
            IdValidation::Idle => bail!("no ids entered"),
            IdValidation::Pending { .. } => match self.state.id_validation_error() {
                Some(error) => bail!("{error}"),
                None => bail!("id validation did not finish"),
            },
        }
    }

    /// Submits and waits for the create/append sequence to finish.
    pub fn submit(&mut self, draft: JobDraft, descriptor: ScopeDescriptor) -> Result<JobId> {
        review_info!("Submitting job \"{}\"", draft.label);
        self.dispatch(Msg::SubmitClicked { draft, descriptor });
        self.run_until(|state| !state.submission().is_busy());

        match self.state.submission() {
            SubmissionState::Submitted { job_id } => Ok(job_id.clone()),
            SubmissionState::Failed { message } => bail!("{message}"),
            other => bail!("submission ended in unexpected state {other:?}"),
        }
    }

    /// Follows the job list, or one job, until nothing is left to wait for.
    /// With `follow` it keeps polling until the process is stopped.
    pub fn watch(&mut self, job: Option<JobId>, follow: bool) {
        self.dispatch(Msg::JobListOpened);
        if let Some(job_id) = &job {
            self.dispatch(Msg::JobSelected(job_id.clone()));
        }
        self.run_until(|state| {
            !follow
                && match &job {
                    Some(job_id) => job_settled(state, job_id),
                    None => !state.needs_polling(),
                }
        });
        review_debug!("Watch finished after {} poll(s)", self.state.poll_tick());
    }

    fn persist_if_changed(&mut self) {
        let current = WatchState {
            notified: self.state.notified_jobs(),
            selected: self
                .state
                .tracker()
                .selected()
                .cloned()
                .or_else(|| self.persisted.selected.clone()),
        };
        if current != self.persisted {
            save_watch_state(&self.state_path, &current);
            self.persisted = current;
        }
    }
}

/// The job is gone, or its detail shows a terminal status.
fn job_settled(state: &AppState, job_id: &str) -> bool {
    let tracker = state.tracker();
    if tracker.selected().map(String::as_str) != Some(job_id) {
        return true;
    }
    tracker
        .detail()
        .is_some_and(|detail| detail.job.status.is_terminal())
}
