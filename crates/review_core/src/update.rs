use review_logging::{review_debug, review_error, review_info, review_warn};

use crate::effect::Effect;
use crate::job::JobId;
use crate::msg::{BackendFailure, DetailPoll, FailureKind, IdCheck, Msg};
use crate::planner::{build_submission_plan, JobDraft};
use crate::scope::{parse_id_list, resolve_scope, IdValidation, JobScope, ScopeSize};
use crate::state::{AppState, PendingSubmission, SubmissionState};
use crate::tracker::DetailChange;

/// Pure update function: applies a message to state and returns any effects.
pub fn update(mut state: AppState, msg: Msg) -> (AppState, Vec<Effect>) {
    let mut effects = Vec::new();
    match msg {
        Msg::PollTick => {
            state.poll.tick += 1;
            review_logging::set_poll_tick(state.poll.tick);
            if state.poll.in_flight {
                review_debug!("Poll tick {} skipped: previous poll in flight", state.poll.tick);
            } else if state.needs_polling() || state.list_open {
                effects.push(start_poll(&mut state));
            }
        }
        Msg::PollCompleted { jobs, detail } => {
            state.poll.in_flight = false;
            apply_job_list(&mut state, jobs, &mut effects);
            if let Some(detail) = detail {
                apply_detail(&mut state, detail, &mut effects);
            }
            if std::mem::take(&mut state.poll.force_pending) {
                effects.push(start_poll(&mut state));
            }
        }
        Msg::UnseenTick => {
            if !state.list_open && !state.unseen_in_flight {
                state.unseen_in_flight = true;
                effects.push(Effect::FetchUnseenCount);
            }
        }
        Msg::UnseenCountFetched(result) => {
            state.unseen_in_flight = false;
            match result {
                Ok(count) if count != state.unseen_count => {
                    state.unseen_count = count;
                    state.mark_dirty();
                }
                Ok(_) => {}
                Err(failure) => review_debug!("Unseen count unavailable: {}", failure.message),
            }
        }
        Msg::JobListOpened => {
            state.list_open = true;
            state.mark_dirty();
            request_poll(&mut state, &mut effects);
        }
        Msg::JobListClosed => {
            state.list_open = false;
            state.mark_dirty();
            if !state.unseen_in_flight {
                state.unseen_in_flight = true;
                effects.push(Effect::FetchUnseenCount);
            }
        }
        Msg::JobSelected(job_id) => {
            let already_seen = state.tracker.job(&job_id).is_some_and(|job| job.seen);
            state.tracker.select(job_id.clone());
            state.mark_dirty();
            if !already_seen {
                effects.push(Effect::MarkSeen { job_id });
            }
            request_poll(&mut state, &mut effects);
        }
        Msg::SelectionCleared => {
            state.tracker.clear_selection();
            state.mark_dirty();
        }
        Msg::CancelClicked(job_id) => match state.tracker.job(&job_id) {
            Some(job) if !job.status.can_cancel() => {
                review_warn!("Job {} is {:?}; cancel ignored", job_id, job.status);
            }
            _ => effects.push(Effect::CancelJob { job_id }),
        },
        Msg::CancelFinished { job_id, result } => {
            if let Err(failure) = result {
                record_error(&mut state, format!("Cancel of {job_id} failed: {}", failure.message));
            }
            // The backend's view of the job is authoritative either way.
            request_poll(&mut state, &mut effects);
        }
        Msg::DeleteClicked(job_id) => match state.tracker.job(&job_id).map(|job| job.status) {
            Some(status) if status.is_terminal() => effects.push(Effect::DeleteJob { job_id }),
            Some(status) => {
                record_error(
                    &mut state,
                    format!("Job {job_id} is {status:?}; cancel it before deleting"),
                );
            }
            None => review_warn!("Delete requested for unknown job {}", job_id),
        },
        Msg::DeleteFinished { job_id, result } => match result {
            Ok(()) => forget_job(&mut state, &job_id),
            Err(failure) if failure.kind == FailureKind::NotFound => {
                forget_job(&mut state, &job_id);
            }
            Err(failure) => {
                record_error(&mut state, format!("Delete of {job_id} failed: {}", failure.message));
            }
        },
        Msg::IdsEdited {
            kind,
            target_type,
            raw,
        } => {
            let ids = parse_id_list(&raw);
            state.ids.generation += 1;
            state.ids.kind = Some(kind);
            state.ids.target_type = target_type;
            state.ids.error = None;
            state.mark_dirty();
            if ids.is_empty() {
                state.ids.validation = IdValidation::Idle;
                effects.push(Effect::CancelValidation);
            } else {
                let generation = state.ids.generation;
                state.ids.validation = IdValidation::Pending { generation, ids };
                effects.push(Effect::ScheduleValidation { generation });
            }
        }
        Msg::ValidationDue { generation } => {
            if let (
                Some(kind),
                IdValidation::Pending {
                    generation: pending,
                    ids,
                },
            ) = (state.ids.kind, &state.ids.validation)
            {
                if *pending == generation && generation == state.ids.generation {
                    effects.push(Effect::ValidateIds {
                        generation,
                        kind,
                        target_type: state.ids.target_type.clone(),
                        ids: ids.clone(),
                    });
                }
            }
        }
        Msg::IdsValidated { generation, result } => {
            if generation != state.ids.generation {
                review_debug!(
                    "Dropping validation for generation {} (current {})",
                    generation,
                    state.ids.generation
                );
            } else {
                apply_validation(&mut state, generation, result, &mut effects);
            }
        }
        Msg::SubmitClicked { draft, descriptor } => {
            if state.submission.is_busy() {
                review_warn!("Submit ignored: a submission is already in progress");
            } else {
                // Ids checked against another mode or record type do not count.
                let validation = match descriptor.id_kind() {
                    Some(kind)
                        if state.ids.kind != Some(kind)
                            || state.ids.target_type != descriptor.id_target_type() =>
                    {
                        IdValidation::Idle
                    }
                    _ => state.ids.validation.clone(),
                };
                let prepared = draft
                    .parsed_template()
                    .map_err(|err| err.to_string())
                    .and_then(|_| {
                        resolve_scope(&descriptor, &validation).map_err(|err| err.to_string())
                    });
                match prepared {
                    Err(message) => fail_submission(&mut state, message),
                    Ok(resolved) => match resolved.size {
                        ScopeSize::Exact(total) => {
                            submit(&mut state, &draft, &resolved.scope, total, &mut effects);
                        }
                        ScopeSize::NeedsCount => {
                            state.submission = SubmissionState::Counting {
                                label: draft.label.clone(),
                            };
                            state.pending = Some(PendingSubmission {
                                draft: draft.clone(),
                                scope: resolved.scope.clone(),
                            });
                            state.mark_dirty();
                            effects.push(Effect::CountScope {
                                draft,
                                scope: resolved.scope,
                            });
                        }
                    },
                }
            }
        }
        Msg::ScopeCounted(result) => match (state.pending.take(), result) {
            (None, _) => review_debug!("Scope count arrived with no pending submission"),
            (Some(pending), Ok(total)) => {
                submit(&mut state, &pending.draft, &pending.scope, total, &mut effects);
            }
            (Some(_), Err(failure)) => {
                fail_submission(&mut state, format!("Could not size scope: {}", failure.message));
            }
        },
        Msg::SubmissionFinished(result) => {
            match result {
                Ok(job) => {
                    review_info!("Job {} submitted with {} items", job.id, job.total_items);
                    let job_id = job.id.clone();
                    state.tracker.upsert_job(job);
                    state.tracker.select(job_id.clone());
                    state.submission = SubmissionState::Submitted { job_id };
                }
                Err(failure) => {
                    if let Some(job_id) = &failure.cancelled_job {
                        review_warn!("Submission of {} failed and was cancelled", job_id);
                    }
                    state.submission = SubmissionState::Failed {
                        message: failure.message,
                    };
                }
            }
            state.mark_dirty();
            request_poll(&mut state, &mut effects);
        }
        Msg::RestoreNotified(ids) => state.tracker.restore_notified(ids),
    }

    (state, effects)
}

fn start_poll(state: &mut AppState) -> Effect {
    state.poll.in_flight = true;
    let detail = state
        .tracker
        .selected()
        .map(|job_id| (job_id.clone(), state.config.item_limits));
    Effect::PollJobs {
        include_completed: state.config.include_completed,
        limit: state.config.job_list_limit,
        entity_type: state.config.entity_type.clone(),
        detail,
    }
}

/// Polls now, or once the in-flight poll returns. Repeated requests coalesce.
fn request_poll(state: &mut AppState, effects: &mut Vec<Effect>) {
    if state.poll.in_flight {
        state.poll.force_pending = true;
    } else {
        effects.push(start_poll(state));
    }
}

fn apply_job_list(
    state: &mut AppState,
    jobs: Result<Vec<crate::job::Job>, BackendFailure>,
    effects: &mut Vec<Effect>,
) {
    match jobs {
        Ok(jobs) => {
            if !state.loaded {
                state.loaded = true;
                state.mark_dirty();
            }
            let update = state.tracker.apply_job_list(jobs);
            if update.changed {
                state.mark_dirty();
            }
            for job in update.completed {
                effects.push(Effect::NotifyCompleted {
                    job_id: job.id.clone(),
                    label: job.label.clone(),
                    status: job.status,
                });
            }
        }
        Err(failure) if failure.kind == FailureKind::Transient => {
            review_debug!("Job list poll failed transiently: {}", failure.message);
        }
        Err(failure) => record_error(state, format!("Job list unavailable: {}", failure.message)),
    }
}

fn apply_detail(state: &mut AppState, poll: DetailPoll, effects: &mut Vec<Effect>) {
    if state.tracker.selected() != Some(&poll.job_id) {
        return;
    }
    match poll.result {
        Ok((job, items)) => {
            if let Some((change, completed)) = state.tracker.apply_detail(job, items) {
                if change != DetailChange::Unchanged {
                    state.mark_dirty();
                }
                if let Some(job) = completed {
                    effects.push(Effect::NotifyCompleted {
                        job_id: job.id.clone(),
                        label: job.label.clone(),
                        status: job.status,
                    });
                }
            }
        }
        Err(failure) => match failure.kind {
            FailureKind::NotFound => {
                review_info!("Selected job {} no longer exists", poll.job_id);
                state.tracker.clear_selection();
                state.mark_dirty();
            }
            FailureKind::Transient => {
                review_debug!("Detail poll failed transiently: {}", failure.message);
            }
            FailureKind::Persistent => {
                let message = format!("Job {} unavailable: {}", poll.job_id, failure.message);
                record_error(state, message);
            }
        },
    }
}

fn apply_validation(
    state: &mut AppState,
    generation: u64,
    result: Result<IdCheck, BackendFailure>,
    effects: &mut Vec<Effect>,
) {
    match result {
        Ok(check) => {
            let submitted = match &state.ids.validation {
                IdValidation::Pending { ids, .. } => ids.clone(),
                _ => check.valid.clone(),
            };
            state.ids.validation = if check.unknown.is_empty() {
                IdValidation::Valid { ids: submitted }
            } else {
                IdValidation::Invalid {
                    unknown: check.unknown,
                }
            };
            state.mark_dirty();
        }
        Err(failure) if failure.kind == FailureKind::Transient => {
            review_debug!("Id validation failed transiently; retrying");
            effects.push(Effect::ScheduleValidation { generation });
        }
        Err(failure) => {
            let message = format!("Id validation failed: {}", failure.message);
            state.ids.error = Some(message.clone());
            record_error(state, message);
        }
    }
}

fn submit(
    state: &mut AppState,
    draft: &JobDraft,
    scope: &JobScope,
    total: u64,
    effects: &mut Vec<Effect>,
) {
    match build_submission_plan(draft, scope, total, state.config.max_batch_size) {
        Ok(plan) => {
            review_info!(
                "Submitting '{}': {} items in {} windows",
                draft.label,
                total,
                plan.windows.len()
            );
            state.submission = SubmissionState::Submitting {
                label: draft.label.clone(),
                total_items: total,
            };
            state.mark_dirty();
            effects.push(Effect::SubmitPlan(plan));
        }
        Err(err) => fail_submission(state, err.to_string()),
    }
}

fn fail_submission(state: &mut AppState, message: String) {
    review_warn!("Submission rejected: {}", message);
    state.pending = None;
    state.submission = SubmissionState::Failed { message };
    state.mark_dirty();
}

fn forget_job(state: &mut AppState, job_id: &JobId) {
    if state.tracker.remove_job(job_id) {
        state.mark_dirty();
    }
}

fn record_error(state: &mut AppState, message: String) {
    review_error!("{}", message);
    state.last_error = Some(message);
    state.mark_dirty();
}
