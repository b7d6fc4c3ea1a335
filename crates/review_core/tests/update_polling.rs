use chrono::{TimeZone, Utc};
use pretty_assertions::assert_eq;
use review_core::{
    update, AppState, BackendFailure, DetailPoll, Effect, FailureKind, ItemLimits, Job, JobStatus,
    Msg,
};

fn job(id: &str, status: JobStatus) -> Job {
    Job {
        id: id.into(),
        label: format!("label {id}"),
        status,
        entity_type: None,
        total_items: 4,
        submitted_items: 4,
        processed_items: 0,
        succeeded_items: 0,
        failed_items: 0,
        flagged_items: 0,
        input_tokens: 0,
        output_tokens: 0,
        cost: None,
        seen: false,
        created_at: Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0).unwrap(),
        started_at: None,
        completed_at: None,
        updated_at: None,
    }
}

fn poll_result(state: AppState, jobs: Vec<Job>) -> (AppState, Vec<Effect>) {
    update(
        state,
        Msg::PollCompleted {
            jobs: Ok(jobs),
            detail: None,
        },
    )
}

fn is_poll(effect: &Effect) -> bool {
    matches!(effect, Effect::PollJobs { .. })
}

#[test]
fn first_tick_polls_and_second_tick_is_skipped_while_in_flight() {
    review_logging::initialize_for_tests();
    let (state, effects) = update(AppState::new(), Msg::PollTick);
    assert_eq!(
        effects,
        vec![Effect::PollJobs {
            include_completed: true,
            limit: 50,
            entity_type: None,
            detail: None,
        }]
    );
    assert!(state.poll_in_flight());

    let (state, effects) = update(state, Msg::PollTick);
    assert!(effects.is_empty());
    assert_eq!(state.poll_tick(), 2);
}

#[test]
fn polling_stops_once_every_job_is_terminal() {
    let (state, _) = update(AppState::new(), Msg::PollTick);
    let (state, _) = poll_result(state, vec![job("j1", JobStatus::Running)]);
    let (state, effects) = update(state, Msg::PollTick);
    assert!(effects.iter().any(is_poll));

    let (state, _) = poll_result(state, vec![job("j1", JobStatus::Failed)]);
    assert!(!state.needs_polling());
    let (_, effects) = update(state, Msg::PollTick);
    assert!(effects.is_empty());
}

#[test]
fn completion_notifies_exactly_once() {
    let (state, _) = update(AppState::new(), Msg::PollTick);
    let (state, _) = poll_result(state, vec![job("j1", JobStatus::Running)]);

    let (state, _) = update(state, Msg::JobListOpened);
    let (state, effects) = poll_result(state, vec![job("j1", JobStatus::Completed)]);
    assert_eq!(
        effects,
        vec![Effect::NotifyCompleted {
            job_id: "j1".into(),
            label: "label j1".into(),
            status: JobStatus::Completed,
        }]
    );
    assert_eq!(state.notified_jobs(), vec!["j1".to_string()]);

    let (state, _) = update(state, Msg::PollTick);
    let (_, effects) = poll_result(state, vec![job("j1", JobStatus::Completed)]);
    assert!(effects.is_empty());
}

#[test]
fn restored_notifications_are_not_repeated() {
    let (state, _) = update(AppState::new(), Msg::RestoreNotified(vec!["j1".into()]));
    let (state, _) = update(state, Msg::PollTick);
    let (state, _) = poll_result(state, vec![job("j1", JobStatus::Running)]);
    let (state, _) = update(state, Msg::PollTick);
    let (_, effects) = poll_result(state, vec![job("j1", JobStatus::Completed)]);
    assert!(effects.is_empty());
}

#[test]
fn forced_poll_during_flight_runs_after_completion() {
    let (state, _) = update(AppState::new(), Msg::PollTick);
    let (state, effects) = update(state, Msg::JobSelected("j1".into()));
    assert_eq!(
        effects,
        vec![Effect::MarkSeen {
            job_id: "j1".into()
        }]
    );
    // A second request while still in flight coalesces into the same pending poll.
    let (state, effects) = update(state, Msg::JobListOpened);
    assert!(effects.is_empty());

    let (state, effects) = poll_result(state, vec![job("j1", JobStatus::Running)]);
    assert_eq!(
        effects,
        vec![Effect::PollJobs {
            include_completed: true,
            limit: 50,
            entity_type: None,
            detail: Some(("j1".into(), ItemLimits::default())),
        }]
    );
    assert!(state.poll_in_flight());

    let (_, effects) = poll_result(state, vec![job("j1", JobStatus::Running)]);
    assert!(effects.is_empty());
}

#[test]
fn unchanged_poll_does_not_mark_dirty() {
    let (state, _) = update(AppState::new(), Msg::PollTick);
    let (mut state, _) = poll_result(state, vec![job("j1", JobStatus::Running)]);
    assert!(state.consume_dirty());

    let (state, _) = update(state, Msg::PollTick);
    let (mut state, _) = poll_result(state, vec![job("j1", JobStatus::Running)]);
    assert!(!state.consume_dirty());
}

#[test]
fn transient_failure_is_silent_and_persistent_failure_is_reported() {
    let (state, _) = update(AppState::new(), Msg::PollTick);
    let (state, _) = update(
        state,
        Msg::PollCompleted {
            jobs: Err(BackendFailure::new(FailureKind::Transient, "timeout")),
            detail: None,
        },
    );
    assert_eq!(state.view().last_error, None);
    assert!(state.needs_polling());

    let (state, _) = update(state, Msg::PollTick);
    let (state, _) = update(
        state,
        Msg::PollCompleted {
            jobs: Err(BackendFailure::new(FailureKind::Persistent, "forbidden")),
            detail: None,
        },
    );
    assert_eq!(
        state.view().last_error.as_deref(),
        Some("Job list unavailable: forbidden")
    );
}

#[test]
fn missing_selected_job_clears_selection() {
    let (state, _) = update(AppState::new(), Msg::JobSelected("gone".into()));
    let (state, _) = update(
        state,
        Msg::PollCompleted {
            jobs: Ok(Vec::new()),
            detail: Some(DetailPoll {
                job_id: "gone".into(),
                result: Err(BackendFailure::new(FailureKind::NotFound, "no such job")),
            }),
        },
    );
    assert_eq!(state.view().selected_job_id, None);
}

#[test]
fn unchanged_detail_keeps_item_reference() {
    let (state, _) = update(AppState::new(), Msg::JobSelected("j1".into()));
    let detail = |processed| DetailPoll {
        job_id: "j1".into(),
        result: Ok((
            Job {
                processed_items: processed,
                ..job("j1", JobStatus::Running)
            },
            Vec::new(),
        )),
    };
    let (state, _) = update(
        state,
        Msg::PollCompleted {
            jobs: Ok(vec![job("j1", JobStatus::Running)]),
            detail: Some(detail(1)),
        },
    );
    let before = state.view().selected.unwrap();

    let (state, _) = update(state, Msg::PollTick);
    let (state, _) = update(
        state,
        Msg::PollCompleted {
            jobs: Ok(vec![job("j1", JobStatus::Running)]),
            detail: Some(detail(2)),
        },
    );
    let after = state.view().selected.unwrap();
    assert!(std::sync::Arc::ptr_eq(&before.items, &after.items));
    assert!(!std::sync::Arc::ptr_eq(&before.job, &after.job));
    assert_eq!(after.job.processed_items, 2);
}

#[test]
fn unseen_count_is_fetched_only_while_list_is_closed() {
    let (state, effects) = update(AppState::new(), Msg::UnseenTick);
    assert_eq!(effects, vec![Effect::FetchUnseenCount]);
    // Still in flight.
    let (state, effects) = update(state, Msg::UnseenTick);
    assert!(effects.is_empty());

    let (state, _) = update(state, Msg::UnseenCountFetched(Ok(3)));
    assert_eq!(state.view().unseen_count, 3);

    let (state, _) = update(state, Msg::JobListOpened);
    let (_, effects) = update(state, Msg::UnseenTick);
    assert!(effects.is_empty());
}

#[test]
fn cancel_is_rejected_for_terminal_jobs_and_repolls_otherwise() {
    let (state, _) = update(AppState::new(), Msg::PollTick);
    let (state, _) = poll_result(
        state,
        vec![job("done", JobStatus::Completed), job("live", JobStatus::Running)],
    );

    let (state, effects) = update(state, Msg::CancelClicked("done".into()));
    assert!(effects.is_empty());

    let (state, effects) = update(state, Msg::CancelClicked("live".into()));
    assert_eq!(
        effects,
        vec![Effect::CancelJob {
            job_id: "live".into()
        }]
    );

    let (_, effects) = update(
        state,
        Msg::CancelFinished {
            job_id: "live".into(),
            result: Ok(()),
        },
    );
    assert!(effects.iter().any(is_poll));
}

#[test]
fn delete_only_applies_to_terminal_jobs() {
    let (state, _) = update(AppState::new(), Msg::PollTick);
    let (state, _) = poll_result(
        state,
        vec![job("done", JobStatus::Completed), job("live", JobStatus::Running)],
    );

    let (state, effects) = update(state, Msg::DeleteClicked("live".into()));
    assert!(effects.is_empty());
    assert!(state.view().last_error.is_some());

    let (state, effects) = update(state, Msg::DeleteClicked("done".into()));
    assert_eq!(
        effects,
        vec![Effect::DeleteJob {
            job_id: "done".into()
        }]
    );
    let (state, _) = update(
        state,
        Msg::DeleteFinished {
            job_id: "done".into(),
            result: Ok(()),
        },
    );
    let ids: Vec<String> = state.view().jobs.into_iter().map(|row| row.job_id).collect();
    assert_eq!(ids, vec!["live".to_string()]);
}
