//! Tickers and a restartable one-shot timer, both driven by tokio time so tests
//! can run them under a paused clock.
use std::sync::mpsc;
use std::time::Duration;

use review_logging::review_trace;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

use crate::types::EngineEvent;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PollSettings {
    pub job_interval: Duration,
    pub unseen_interval: Duration,
    pub validation_debounce: Duration,
}

impl Default for PollSettings {
    fn default() -> Self {
        Self {
            job_interval: Duration::from_secs(5),
            unseen_interval: Duration::from_secs(30),
            validation_debounce: Duration::from_millis(500),
        }
    }
}

/// Must be created and used inside a tokio runtime context.
pub struct Scheduler {
    events: mpsc::Sender<EngineEvent>,
    shutdown: CancellationToken,
    pending: Option<CancellationToken>,
}

impl Scheduler {
    pub fn new(events: mpsc::Sender<EngineEvent>) -> Self {
        Self {
            events,
            shutdown: CancellationToken::new(),
            pending: None,
        }
    }

    /// Emits `event` immediately and then every `period` until shutdown.
    ///
    /// Ticks missed while the receiver is slow are skipped, not bunched.
    pub fn start_ticker(&self, period: Duration, event: EngineEvent) -> JoinHandle<()> {
        let events = self.events.clone();
        let shutdown = self.shutdown.clone();
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
            loop {
                tokio::select! {
                    _ = shutdown.cancelled() => break,
                    _ = interval.tick() => {
                        if events.send(event.clone()).is_err() {
                            break;
                        }
                    }
                }
            }
        })
    }

    /// Emits `event` after `delay`, replacing any timer still pending.
    pub fn schedule_once(&mut self, delay: Duration, event: EngineEvent) {
        self.cancel_pending();
        let token = self.shutdown.child_token();
        self.pending = Some(token.clone());
        let events = self.events.clone();
        tokio::spawn(async move {
            tokio::select! {
                _ = token.cancelled() => {}
                _ = tokio::time::sleep(delay) => {
                    let _ = events.send(event);
                }
            }
        });
    }

    pub fn cancel_pending(&mut self) {
        if let Some(token) = self.pending.take() {
            review_trace!("Dropping pending timer");
            token.cancel();
        }
    }

    /// Stops every ticker and timer started by this scheduler.
    pub fn shutdown(&self) {
        self.shutdown.cancel();
    }
}

impl Drop for Scheduler {
    fn drop(&mut self) {
        self.shutdown.cancel();
    }
}
