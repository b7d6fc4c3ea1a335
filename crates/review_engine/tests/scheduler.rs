use std::sync::mpsc;
use std::time::Duration;

use review_engine::{EngineEvent, Scheduler};

fn drain(rx: &mpsc::Receiver<EngineEvent>) -> Vec<EngineEvent> {
    rx.try_iter().collect()
}

#[tokio::test(start_paused = true)]
async fn restarted_timer_fires_once_for_latest_generation() {
    let (tx, rx) = mpsc::channel();
    let mut scheduler = Scheduler::new(tx);
    let debounce = Duration::from_millis(500);

    scheduler.schedule_once(debounce, EngineEvent::ValidationDue { generation: 1 });
    tokio::time::sleep(Duration::from_millis(400)).await;
    assert!(drain(&rx).is_empty());

    scheduler.schedule_once(debounce, EngineEvent::ValidationDue { generation: 2 });
    tokio::time::sleep(Duration::from_millis(400)).await;
    assert!(drain(&rx).is_empty());

    tokio::time::sleep(Duration::from_millis(200)).await;
    assert_eq!(drain(&rx), vec![EngineEvent::ValidationDue { generation: 2 }]);
}

#[tokio::test(start_paused = true)]
async fn cancelled_timer_never_fires() {
    let (tx, rx) = mpsc::channel();
    let mut scheduler = Scheduler::new(tx);

    scheduler.schedule_once(
        Duration::from_millis(500),
        EngineEvent::ValidationDue { generation: 1 },
    );
    scheduler.cancel_pending();
    tokio::time::sleep(Duration::from_secs(2)).await;
    assert!(drain(&rx).is_empty());
}

#[tokio::test(start_paused = true)]
async fn ticker_fires_immediately_then_every_period_until_shutdown() {
    let (tx, rx) = mpsc::channel();
    let scheduler = Scheduler::new(tx);
    scheduler.start_ticker(Duration::from_secs(5), EngineEvent::PollTick);

    tokio::time::sleep(Duration::from_millis(12_500)).await;
    assert_eq!(drain(&rx).len(), 3);

    scheduler.shutdown();
    tokio::time::sleep(Duration::from_secs(20)).await;
    assert!(drain(&rx).is_empty());
}
