use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use beacon_notifications::{
    BackendConfig, Clock, DestinationRef, NotificationError, NotificationRecord,
    NotificationSink, ReminderEvent, ReminderRequest, ReminderStack, ReminderState, RouteTable,
    SchedulerConfig, SystemClock, TraySink,
};
use tokio::sync::{Semaphore, broadcast};
use tokio::time::timeout;

const INTERVAL: Duration = Duration::from_secs(120);

fn routes() -> Arc<RouteTable> {
    Arc::new(
        RouteTable::from_routes([
            ("/app/main", DestinationRef::screen("MainScreen")),
            ("/app/second", DestinationRef::screen("SecondScreen")),
        ])
        .unwrap(),
    )
}

fn stack(sink: Arc<dyn NotificationSink>) -> ReminderStack {
    ReminderStack::builder()
        .with_router(routes())
        .with_sink(sink)
        .build()
        .unwrap()
}

fn now() -> i64 {
    SystemClock.now_millis()
}

async fn wait_for(
    rx: &mut broadcast::Receiver<ReminderEvent>,
    matches: impl Fn(&ReminderEvent) -> bool,
) -> ReminderEvent {
    timeout(Duration::from_secs(24 * 3600), async {
        loop {
            let event = rx.recv().await.expect("event stream closed");
            if matches(&event) {
                return event;
            }
        }
    })
    .await
    .expect("timed out waiting for reminder event")
}

/// Sink whose posts block until the test opens the gate
struct GatedSink {
    tray: TraySink,
    gate: Semaphore,
}

impl GatedSink {
    fn new() -> Self {
        Self {
            tray: TraySink::new(),
            gate: Semaphore::new(0),
        }
    }
}

#[async_trait]
impl NotificationSink for GatedSink {
    async fn post(&self, record: &NotificationRecord) -> Result<(), NotificationError> {
        self.gate
            .acquire()
            .await
            .map_err(|e| NotificationError::Internal(e.to_string()))?
            .forget();
        self.tray.post(record).await
    }

    async fn cancel(&self, notify_id: u32) -> Result<(), NotificationError> {
        self.tray.cancel(notify_id).await
    }

    async fn cancel_all(&self) -> Result<(), NotificationError> {
        self.tray.cancel_all().await
    }

    fn name(&self) -> &str {
        "gated"
    }
}

#[tokio::test(start_paused = true)]
async fn schedule_twice_leaves_one_job_with_latest_fire_time() {
    let tray = Arc::new(TraySink::new());
    let stack = stack(tray.clone());
    let base = now();

    stack
        .scheduler
        .schedule(ReminderRequest::new(4, "Water", "Drink", "/app/second", base + 60_000))
        .unwrap();
    stack
        .scheduler
        .schedule(ReminderRequest::new(4, "Water", "Drink", "/app/second", base + 90_000))
        .unwrap();

    let jobs = stack.scheduler.pending_jobs();
    assert_eq!(jobs.len(), 1);
    assert_eq!(jobs[0].name, "reminder-4");
    assert_eq!(
        stack.scheduler.state(4),
        ReminderState::Pending {
            fire_at_epoch_millis: base + 90_000
        }
    );

    // Nothing fires at the superseded time
    tokio::time::sleep(Duration::from_secs(70)).await;
    assert_eq!(tray.posted_count().await, 0);

    tokio::time::sleep(Duration::from_secs(30)).await;
    assert_eq!(tray.posted_count().await, 1);
}

#[tokio::test(start_paused = true)]
async fn chain_keeps_firing_every_interval() {
    let tray = Arc::new(TraySink::new());
    let stack = stack(tray.clone());
    let mut events = stack.scheduler.subscribe();

    stack
        .scheduler
        .schedule(ReminderRequest::new(1, "Stretch", "Stand up", "/app/second", now()))
        .unwrap();

    const CYCLES: usize = 5;
    for _ in 0..CYCLES {
        wait_for(&mut events, |e| matches!(e, ReminderEvent::Rearmed { .. })).await;
    }

    assert_eq!(tray.posted_count().await, CYCLES);
    assert!(matches!(
        stack.scheduler.state(1),
        ReminderState::Pending { .. }
    ));
    assert_eq!(stack.scheduler.pending_jobs().len(), 1);
}

#[tokio::test(start_paused = true)]
async fn rearm_uses_fixed_interval() {
    let tray = Arc::new(TraySink::new());
    let stack = stack(tray.clone());
    let mut events = stack.scheduler.subscribe();

    stack
        .scheduler
        .schedule(ReminderRequest::new(2, "t", "c", "/app/second", now()))
        .unwrap();
    wait_for(&mut events, |e| matches!(e, ReminderEvent::Rearmed { .. })).await;

    let started = tokio::time::Instant::now();
    wait_for(&mut events, |e| matches!(e, ReminderEvent::Fired { .. })).await;
    let elapsed = started.elapsed();

    assert!(elapsed >= INTERVAL - Duration::from_millis(5), "fired early: {elapsed:?}");
    assert!(elapsed <= INTERVAL + Duration::from_secs(1), "fired late: {elapsed:?}");
}

#[tokio::test(start_paused = true)]
async fn notification_ids_increase_across_cancel_all() {
    let tray = Arc::new(TraySink::new());
    let stack = stack(tray.clone());
    let mut events = stack.scheduler.subscribe();

    stack
        .scheduler
        .schedule(ReminderRequest::new(1, "t", "c", "/app/second", now()))
        .unwrap();

    let mut ids = Vec::new();
    for cycle in 0..4 {
        let event = wait_for(&mut events, |e| matches!(e, ReminderEvent::Fired { .. })).await;
        if let ReminderEvent::Fired { notify_id, .. } = event {
            ids.push(notify_id.unwrap());
        }
        if cycle == 1 {
            stack.dispatcher.cancel_all().await.unwrap();
            assert!(tray.live().await.is_empty());
        }
    }

    assert_eq!(ids, vec![100, 101, 102, 103]);
}

#[tokio::test(start_paused = true)]
async fn unknown_link_still_posts_without_click_action() {
    let tray = Arc::new(TraySink::new());
    let stack = stack(tray.clone());
    let mut events = stack.scheduler.subscribe();

    stack
        .scheduler
        .schedule(ReminderRequest::new(9, "Orphan", "No screen", "/app/missing", now()))
        .unwrap();
    wait_for(&mut events, |e| matches!(e, ReminderEvent::Fired { .. })).await;

    let posted = tray.history().await;
    assert_eq!(posted.len(), 1);
    assert_eq!(posted[0].title, "Orphan");
    assert!(posted[0].click_action.is_none());
}

#[tokio::test(start_paused = true)]
async fn known_link_posts_launch_target() {
    let tray = Arc::new(TraySink::new());
    let stack = stack(tray.clone());
    let mut events = stack.scheduler.subscribe();

    stack
        .scheduler
        .schedule(ReminderRequest::new(
            12,
            "Review",
            "Open the second screen",
            "/app/second?tab=today",
            now(),
        ))
        .unwrap();
    wait_for(&mut events, |e| matches!(e, ReminderEvent::Fired { .. })).await;

    let record = tray.history().await.remove(0);
    let action = record.click_action.clone().expect("click action");
    let target = stack
        .dispatcher
        .handle_click(record.notify_id, &action)
        .await
        .unwrap();

    assert_eq!(target.destination.name, "SecondScreen");
    assert_eq!(target.params["tab"], "today");
    assert_eq!(target.request_code, 12);
    assert!(tray.live().await.is_empty());
}

#[tokio::test(start_paused = true)]
async fn cancel_before_fire_prevents_notification() {
    let tray = Arc::new(TraySink::new());
    let stack = ReminderStack::builder()
        .with_router(routes())
        .with_sink(tray.clone())
        .with_scheduler_config(SchedulerConfig { interval_secs: 1 })
        .build()
        .unwrap();

    stack
        .scheduler
        .schedule(ReminderRequest::new(7, "t", "c", "/app/second", now() + 1_000))
        .unwrap();

    tokio::time::sleep(Duration::from_millis(500)).await;
    assert!(stack.scheduler.cancel_work(7));
    assert_eq!(stack.scheduler.state(7), ReminderState::Unscheduled);

    tokio::time::sleep(Duration::from_millis(2_500)).await;
    assert_eq!(tray.posted_count().await, 0);
    assert!(!stack.scheduler.cancel_work(7));
}

#[tokio::test(start_paused = true)]
async fn delivery_failure_does_not_break_chain() {
    let tray = Arc::new(TraySink::new());
    let stack = stack(tray.clone());
    let mut events = stack.scheduler.subscribe();
    tray.set_enabled(false);

    stack
        .scheduler
        .schedule(ReminderRequest::new(5, "t", "c", "/app/second", now()))
        .unwrap();

    let failed = wait_for(&mut events, |e| matches!(e, ReminderEvent::Fired { .. })).await;
    assert!(matches!(
        failed,
        ReminderEvent::Fired { notify_id: None, error: Some(_), .. }
    ));
    wait_for(&mut events, |e| matches!(e, ReminderEvent::Rearmed { .. })).await;

    tray.set_enabled(true);
    let delivered = wait_for(&mut events, |e| matches!(e, ReminderEvent::Fired { .. })).await;
    assert!(matches!(
        delivered,
        ReminderEvent::Fired { notify_id: Some(100), error: None, .. }
    ));
}

#[tokio::test(start_paused = true)]
async fn cancel_while_firing_delivers_but_does_not_rearm() {
    let sink = Arc::new(GatedSink::new());
    let stack = stack(sink.clone());
    let mut events = stack.scheduler.subscribe();

    stack
        .scheduler
        .schedule(ReminderRequest::new(3, "t", "c", "/app/second", now()))
        .unwrap();

    while stack.scheduler.state(3) != ReminderState::Firing {
        tokio::time::sleep(Duration::from_millis(10)).await;
    }

    assert!(stack.scheduler.cancel_work(3));
    assert_eq!(stack.scheduler.state(3), ReminderState::Unscheduled);

    sink.gate.add_permits(1);
    let stopped = wait_for(&mut events, |e| matches!(e, ReminderEvent::Stopped { .. })).await;
    assert_eq!(stopped.reminder_id(), 3);

    assert_eq!(sink.tray.posted_count().await, 1);
    assert!(stack.scheduler.pending_jobs().is_empty());

    sink.gate.add_permits(10);
    tokio::time::sleep(INTERVAL * 3).await;
    assert_eq!(sink.tray.posted_count().await, 1);
}

#[tokio::test(start_paused = true)]
async fn reschedule_while_firing_wins_over_rearm() {
    let sink = Arc::new(GatedSink::new());
    let stack = stack(sink.clone());
    let mut events = stack.scheduler.subscribe();

    stack
        .scheduler
        .schedule(ReminderRequest::new(8, "old", "c", "/app/second", now()))
        .unwrap();
    while stack.scheduler.state(8) != ReminderState::Firing {
        tokio::time::sleep(Duration::from_millis(10)).await;
    }

    let chosen = now() + 600_000;
    stack
        .scheduler
        .schedule(ReminderRequest::new(8, "new", "c", "/app/second", chosen))
        .unwrap();

    sink.gate.add_permits(1);
    let event = wait_for(&mut events, |e| {
        matches!(
            e,
            ReminderEvent::Superseded { .. } | ReminderEvent::Stopped { .. }
        )
    })
    .await;
    assert_eq!(event, ReminderEvent::Superseded { reminder_id: 8 });

    let jobs = stack.scheduler.pending_jobs();
    assert_eq!(jobs.len(), 1);
    assert_eq!(jobs[0].payload.title, "new");
    assert_eq!(
        stack.scheduler.state(8),
        ReminderState::Pending {
            fire_at_epoch_millis: chosen
        }
    );
}

#[tokio::test(start_paused = true)]
async fn submission_failure_reaches_caller() {
    let stack = ReminderStack::builder()
        .with_router(routes())
        .with_sink(Arc::new(TraySink::new()))
        .with_backend_config(BackendConfig { max_jobs: 1 })
        .build()
        .unwrap();

    stack
        .scheduler
        .schedule(ReminderRequest::new(1, "t", "c", "/app/second", now() + 1_000))
        .unwrap();
    let result = stack
        .scheduler
        .schedule(ReminderRequest::new(2, "t", "c", "/app/second", now() + 1_000));

    assert!(matches!(result, Err(NotificationError::JobSubmission(_))));
    assert_eq!(stack.scheduler.state(2), ReminderState::Unscheduled);
}

#[tokio::test(start_paused = true)]
async fn shutdown_while_firing_stops_chain() {
    let sink = Arc::new(GatedSink::new());
    let stack = stack(sink.clone());
    let mut events = stack.scheduler.subscribe();

    stack
        .scheduler
        .schedule(ReminderRequest::new(6, "t", "c", "/app/second", now()))
        .unwrap();
    while stack.scheduler.state(6) != ReminderState::Firing {
        tokio::time::sleep(Duration::from_millis(10)).await;
    }

    stack.shutdown();
    sink.gate.add_permits(1);

    let stopped = wait_for(&mut events, |e| matches!(e, ReminderEvent::Stopped { .. })).await;
    if let ReminderEvent::Stopped { reason, .. } = stopped {
        assert!(reason.contains("shut down"));
    }
    assert_eq!(stack.scheduler.state(6), ReminderState::Unscheduled);
}

#[tokio::test(start_paused = true)]
async fn huge_interval_saturates_next_fire_time() {
    let tray = Arc::new(TraySink::new());
    let stack = ReminderStack::builder()
        .with_router(routes())
        .with_sink(tray.clone())
        .with_scheduler_config(SchedulerConfig {
            interval_secs: u64::MAX / 1000,
        })
        .build()
        .unwrap();
    let mut events = stack.scheduler.subscribe();

    stack
        .scheduler
        .schedule(ReminderRequest::new(11, "t", "c", "/app/second", now()))
        .unwrap();
    let rearmed = wait_for(&mut events, |e| matches!(e, ReminderEvent::Rearmed { .. })).await;

    assert_eq!(
        rearmed,
        ReminderEvent::Rearmed {
            reminder_id: 11,
            fire_at_epoch_millis: i64::MAX
        }
    );
    assert_eq!(
        stack.scheduler.state(11),
        ReminderState::Pending {
            fire_at_epoch_millis: i64::MAX
        }
    );
    stack.shutdown();
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_fires_do_not_mix_content() {
    let tray = Arc::new(TraySink::new());
    let stack = stack(tray.clone());
    let mut events = stack.scheduler.subscribe();
    let fire_at = now() + 50;

    stack
        .scheduler
        .schedule(ReminderRequest::new(1, "Title one", "Body one", "/app/main", fire_at))
        .unwrap();
    stack
        .scheduler
        .schedule(ReminderRequest::new(2, "Title two", "Body two", "/app/second", fire_at))
        .unwrap();

    timeout(Duration::from_secs(10), async {
        let mut fired = 0;
        while fired < 2 {
            if let ReminderEvent::Fired { .. } = events.recv().await.unwrap() {
                fired += 1;
            }
        }
    })
    .await
    .expect("both reminders should fire");

    let mut posted = tray.history().await;
    posted.sort_by(|a, b| a.title.cmp(&b.title));
    assert_eq!(posted.len(), 2);
    assert_eq!(
        (posted[0].title.as_str(), posted[0].content.as_str()),
        ("Title one", "Body one")
    );
    assert_eq!(
        (posted[1].title.as_str(), posted[1].content.as_str()),
        ("Title two", "Body two")
    );
    assert_ne!(posted[0].notify_id, posted[1].notify_id);

    let one = posted[0].click_action.clone().unwrap();
    let two = posted[1].click_action.clone().unwrap();
    assert_ne!(one, two);
    stack.shutdown();
}
