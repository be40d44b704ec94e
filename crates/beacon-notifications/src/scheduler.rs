//! Recurring reminder lifecycle.
//!
//! Each reminder is one named job in the scheduler backend. When the job
//! fires, the reminder posts its notification and re-arms itself one fixed
//! interval later, so it keeps firing until cancelled. The backend's job index
//! is the only bookkeeping: the state of a reminder is read straight from it.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use tracing::{debug, error, info, warn};

use crate::backend::{
    ConflictPolicy, JobHandler, JobOutcome, JobRequest, JobRun, JobSnapshot, JobState,
    SchedulerBackend,
};
use crate::clock::{Clock, delay_until};
use crate::dispatcher::NotificationDispatcher;
use crate::error::Result;
use crate::link::LinkResolver;
use crate::types::{REMINDER_JOB_PREFIX, ReminderRequest, ReminderState, job_name};

const EVENT_BUFFER_SIZE: usize = 256;

/// Scheduler configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchedulerConfig {
    /// Delay between a reminder firing and its next cycle
    #[serde(default = "default_interval_secs")]
    pub interval_secs: u64,
}

fn default_interval_secs() -> u64 {
    120
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            interval_secs: default_interval_secs(),
        }
    }
}

impl SchedulerConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }
}

/// Lifecycle events, broadcast to subscribers
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum ReminderEvent {
    Scheduled {
        reminder_id: u32,
        fire_at_epoch_millis: i64,
    },
    /// The notification for one cycle was attempted
    Fired {
        reminder_id: u32,
        notify_id: Option<u32>,
        error: Option<String>,
    },
    Rearmed {
        reminder_id: u32,
        fire_at_epoch_millis: i64,
    },
    Cancelled {
        reminder_id: u32,
    },
    /// Rescheduled while firing; the chain continues under the new job
    Superseded {
        reminder_id: u32,
    },
    /// The chain ended: cancelled mid-fire, or the re-arm failed
    Stopped {
        reminder_id: u32,
        reason: String,
    },
}

impl ReminderEvent {
    pub fn reminder_id(&self) -> u32 {
        match self {
            ReminderEvent::Scheduled { reminder_id, .. }
            | ReminderEvent::Fired { reminder_id, .. }
            | ReminderEvent::Rearmed { reminder_id, .. }
            | ReminderEvent::Cancelled { reminder_id }
            | ReminderEvent::Superseded { reminder_id }
            | ReminderEvent::Stopped { reminder_id, .. } => *reminder_id,
        }
    }
}

pub struct ReminderScheduler {
    backend: Arc<dyn SchedulerBackend>,
    dispatcher: NotificationDispatcher,
    resolver: LinkResolver,
    clock: Arc<dyn Clock>,
    interval: Duration,
    events: broadcast::Sender<ReminderEvent>,
}

impl ReminderScheduler {
    /// Create the scheduler and register it as the backend's job handler.
    pub fn new(
        backend: Arc<dyn SchedulerBackend>,
        dispatcher: NotificationDispatcher,
        clock: Arc<dyn Clock>,
        config: &SchedulerConfig,
    ) -> Arc<Self> {
        let (events, _) = broadcast::channel(EVENT_BUFFER_SIZE);
        let scheduler = Arc::new(Self {
            backend,
            resolver: dispatcher.resolver().clone(),
            dispatcher,
            clock,
            interval: config.interval(),
            events,
        });

        let handler: Arc<dyn JobHandler> = scheduler.clone();
        scheduler.backend.register_handler(Arc::downgrade(&handler));
        scheduler
    }

    /// Schedule (or reschedule) a reminder to fire at its fire time.
    ///
    /// Any job already registered for the same reminder is replaced, so two
    /// calls in a row leave exactly one job carrying the second fire time.
    pub fn schedule(&self, request: ReminderRequest) -> Result<()> {
        let delay = delay_until(self.clock.now_millis(), request.fire_at_epoch_millis);
        let reminder_id = request.reminder_id;
        let fire_at_epoch_millis = request.fire_at_epoch_millis;

        self.backend.submit(JobRequest {
            name: request.job_name(),
            delay,
            payload: request,
            on_conflict: ConflictPolicy::Replace,
        })?;

        debug!(reminder_id, delay_ms = delay.as_millis() as u64, "Reminder scheduled");
        self.emit(ReminderEvent::Scheduled {
            reminder_id,
            fire_at_epoch_millis,
        });
        Ok(())
    }

    /// Cancel a reminder. A notification already being delivered still
    /// arrives, but that cycle does not re-arm.
    pub fn cancel_work(&self, reminder_id: u32) -> bool {
        let cancelled = self.backend.cancel(&job_name(reminder_id));
        if cancelled {
            info!(reminder_id, "Reminder cancelled");
            self.emit(ReminderEvent::Cancelled { reminder_id });
        }
        cancelled
    }

    pub fn state(&self, reminder_id: u32) -> ReminderState {
        match self.backend.job(&job_name(reminder_id)) {
            Some(job) if job.state == JobState::Running => ReminderState::Firing,
            Some(job) => ReminderState::Pending {
                fire_at_epoch_millis: job.payload.fire_at_epoch_millis,
            },
            None => ReminderState::Unscheduled,
        }
    }

    /// Live reminder jobs, sorted by name
    pub fn pending_jobs(&self) -> Vec<JobSnapshot> {
        self.backend
            .jobs()
            .into_iter()
            .filter(|job| job.name.starts_with(REMINDER_JOB_PREFIX))
            .collect()
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ReminderEvent> {
        self.events.subscribe()
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    pub fn dispatcher(&self) -> &NotificationDispatcher {
        &self.dispatcher
    }

    fn emit(&self, event: ReminderEvent) {
        // No subscribers is fine
        let _ = self.events.send(event);
    }

    async fn fire(&self, run: JobRun) -> JobOutcome {
        let request = &run.payload;
        let reminder_id = request.reminder_id;
        info!(reminder_id, run_id = run.run_id, "Reminder firing");

        let request_code = i32::try_from(reminder_id).unwrap_or(i32::MAX);
        let target = self
            .resolver
            .build_launch_target(&request.route_link(), request_code);

        let delivery = self
            .dispatcher
            .send(&request.title, &request.content, target)
            .await;
        let (notify_id, delivery_error) = match delivery {
            Ok(record) => (Some(record.notify_id), None),
            Err(e) => {
                warn!(reminder_id, error = %e, "Reminder delivery failed, re-arming anyway");
                (None, Some(e.to_string()))
            }
        };
        self.emit(ReminderEvent::Fired {
            reminder_id,
            notify_id,
            error: delivery_error.clone(),
        });

        let interval_millis = i64::try_from(self.interval.as_millis()).unwrap_or(i64::MAX);
        let next = request.next_cycle(self.clock.now_millis().saturating_add(interval_millis));
        let fire_at_epoch_millis = next.fire_at_epoch_millis;

        match self.backend.resubmit(&run, self.interval, next) {
            Ok(true) => {
                debug!(reminder_id, fire_at_epoch_millis, "Reminder re-armed");
                self.emit(ReminderEvent::Rearmed {
                    reminder_id,
                    fire_at_epoch_millis,
                });
            }
            Ok(false) if self.backend.job(&run.name).is_some() => {
                info!(reminder_id, "Reminder rescheduled while firing, keeping the new job");
                self.emit(ReminderEvent::Superseded { reminder_id });
            }
            Ok(false) => {
                info!(reminder_id, "Reminder cancelled while firing, not re-arming");
                self.emit(ReminderEvent::Stopped {
                    reminder_id,
                    reason: "cancelled while firing".into(),
                });
            }
            Err(e) => {
                error!(reminder_id, error = %e, "Failed to re-arm reminder, chain stopped");
                self.emit(ReminderEvent::Stopped {
                    reminder_id,
                    reason: e.to_string(),
                });
                return JobOutcome::Failed(e.to_string());
            }
        }

        match delivery_error {
            Some(e) => JobOutcome::Failed(e),
            None => JobOutcome::Success,
        }
    }
}

#[async_trait]
impl JobHandler for ReminderScheduler {
    async fn run(&self, run: JobRun) -> JobOutcome {
        self.fire(run).await
    }
}
