//! Recurring reminders with deep-linked notifications.
//!
//! ```text
//! caller ──schedule──▶ ReminderScheduler ──submit──▶ SchedulerBackend
//!                            ▲                            │ delay
//!                            └────────── fire ◀───────────┘
//!                            │
//!                            ├─▶ LinkResolver ──▶ Router       (click target)
//!                            ├─▶ NotificationDispatcher ──▶ NotificationSink
//!                            └─▶ re-arm: now + interval
//! ```

pub mod backend;
pub mod clock;
pub mod dispatcher;
pub mod error;
pub mod link;
pub mod router;
pub mod scheduler;
pub mod sinks;
pub mod stack;
pub mod types;

pub use backend::{
    BackendConfig, ConflictPolicy, JobHandler, JobOutcome, JobRequest, JobRun, JobSnapshot,
    JobState, LocalJobBackend, SchedulerBackend,
};
pub use clock::{Clock, SystemClock};
pub use dispatcher::{DispatcherConfig, NOTIFICATION_HANDLE_ACTION, NotificationDispatcher};
pub use error::NotificationError;
pub use link::{DeepLink, LinkResolver};
pub use router::{RouteTable, Router};
pub use scheduler::{ReminderEvent, ReminderScheduler, SchedulerConfig};
pub use sinks::{LogSink, NotificationSink, TraySink, WebhookConfig, WebhookSink};
pub use stack::{ReminderStack, ReminderStackBuilder};
pub use types::*;
