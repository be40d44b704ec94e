pub mod log;
pub mod tray;
pub mod webhook;

use async_trait::async_trait;

use crate::error::NotificationError;
use crate::types::NotificationRecord;

/// Platform surface that renders notifications
#[async_trait]
pub trait NotificationSink: Send + Sync {
    /// Deliver a notification, keyed by `record.notify_id`
    async fn post(&self, record: &NotificationRecord) -> Result<(), NotificationError>;

    /// Remove one live notification (click with auto-cancel, user dismissal)
    async fn cancel(&self, notify_id: u32) -> Result<(), NotificationError>;

    /// Remove every live notification this process created
    async fn cancel_all(&self) -> Result<(), NotificationError>;

    /// Sink name for logging
    fn name(&self) -> &str;
}

pub use log::LogSink;
pub use tray::TraySink;
pub use webhook::{WebhookConfig, WebhookSink};
