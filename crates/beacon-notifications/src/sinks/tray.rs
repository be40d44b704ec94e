use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use tokio::sync::RwLock;
use tracing::debug;

use super::NotificationSink;
use crate::error::NotificationError;
use crate::types::NotificationRecord;

/// In-process notification tray.
///
/// Keeps the live entries keyed by id plus the full delivery history. A
/// disabled tray rejects posts the way a platform does when the channel is
/// turned off or the permission is revoked.
pub struct TraySink {
    live: RwLock<BTreeMap<u32, NotificationRecord>>,
    history: RwLock<Vec<NotificationRecord>>,
    enabled: AtomicBool,
}

impl TraySink {
    pub fn new() -> Self {
        Self {
            live: RwLock::new(BTreeMap::new()),
            history: RwLock::new(Vec::new()),
            enabled: AtomicBool::new(true),
        }
    }

    pub fn set_enabled(&self, enabled: bool) {
        self.enabled.store(enabled, Ordering::SeqCst);
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::SeqCst)
    }

    /// Notifications currently shown, ordered by id
    pub async fn live(&self) -> Vec<NotificationRecord> {
        self.live.read().await.values().cloned().collect()
    }

    /// Every notification ever posted, in delivery order
    pub async fn history(&self) -> Vec<NotificationRecord> {
        self.history.read().await.clone()
    }

    pub async fn posted_count(&self) -> usize {
        self.history.read().await.len()
    }
}

impl Default for TraySink {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl NotificationSink for TraySink {
    async fn post(&self, record: &NotificationRecord) -> Result<(), NotificationError> {
        if !self.is_enabled() {
            return Err(NotificationError::delivery("notifications are disabled"));
        }
        self.live.write().await.insert(record.notify_id, record.clone());
        self.history.write().await.push(record.clone());
        debug!(notify_id = record.notify_id, "Notification added to tray");
        Ok(())
    }

    async fn cancel(&self, notify_id: u32) -> Result<(), NotificationError> {
        self.live.write().await.remove(&notify_id);
        Ok(())
    }

    async fn cancel_all(&self) -> Result<(), NotificationError> {
        self.live.write().await.clear();
        Ok(())
    }

    fn name(&self) -> &str {
        "tray"
    }
}
