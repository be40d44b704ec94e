use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use tracing::info;

use super::NotificationSink;
use crate::error::NotificationError;
use crate::types::{ClickAction, NotificationRecord};

/// Sink that renders notifications as structured log events
#[derive(Debug, Default)]
pub struct LogSink {
    posted: AtomicUsize,
}

impl LogSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn posted_count(&self) -> usize {
        self.posted.load(Ordering::Relaxed)
    }
}

fn describe(action: Option<&ClickAction>) -> String {
    match action {
        Some(ClickAction::Launch(target)) => format!("launch {}", target.destination.name),
        Some(ClickAction::Broadcast { link, .. }) => format!("link {link}"),
        None => "none".to_string(),
    }
}

#[async_trait]
impl NotificationSink for LogSink {
    async fn post(&self, record: &NotificationRecord) -> Result<(), NotificationError> {
        self.posted.fetch_add(1, Ordering::Relaxed);
        info!(
            notify_id = record.notify_id,
            channel = %record.channel_id,
            title = %record.title,
            content = %record.content,
            click = %describe(record.click_action.as_ref()),
            "Notification posted"
        );
        Ok(())
    }

    async fn cancel(&self, notify_id: u32) -> Result<(), NotificationError> {
        info!(notify_id, "Notification dismissed");
        Ok(())
    }

    async fn cancel_all(&self) -> Result<(), NotificationError> {
        info!("All notifications dismissed");
        Ok(())
    }

    fn name(&self) -> &str {
        "log"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{DestinationRef, LaunchableTarget};
    use indexmap::IndexMap;

    #[test]
    fn test_describe_click_actions() {
        let target = LaunchableTarget {
            destination: DestinationRef::screen("SecondScreen"),
            params: IndexMap::new(),
            request_code: 1,
        };
        assert_eq!(describe(Some(&ClickAction::Launch(target))), "launch SecondScreen");
        assert_eq!(
            describe(Some(&ClickAction::Broadcast {
                action: "x".into(),
                link: "//route/a".into()
            })),
            "link //route/a"
        );
        assert_eq!(describe(None), "none");
    }

    #[tokio::test]
    async fn test_post_counts() {
        let sink = LogSink::new();
        let record = NotificationRecord {
            notify_id: 100,
            channel_id: "reminders".into(),
            title: "t".into(),
            content: "c".into(),
            click_action: None,
            posted_at: time::OffsetDateTime::now_utc(),
            small_icon: "ic".into(),
            auto_cancel: true,
        };
        sink.post(&record).await.unwrap();
        sink.cancel_all().await.unwrap();
        assert_eq!(sink.posted_count(), 1);
    }
}
