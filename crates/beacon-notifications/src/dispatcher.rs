//! Notification dispatcher.
//!
//! One task owns the notification template and the id counter. Callers talk
//! to it through a cloneable [`NotificationDispatcher`] handle, so sends are
//! processed strictly one at a time and a template field written for one
//! notification can never end up in another.

use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, info, warn};

use crate::error::{NotificationError, Result};
use crate::link::LinkResolver;
use crate::sinks::NotificationSink;
use crate::types::{ClickAction, LaunchableTarget, NotificationRecord};

/// Action name carried by broadcast-style click actions
pub const NOTIFICATION_HANDLE_ACTION: &str = "notification_handle_action";

/// Dispatcher configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DispatcherConfig {
    /// First notification id handed out
    #[serde(default = "default_base_id")]
    pub base_id: u32,
    #[serde(default = "default_channel_id")]
    pub channel_id: String,
    #[serde(default = "default_small_icon")]
    pub small_icon: String,
    /// Dismiss a notification when it is clicked
    #[serde(default = "default_true")]
    pub auto_cancel: bool,
    /// Pending requests before senders wait
    #[serde(default = "default_queue_capacity")]
    pub queue_capacity: usize,
}

fn default_base_id() -> u32 {
    100
}

fn default_channel_id() -> String {
    "reminders".to_string()
}

fn default_small_icon() -> String {
    "ic_reminder".to_string()
}

fn default_true() -> bool {
    true
}

fn default_queue_capacity() -> usize {
    64
}

impl Default for DispatcherConfig {
    fn default() -> Self {
        Self {
            base_id: default_base_id(),
            channel_id: default_channel_id(),
            small_icon: default_small_icon(),
            auto_cancel: true,
            queue_capacity: default_queue_capacity(),
        }
    }
}

/// Reusable notification builder. Every send overwrites title, content and
/// timestamp before a record is built from it.
struct NotificationTemplate {
    channel_id: String,
    small_icon: String,
    auto_cancel: bool,
    title: String,
    content: String,
    when: OffsetDateTime,
}

impl NotificationTemplate {
    fn new(config: &DispatcherConfig) -> Self {
        Self {
            channel_id: config.channel_id.clone(),
            small_icon: config.small_icon.clone(),
            auto_cancel: config.auto_cancel,
            title: String::new(),
            content: String::new(),
            when: OffsetDateTime::now_utc(),
        }
    }

    fn build(&self, notify_id: u32, click_action: Option<ClickAction>) -> NotificationRecord {
        NotificationRecord {
            notify_id,
            channel_id: self.channel_id.clone(),
            title: self.title.clone(),
            content: self.content.clone(),
            click_action,
            posted_at: self.when,
            small_icon: self.small_icon.clone(),
            auto_cancel: self.auto_cancel,
        }
    }
}

enum DispatchCommand {
    Send {
        title: String,
        content: String,
        click_action: Option<ClickAction>,
        reply: oneshot::Sender<Result<NotificationRecord>>,
    },
    Dismiss {
        notify_id: u32,
        reply: oneshot::Sender<Result<()>>,
    },
    CancelAll {
        reply: oneshot::Sender<Result<()>>,
    },
}

/// State owned by the dispatcher task
struct DispatchState {
    sink: Arc<dyn NotificationSink>,
    template: NotificationTemplate,
    next_id: u32,
    published_next_id: Arc<AtomicU32>,
}

impl DispatchState {
    async fn run(mut self, mut rx: mpsc::Receiver<DispatchCommand>) {
        debug!(sink = self.sink.name(), "Notification dispatcher started");

        while let Some(command) = rx.recv().await {
            match command {
                DispatchCommand::Send {
                    title,
                    content,
                    click_action,
                    reply,
                } => {
                    let result = self.send(title, content, click_action).await;
                    let _ = reply.send(result);
                }
                DispatchCommand::Dismiss { notify_id, reply } => {
                    let _ = reply.send(self.sink.cancel(notify_id).await);
                }
                DispatchCommand::CancelAll { reply } => {
                    let result = self.sink.cancel_all().await;
                    if result.is_ok() {
                        info!(sink = self.sink.name(), "All notifications cancelled");
                    }
                    let _ = reply.send(result);
                }
            }
        }

        debug!("Notification dispatcher stopped");
    }

    async fn send(
        &mut self,
        title: String,
        content: String,
        click_action: Option<ClickAction>,
    ) -> Result<NotificationRecord> {
        self.template.title = title;
        self.template.content = content;
        self.template.when = OffsetDateTime::now_utc();

        let notify_id = self.next_id;
        let following = notify_id
            .checked_add(1)
            .ok_or_else(|| NotificationError::Internal("notification id space exhausted".into()))?;

        let record = self.template.build(notify_id, click_action);
        self.sink.post(&record).await.map_err(|e| match e {
            NotificationError::DeliveryFailed(_) => e,
            other => NotificationError::DeliveryFailed(other.to_string()),
        })?;

        self.next_id = following;
        self.published_next_id.store(following, Ordering::SeqCst);

        info!(
            notify_id,
            sink = self.sink.name(),
            interactive = record.is_interactive(),
            "Notification posted"
        );
        Ok(record)
    }
}

/// Handle to the dispatcher task
#[derive(Clone)]
pub struct NotificationDispatcher {
    tx: mpsc::Sender<DispatchCommand>,
    resolver: LinkResolver,
    next_id: Arc<AtomicU32>,
    auto_cancel: bool,
}

impl NotificationDispatcher {
    /// Start the dispatcher task on the current tokio runtime.
    ///
    /// The task stops once every handle has been dropped.
    pub fn spawn(
        sink: Arc<dyn NotificationSink>,
        resolver: LinkResolver,
        config: &DispatcherConfig,
    ) -> Self {
        let (tx, rx) = mpsc::channel(config.queue_capacity.max(1));
        let next_id = Arc::new(AtomicU32::new(config.base_id));

        let state = DispatchState {
            sink,
            template: NotificationTemplate::new(config),
            next_id: config.base_id,
            published_next_id: next_id.clone(),
        };
        tokio::spawn(state.run(rx));

        Self {
            tx,
            resolver,
            next_id,
            auto_cancel: config.auto_cancel,
        }
    }

    /// Post a notification whose click opens `target`, or a non-interactive
    /// one when there is no target.
    pub async fn send(
        &self,
        title: &str,
        content: &str,
        target: Option<LaunchableTarget>,
    ) -> Result<NotificationRecord> {
        self.send_action(title, content, target.map(ClickAction::Launch))
            .await
    }

    /// Post a notification whose link is resolved only when it is clicked.
    pub async fn send_broadcast(
        &self,
        title: &str,
        content: &str,
        link: &str,
    ) -> Result<NotificationRecord> {
        let action = ClickAction::Broadcast {
            action: NOTIFICATION_HANDLE_ACTION.to_string(),
            link: link.to_string(),
        };
        self.send_action(title, content, Some(action)).await
    }

    pub async fn send_action(
        &self,
        title: &str,
        content: &str,
        click_action: Option<ClickAction>,
    ) -> Result<NotificationRecord> {
        let (reply, rx) = oneshot::channel();
        self.tx
            .send(DispatchCommand::Send {
                title: title.to_string(),
                content: content.to_string(),
                click_action,
                reply,
            })
            .await
            .map_err(|_| NotificationError::DispatcherClosed)?;
        rx.await.map_err(|_| NotificationError::DispatcherClosed)?
    }

    /// Remove every live notification. The id counter keeps counting.
    pub async fn cancel_all(&self) -> Result<()> {
        let (reply, rx) = oneshot::channel();
        self.tx
            .send(DispatchCommand::CancelAll { reply })
            .await
            .map_err(|_| NotificationError::DispatcherClosed)?;
        rx.await.map_err(|_| NotificationError::DispatcherClosed)?
    }

    /// Route a click on notification `notify_id`.
    ///
    /// The clicked entry is dismissed first when auto-cancel is on; a failed
    /// dismissal is logged and does not stop navigation.
    pub async fn handle_click(
        &self,
        notify_id: u32,
        action: &ClickAction,
    ) -> Result<LaunchableTarget> {
        if self.auto_cancel
            && let Err(e) = self.dismiss(notify_id).await
        {
            warn!(notify_id, error = %e, "Failed to dismiss clicked notification");
        }

        match action {
            ClickAction::Launch(target) => Ok(target.clone()),
            ClickAction::Broadcast { action, link } if action == NOTIFICATION_HANDLE_ACTION => {
                debug!(notify_id, link = %link, "Notification link clicked");
                self.resolver.open(link)
            }
            ClickAction::Broadcast { action, .. } => Err(NotificationError::malformed(format!(
                "unknown click action {action:?}"
            ))),
        }
    }

    /// Id the next successful send will receive
    pub fn next_notify_id(&self) -> u32 {
        self.next_id.load(Ordering::SeqCst)
    }

    pub fn resolver(&self) -> &LinkResolver {
        &self.resolver
    }

    async fn dismiss(&self, notify_id: u32) -> Result<()> {
        let (reply, rx) = oneshot::channel();
        self.tx
            .send(DispatchCommand::Dismiss { notify_id, reply })
            .await
            .map_err(|_| NotificationError::DispatcherClosed)?;
        rx.await.map_err(|_| NotificationError::DispatcherClosed)?
    }
}
