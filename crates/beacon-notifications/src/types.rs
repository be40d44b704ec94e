use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

/// Prefix of every reminder job name in the scheduler backend.
pub const REMINDER_JOB_PREFIX: &str = "reminder-";

/// Unique backend job name for a reminder.
///
/// The name is the de-duplication key: the backend keeps at most one live job
/// per name, so one name per reminder means one timer per reminder.
pub fn job_name(reminder_id: u32) -> String {
    format!("{REMINDER_JOB_PREFIX}{reminder_id}")
}

/// Deep link for a router path, in the form the link resolver expects.
pub fn route_link(path: &str) -> String {
    format!("//route{path}")
}

/// One logical recurring reminder.
///
/// `reminder_id` is stable across cycles, `fire_at_epoch_millis` changes every
/// cycle. Values are never mutated in place; each cycle gets a fresh request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReminderRequest {
    pub reminder_id: u32,
    pub title: String,
    pub content: String,
    /// Router path, e.g. `/app/second`
    pub link: String,
    pub fire_at_epoch_millis: i64,
}

impl ReminderRequest {
    pub fn new(
        reminder_id: u32,
        title: impl Into<String>,
        content: impl Into<String>,
        link: impl Into<String>,
        fire_at_epoch_millis: i64,
    ) -> Self {
        Self {
            reminder_id,
            title: title.into(),
            content: content.into(),
            link: link.into(),
            fire_at_epoch_millis,
        }
    }

    /// Same reminder, next cycle.
    pub fn next_cycle(&self, fire_at_epoch_millis: i64) -> Self {
        Self {
            fire_at_epoch_millis,
            ..self.clone()
        }
    }

    pub fn job_name(&self) -> String {
        job_name(self.reminder_id)
    }

    /// Deep link handed to the link resolver when the reminder fires.
    pub fn route_link(&self) -> String {
        route_link(&self.link)
    }
}

/// Kind of a routed destination
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DestinationKind {
    /// A navigable screen; the only kind a notification can launch
    Screen,
    /// A non-visual provider registered in the same route table
    Service,
}

/// Router's answer for a path
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DestinationRef {
    pub name: String,
    pub kind: DestinationKind,
}

impl DestinationRef {
    pub fn screen(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind: DestinationKind::Screen,
        }
    }

    pub fn service(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind: DestinationKind::Service,
        }
    }

    pub fn is_launchable(&self) -> bool {
        self.kind == DestinationKind::Screen
    }
}

/// "Go to destination X with parameters P".
///
/// Produced fresh per dispatch and owned by the record that embeds it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LaunchableTarget {
    pub destination: DestinationRef,
    pub params: IndexMap<String, String>,
    pub request_code: i32,
}

/// What happens when the user clicks a notification
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ClickAction {
    /// Target resolved when the notification was built
    Launch(LaunchableTarget),
    /// Link carried verbatim and resolved only when clicked
    Broadcast { action: String, link: String },
}

/// One delivered notification
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NotificationRecord {
    pub notify_id: u32,
    pub channel_id: String,
    pub title: String,
    pub content: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub click_action: Option<ClickAction>,
    #[serde(with = "time::serde::rfc3339")]
    pub posted_at: OffsetDateTime,
    pub small_icon: String,
    /// Dismissed by the sink when clicked
    pub auto_cancel: bool,
}

impl NotificationRecord {
    pub fn is_interactive(&self) -> bool {
        self.click_action.is_some()
    }
}

/// Observable lifecycle of one reminder
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "lowercase")]
pub enum ReminderState {
    Unscheduled,
    Pending { fire_at_epoch_millis: i64 },
    Firing,
}

impl std::fmt::Display for ReminderState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ReminderState::Unscheduled => write!(f, "unscheduled"),
            ReminderState::Pending { .. } => write!(f, "pending"),
            ReminderState::Firing => write!(f, "firing"),
        }
    }
}
