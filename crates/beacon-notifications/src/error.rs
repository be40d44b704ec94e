use thiserror::Error;

#[derive(Debug, Error)]
pub enum NotificationError {
    #[error("No route found for path: {0}")]
    NoRouteFound(String),

    #[error("Malformed link: {0}")]
    MalformedLink(String),

    #[error("Delivery failed: {0}")]
    DeliveryFailed(String),

    #[error("Job submission failed: {0}")]
    JobSubmission(String),

    #[error("Notification dispatcher is closed")]
    DispatcherClosed,

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl NotificationError {
    pub fn malformed(msg: impl Into<String>) -> Self {
        Self::MalformedLink(msg.into())
    }

    pub fn delivery(msg: impl Into<String>) -> Self {
        Self::DeliveryFailed(msg.into())
    }

    pub fn submission(msg: impl Into<String>) -> Self {
        Self::JobSubmission(msg.into())
    }

    /// Routing failures degrade to "no click action" instead of failing the caller.
    pub fn is_routing(&self) -> bool {
        matches!(self, Self::NoRouteFound(_) | Self::MalformedLink(_))
    }
}

/// Result type for notification operations
pub type Result<T> = std::result::Result<T, NotificationError>;
