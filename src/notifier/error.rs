use std::time::Duration;

#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum NotifyError {
    /// The subscriber blocked the outbound channel or no longer exists on it.
    #[error("Recipient is unreachable: {reason}")]
    RecipientUnreachable { reason: String },

    #[error("Outbound channel is rate limited, retry after {retry_after:?}")]
    RateLimited { retry_after: Duration },

    #[error("Notification delivery failed: {0}")]
    Failed(#[source] Box<dyn std::error::Error + Send + Sync>),
}

impl NotifyError {
    pub fn unreachable(reason: impl Into<String>) -> Self {
        NotifyError::RecipientUnreachable {
            reason: reason.into(),
        }
    }

    pub fn failed(message: impl Into<String>) -> Self {
        let message: String = message.into();
        NotifyError::Failed(message.into())
    }
}
