//! Outbound delivery of detected promotion changes.

pub mod dispatch;
pub mod error;

use async_trait::async_trait;

use crate::model::ChangeSet;
use crate::model::SubscriberId;
use crate::notifier::error::NotifyError;

pub use dispatch::DeliveryOutcome;
pub use dispatch::NotificationDispatcher;

/// Delivers a non-empty change set of one source to a subscriber.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn deliver(
        &self,
        subscriber_id: SubscriberId,
        source: &str,
        changes: &ChangeSet,
    ) -> Result<(), NotifyError>;
}
