//! Notification delivery policy shared by all workers.

use std::sync::Arc;
use std::time::Duration;

use governor::Quota;
use governor::RateLimiter;
use governor::clock::QuantaClock;
use governor::state::InMemoryState;
use governor::state::direct::NotKeyed;
use log::error;
use log::info;
use log::warn;
use tokio::time::sleep;

use crate::model::ChangeSet;
use crate::model::SubscriberId;
use crate::notifier::Notifier;
use crate::notifier::error::NotifyError;

/// What happened to one notification.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DeliveryOutcome {
    Delivered,
    /// The subscriber cannot receive notifications anymore.
    Unreachable,
    /// Delivery failed and the notification was given up.
    Dropped,
}

/// Wraps a [`Notifier`] with outbound pacing and the rate-limit retry.
///
/// A `RateLimited` failure is retried exactly once after the delay the
/// channel asked for. Every other failure is logged and swallowed.
pub struct NotificationDispatcher {
    notifier: Arc<dyn Notifier>,
    limiter: Option<RateLimiter<NotKeyed, InMemoryState, QuantaClock>>,
}

impl NotificationDispatcher {
    /// `notify_interval` is the minimum spacing between deliveries; zero disables pacing.
    pub fn new(notifier: Arc<dyn Notifier>, notify_interval: Duration) -> Self {
        let limiter = Quota::with_period(notify_interval).map(RateLimiter::direct);
        Self { notifier, limiter }
    }

    pub async fn dispatch(
        &self,
        subscriber_id: SubscriberId,
        source: &str,
        changes: &ChangeSet,
    ) -> DeliveryOutcome {
        if let Some(limiter) = &self.limiter {
            limiter.until_ready().await;
        }

        match self.notifier.deliver(subscriber_id, source, changes).await {
            Ok(()) => {
                info!(
                    "Sent {} notification to subscriber {} ({} new, {} ended, {} changed).",
                    source,
                    subscriber_id,
                    changes.new.len(),
                    changes.ended.len(),
                    changes.changed.len()
                );
                DeliveryOutcome::Delivered
            }
            Err(NotifyError::RateLimited { retry_after }) => {
                warn!(
                    "Outbound channel rate limited for subscriber {}, retrying in {:?}.",
                    subscriber_id, retry_after
                );
                sleep(retry_after).await;
                self.retry_once(subscriber_id, source, changes).await
            }
            Err(e) => Self::classify_failure(subscriber_id, e),
        }
    }

    async fn retry_once(
        &self,
        subscriber_id: SubscriberId,
        source: &str,
        changes: &ChangeSet,
    ) -> DeliveryOutcome {
        match self.notifier.deliver(subscriber_id, source, changes).await {
            Ok(()) => {
                info!(
                    "Sent {} notification to subscriber {} after retry.",
                    source, subscriber_id
                );
                DeliveryOutcome::Delivered
            }
            Err(e) => Self::classify_failure(subscriber_id, e),
        }
    }

    fn classify_failure(subscriber_id: SubscriberId, err: NotifyError) -> DeliveryOutcome {
        match err {
            NotifyError::RecipientUnreachable { reason } => {
                warn!("Subscriber {} is unreachable: {}", subscriber_id, reason);
                DeliveryOutcome::Unreachable
            }
            e => {
                error!(
                    "Failed to send notification to subscriber {}: {}",
                    subscriber_id, e
                );
                DeliveryOutcome::Dropped
            }
        }
    }
}
