//! Per-source consumer of check requests.

use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;

use futures::FutureExt;
use log::debug;
use log::error;
use log::info;
use log::warn;
use tokio::sync::mpsc::UnboundedReceiver;
use tokio::time::sleep;
use tokio_util::sync::CancellationToken;

use crate::model::CheckRequest;
use crate::monitor::check::CheckOutcome;
use crate::monitor::check::PromotionChecker;
use crate::monitor::check::SourceBinding;
use crate::monitor::error::MonitorError;
use crate::notifier::DeliveryOutcome;
use crate::notifier::NotificationDispatcher;
use crate::store::SubscriberStore;

/// Result of handling one [`CheckRequest`].
#[derive(Clone, Debug, PartialEq)]
pub enum CheckStatus {
    /// The subscriber is no longer in the store.
    SubscriberMissing,
    NoCredentials,
    Skipped { remaining: Duration },
    Unchanged,
    Notified(DeliveryOutcome),
}

pub struct Worker {
    binding: SourceBinding,
    store: Arc<dyn SubscriberStore>,
    checker: Arc<PromotionChecker>,
    dispatcher: Arc<NotificationDispatcher>,
    error_delay: Duration,
}

impl Worker {
    pub fn new(
        binding: SourceBinding,
        store: Arc<dyn SubscriberStore>,
        checker: Arc<PromotionChecker>,
        dispatcher: Arc<NotificationDispatcher>,
        error_delay: Duration,
    ) -> Self {
        Self {
            binding,
            store,
            checker,
            dispatcher,
            error_delay,
        }
    }

    pub fn source(&self) -> &str {
        &self.binding.name
    }

    /// Services one request end to end.
    pub async fn handle(&self, request: CheckRequest) -> Result<CheckStatus, MonitorError> {
        let source = self.binding.name.as_str();
        let id = request.subscriber_id;

        // Credentials or cadence may have changed since the request was queued.
        let Some(subscriber) = self.store.get_subscriber(id).await? else {
            debug!("Subscriber {} is gone, dropping {} check.", id, source);
            return Ok(CheckStatus::SubscriberMissing);
        };

        let changes = match self
            .checker
            .check(&self.binding, &subscriber, request.priority)
            .await?
        {
            CheckOutcome::Skipped { remaining } => {
                debug!(
                    "Skipping {} check for subscriber {}, due in {:?}.",
                    source, id, remaining
                );
                return Ok(CheckStatus::Skipped { remaining });
            }
            CheckOutcome::NoCredentials => {
                debug!("Subscriber {} has no {} credentials.", id, source);
                return Ok(CheckStatus::NoCredentials);
            }
            CheckOutcome::Checked(changes) => changes,
        };

        let status = if changes.is_empty() {
            debug!("No {} changes for subscriber {}.", source, id);
            CheckStatus::Unchanged
        } else {
            info!(
                "Found {} {} changes for subscriber {}.",
                changes.len(),
                source,
                id
            );
            match self.dispatcher.dispatch(id, source, &changes).await {
                DeliveryOutcome::Unreachable => {
                    info!("Clearing cached state of unreachable subscriber {}.", id);
                    self.checker.forget_subscriber(id);
                    return Ok(CheckStatus::Notified(DeliveryOutcome::Unreachable));
                }
                outcome => CheckStatus::Notified(outcome),
            }
        };

        if !request.priority {
            self.checker.record_check(id, source);
        }
        Ok(status)
    }

    /// Consumes requests until `token` is cancelled or every sender is gone.
    pub async fn run(self, mut requests: UnboundedReceiver<CheckRequest>, token: CancellationToken) {
        info!("Starting {} worker.", self.source());
        loop {
            let request = tokio::select! {
                biased;
                _ = token.cancelled() => break,
                request = requests.recv() => match request {
                    Some(request) => request,
                    None => break,
                },
            };

            // A panicking source client or notifier must not take the worker down.
            let result = tokio::select! {
                biased;
                _ = token.cancelled() => break,
                result = AssertUnwindSafe(self.handle(request)).catch_unwind() => result,
            };

            let failed = match result {
                Ok(Ok(_)) => false,
                Ok(Err(MonitorError::Source(e))) => {
                    warn!(
                        "Abandoning {} check for subscriber {}: {}",
                        self.source(),
                        request.subscriber_id,
                        e
                    );
                    false
                }
                Ok(Err(e)) => {
                    error!(
                        "{} worker failed on subscriber {}: {}",
                        self.source(),
                        request.subscriber_id,
                        e
                    );
                    true
                }
                Err(panic) => {
                    error!(
                        "{} check for subscriber {} panicked: {}",
                        self.source(),
                        request.subscriber_id,
                        panic_message(&*panic)
                    );
                    true
                }
            };

            if failed {
                tokio::select! {
                    biased;
                    _ = token.cancelled() => break,
                    _ = sleep(self.error_delay) => {}
                }
            }
        }
        info!("{} worker stopped.", self.source());
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    if let Some(message) = payload.downcast_ref::<&str>() {
        message
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message
    } else {
        "unknown panic"
    }
}
