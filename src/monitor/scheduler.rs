//! Periodic producer of regular check requests.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use log::debug;
use log::error;
use log::info;
use log::warn;
use tokio::sync::mpsc::UnboundedSender;
use tokio::time::sleep;
use tokio_util::sync::CancellationToken;

use crate::model::CheckRequest;
use crate::monitor::cache::LastCheckTimes;
use crate::monitor::error::MonitorError;
use crate::store::SubscriberStore;

pub struct Scheduler {
    store: Arc<dyn SubscriberStore>,
    last_checks: Arc<LastCheckTimes>,
    queues: Vec<(String, UnboundedSender<CheckRequest>)>,
    interval: Duration,
    default_check_interval: Duration,
}

impl Scheduler {
    pub fn new(
        store: Arc<dyn SubscriberStore>,
        last_checks: Arc<LastCheckTimes>,
        queues: Vec<(String, UnboundedSender<CheckRequest>)>,
        interval: Duration,
        default_check_interval: Duration,
    ) -> Self {
        Self {
            store,
            last_checks,
            queues,
            interval,
            default_check_interval,
        }
    }

    /// Enqueues a regular request for every due (subscriber, source) pair.
    ///
    /// Returns how many requests were enqueued.
    pub async fn run_pass(&self) -> Result<usize, MonitorError> {
        let subscribers = self.store.list_active_subscribers().await?;
        let now = Utc::now();
        let mut seen = HashSet::new();
        let mut enqueued = 0;

        for subscriber in subscribers {
            if !seen.insert(subscriber.id) {
                continue;
            }
            let interval = subscriber.check_interval(self.default_check_interval);

            for (source, queue) in &self.queues {
                if subscriber.credentials_for(source).is_none() {
                    continue;
                }
                if let Some(remaining) =
                    self.last_checks
                        .cooldown_remaining(subscriber.id, source, interval, now)
                {
                    debug!(
                        "Subscriber {} is not due for {} yet ({:?} left).",
                        subscriber.id, source, remaining
                    );
                    continue;
                }
                if queue.send(CheckRequest::regular(subscriber.id)).is_err() {
                    warn!("{} worker is gone, cannot enqueue subscriber {}.", source, subscriber.id);
                    continue;
                }
                enqueued += 1;
            }
        }

        info!(
            "Scheduled {} checks for {} subscribers.",
            enqueued,
            seen.len()
        );
        Ok(enqueued)
    }

    pub async fn run(self, token: CancellationToken) {
        info!("Starting scheduler with interval {:?}.", self.interval);
        loop {
            let result = tokio::select! {
                biased;
                _ = token.cancelled() => break,
                result = self.run_pass() => result,
            };
            if let Err(e) = result {
                error!("Scheduling pass failed: {}", e);
            }

            tokio::select! {
                biased;
                _ = token.cancelled() => break,
                _ = sleep(self.interval) => {}
            }
        }
        info!("Scheduler stopped.");
    }
}
