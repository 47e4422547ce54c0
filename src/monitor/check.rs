//! A single check of one subscriber against one source.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use log::debug;

use crate::model::ChangeSet;
use crate::model::Promotion;
use crate::model::SubscriberId;
use crate::model::SubscriberRecord;
use crate::monitor::cache::LastCheckTimes;
use crate::monitor::cache::SnapshotCache;
use crate::monitor::diff::diff;
use crate::monitor::error::MonitorError;
use crate::queue::SourceQueue;
use crate::source::SourceClient;

/// A source client paired with the queue holding its rate budget.
#[derive(Clone)]
pub struct SourceBinding {
    pub name: String,
    pub client: Arc<dyn SourceClient>,
    pub queue: Arc<SourceQueue>,
}

#[derive(Clone, Debug, PartialEq)]
pub enum CheckOutcome {
    /// The cadence has not elapsed yet.
    Skipped { remaining: Duration },
    /// The subscriber has no credentials for the source.
    NoCredentials,
    Checked(ChangeSet),
}

/// Fetches, filters, caches and diffs promotions.
///
/// Shared by the workers and by forced checks, so both update the same
/// snapshot cache.
pub struct PromotionChecker {
    cache: Arc<SnapshotCache>,
    last_checks: Arc<LastCheckTimes>,
    default_check_interval: Duration,
}

impl PromotionChecker {
    pub fn new(
        cache: Arc<SnapshotCache>,
        last_checks: Arc<LastCheckTimes>,
        default_check_interval: Duration,
    ) -> Self {
        Self {
            cache,
            last_checks,
            default_check_interval,
        }
    }

    /// Runs a check. Priority checks ignore the cadence.
    ///
    /// The cache entry is replaced with the fetched list whether or not it
    /// changed. The last-check timestamp is left to the caller.
    pub async fn check(
        &self,
        binding: &SourceBinding,
        subscriber: &SubscriberRecord,
        priority: bool,
    ) -> Result<CheckOutcome, MonitorError> {
        if !priority {
            let interval = subscriber.check_interval(self.default_check_interval);
            if let Some(remaining) = self.last_checks.cooldown_remaining(
                subscriber.id,
                &binding.name,
                interval,
                Utc::now(),
            ) {
                return Ok(CheckOutcome::Skipped { remaining });
            }
        }

        let Some(credentials) = subscriber.credentials_for(&binding.name) else {
            return Ok(CheckOutcome::NoCredentials);
        };

        let client = &binding.client;
        let mut promotions = binding
            .queue
            .execute(move || client.list_current_promotions(credentials))
            .await?;
        promotions.retain(Promotion::is_active);

        debug!(
            "Fetched {} active {} promotions for subscriber {}.",
            promotions.len(),
            binding.name,
            subscriber.id
        );

        let previous = self
            .cache
            .replace(subscriber.id, &binding.name, promotions.clone());
        Ok(CheckOutcome::Checked(diff(&previous, &promotions)))
    }

    pub fn record_check(&self, subscriber_id: SubscriberId, source: &str) {
        self.last_checks.stamp(subscriber_id, source, Utc::now());
    }

    /// Drops all cached state of `subscriber_id` across sources.
    pub fn forget_subscriber(&self, subscriber_id: SubscriberId) {
        self.cache.remove_subscriber(subscriber_id);
        self.last_checks.remove_subscriber(subscriber_id);
    }
}
