//! Shared per-(subscriber, source) state of the monitor.

use std::collections::HashMap;
use std::sync::PoisonError;
use std::sync::RwLock;
use std::time::Duration;

use chrono::DateTime;
use chrono::Utc;

use crate::model::Promotion;
use crate::model::SubscriberId;

type Key = (SubscriberId, String);

fn key(subscriber_id: SubscriberId, source: &str) -> Key {
    (subscriber_id, source.to_string())
}

/// Last promotion list seen per (subscriber, source). Not persisted.
#[derive(Default)]
pub struct SnapshotCache {
    entries: RwLock<HashMap<Key, Vec<Promotion>>>,
}

impl SnapshotCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// The cached snapshot, or an empty list if none was recorded yet.
    pub fn get(&self, subscriber_id: SubscriberId, source: &str) -> Vec<Promotion> {
        self.entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&key(subscriber_id, source))
            .cloned()
            .unwrap_or_default()
    }

    /// Stores `promotions` and returns the snapshot it replaced.
    pub fn replace(
        &self,
        subscriber_id: SubscriberId,
        source: &str,
        promotions: Vec<Promotion>,
    ) -> Vec<Promotion> {
        self.entries
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(key(subscriber_id, source), promotions)
            .unwrap_or_default()
    }

    /// Drops the snapshots of `subscriber_id` for every source.
    pub fn remove_subscriber(&self, subscriber_id: SubscriberId) {
        self.entries
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .retain(|(id, _), _| *id != subscriber_id);
    }

    pub fn len(&self) -> usize {
        self.entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// When each (subscriber, source) was last checked by a regular check.
#[derive(Default)]
pub struct LastCheckTimes {
    entries: RwLock<HashMap<Key, DateTime<Utc>>>,
}

impl LastCheckTimes {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, subscriber_id: SubscriberId, source: &str) -> Option<DateTime<Utc>> {
        self.entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&key(subscriber_id, source))
            .copied()
    }

    pub fn stamp(&self, subscriber_id: SubscriberId, source: &str, at: DateTime<Utc>) {
        self.entries
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(key(subscriber_id, source), at);
    }

    pub fn remove_subscriber(&self, subscriber_id: SubscriberId) {
        self.entries
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .retain(|(id, _), _| *id != subscriber_id);
    }

    /// Time left before (subscriber, source) is due again, `None` if it is due now.
    pub fn cooldown_remaining(
        &self,
        subscriber_id: SubscriberId,
        source: &str,
        interval: Duration,
        now: DateTime<Utc>,
    ) -> Option<Duration> {
        let last = self.get(subscriber_id, source)?;
        // a timestamp in the future counts as just checked
        let elapsed = (now - last).to_std().unwrap_or(Duration::ZERO);
        interval.checked_sub(elapsed).filter(|left| !left.is_zero())
    }

    pub fn len(&self) -> usize {
        self.entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
