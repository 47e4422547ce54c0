//! Data types shared by the monitoring engine and its collaborators.

use std::collections::BTreeMap;
use std::collections::HashMap;
use std::time::Duration;

use serde::Deserialize;
use serde::Deserializer;
use serde::Serialize;
use serde_json::Value;

use crate::source::Credentials;

/// Opaque identifier of a monitored subscriber.
pub type SubscriberId = i64;

/// Per-source change sets returned by a forced check.
pub type ChangesBySource = BTreeMap<String, ChangeSet>;

/// A campaign a subscriber's products are enrolled in.
///
/// Sources disagree on field names, so deserialization accepts both
/// `start_date`/`end_date` and `date_start`/`date_end`, `title` or `name`,
/// `product_count` or `products_count`, and numeric or string ids.
#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq)]
pub struct Promotion {
    #[serde(deserialize_with = "string_or_number")]
    pub id: String,
    #[serde(rename = "type", default)]
    pub kind: String,
    #[serde(default, alias = "name")]
    pub title: String,
    #[serde(default, alias = "products_count")]
    pub product_count: u64,
    #[serde(default, alias = "date_start")]
    pub start_date: Option<String>,
    #[serde(default, alias = "date_end")]
    pub end_date: Option<String>,
    /// Enrolled products as reported by the source, if it lists them.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub products: Vec<Value>,
}

impl Promotion {
    pub fn new(id: impl Into<String>, kind: impl Into<String>, product_count: u64) -> Self {
        Self {
            id: id.into(),
            kind: kind.into(),
            product_count,
            ..Default::default()
        }
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = title.into();
        self
    }

    pub fn with_dates(mut self, start: Option<&str>, end: Option<&str>) -> Self {
        self.start_date = start.map(str::to_string);
        self.end_date = end.map(str::to_string);
        self
    }

    /// A promotion without enrolled products is not active for the subscriber.
    pub fn is_active(&self) -> bool {
        self.product_count > 0
    }
}

fn string_or_number<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    match Value::deserialize(deserializer)? {
        Value::String(s) => Ok(s),
        Value::Number(n) => Ok(n.to_string()),
        other => Err(serde::de::Error::custom(format!(
            "expected a string or number id, got {other}"
        ))),
    }
}

/// Differences between two consecutive promotion snapshots.
#[derive(Serialize, Clone, Debug, Default, PartialEq)]
pub struct ChangeSet {
    pub new: Vec<Promotion>,
    pub ended: Vec<Promotion>,
    pub changed: Vec<Promotion>,
}

impl ChangeSet {
    pub fn is_empty(&self) -> bool {
        self.new.is_empty() && self.ended.is_empty() && self.changed.is_empty()
    }

    pub fn len(&self) -> usize {
        self.new.len() + self.ended.len() + self.changed.len()
    }
}

/// Snapshot of a subscriber as read from the external store.
#[derive(Serialize, Deserialize, Clone, Debug, Default)]
pub struct SubscriberRecord {
    pub id: SubscriberId,
    /// Credentials keyed by source name. A missing entry means the source is not configured.
    #[serde(default)]
    pub credentials: HashMap<String, Credentials>,
    /// Subscriber-chosen cadence in seconds.
    #[serde(default)]
    pub check_interval_secs: Option<u64>,
}

impl SubscriberRecord {
    pub fn new(id: SubscriberId) -> Self {
        Self {
            id,
            ..Default::default()
        }
    }

    pub fn with_credentials(mut self, source: impl Into<String>, credentials: Credentials) -> Self {
        self.credentials.insert(source.into(), credentials);
        self
    }

    pub fn with_check_interval(mut self, interval: Duration) -> Self {
        self.check_interval_secs = Some(interval.as_secs());
        self
    }

    pub fn credentials_for(&self, source: &str) -> Option<&Credentials> {
        self.credentials.get(source)
    }

    pub fn check_interval(&self, default: Duration) -> Duration {
        self.check_interval_secs
            .map(Duration::from_secs)
            .unwrap_or(default)
    }
}

/// Queue entry asking a worker to check one subscriber.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CheckRequest {
    pub subscriber_id: SubscriberId,
    /// Priority requests bypass the cadence check and never move the throttle timestamp.
    pub priority: bool,
}

impl CheckRequest {
    pub fn regular(subscriber_id: SubscriberId) -> Self {
        Self {
            subscriber_id,
            priority: false,
        }
    }

    pub fn priority(subscriber_id: SubscriberId) -> Self {
        Self {
            subscriber_id,
            priority: true,
        }
    }
}
