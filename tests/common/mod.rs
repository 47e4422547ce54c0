//! Shared mocks for the integration tests.

#![allow(dead_code)]

use std::collections::HashMap;
use std::num::NonZeroU32;
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::RwLock;
use std::sync::atomic::AtomicUsize;
use std::sync::atomic::Ordering;
use std::time::Duration;

use async_trait::async_trait;
use promo_watch::config::MonitorConfig;
use promo_watch::config::SourceLimits;
use promo_watch::model::ChangeSet;
use promo_watch::model::Promotion;
use promo_watch::model::SubscriberId;
use promo_watch::model::SubscriberRecord;
use promo_watch::notifier::Notifier;
use promo_watch::notifier::error::NotifyError;
use promo_watch::source::Credentials;
use promo_watch::source::SourceClient;
use promo_watch::source::error::SourceError;
use promo_watch::store::SubscriberStore;
use promo_watch::store::error::StoreError;

/// Engine settings without pacing so tests only wait for what they assert on.
pub fn test_config() -> MonitorConfig {
    let limits = SourceLimits::new(NonZeroU32::new(30).unwrap(), Duration::ZERO);
    MonitorConfig {
        notify_interval: Duration::ZERO,
        retry_backoff: vec![Duration::from_secs(1); 3],
        sources: HashMap::from([
            ("ozon".to_string(), limits),
            ("wildberries".to_string(), limits),
        ]),
        ..Default::default()
    }
}

pub fn subscriber(id: SubscriberId, sources: &[&str]) -> SubscriberRecord {
    sources.iter().fold(SubscriberRecord::new(id), |record, source| {
        record.with_credentials(*source, Credentials::new(format!("key-{id}")))
    })
}

/// Polls `condition` on the paused clock until it holds.
pub async fn wait_until(condition: impl Fn() -> bool) -> bool {
    for _ in 0..200 {
        if condition() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(50)).await;
    }
    condition()
}

// MOCK SOURCE

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SourceFailure {
    Transient,
    InvalidCredentials,
}

#[derive(Default)]
pub struct MockSourceState {
    pub promotions: Vec<Promotion>,
    pub failure: Option<SourceFailure>,
    /// Requests made with this api key panic.
    pub panic_for_key: Option<String>,
}

/// Source returning a configurable promotion list.
#[derive(Default)]
pub struct MockSource {
    pub state: RwLock<MockSourceState>,
    calls: AtomicUsize,
}

impl MockSource {
    pub fn new(promotions: Vec<Promotion>) -> Arc<Self> {
        let source = Self::default();
        source.set_promotions(promotions);
        Arc::new(source)
    }

    pub fn set_promotions(&self, promotions: Vec<Promotion>) {
        self.state.write().unwrap().promotions = promotions;
    }

    pub fn set_failure(&self, failure: Option<SourceFailure>) {
        self.state.write().unwrap().failure = failure;
    }

    pub fn set_panic_for_key(&self, api_key: Option<&str>) {
        self.state.write().unwrap().panic_for_key = api_key.map(str::to_string);
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SourceClient for MockSource {
    async fn list_current_promotions(
        &self,
        credentials: &Credentials,
    ) -> Result<Vec<Promotion>, SourceError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let (result, panics) = {
            let state = self.state.read().unwrap();
            let result = match state.failure {
                Some(SourceFailure::Transient) => {
                    Err(SourceError::transient("503 Service Unavailable"))
                }
                Some(SourceFailure::InvalidCredentials) => {
                    Err(SourceError::from_status("mock", 401, "Invalid API key"))
                }
                None => Ok(state.promotions.clone()),
            };
            (result, state.panic_for_key.as_deref() == Some(credentials.api_key.as_str()))
        };
        if panics {
            panic!("malformed response for {}", credentials.api_key);
        }
        result
    }
}

// MEMORY STORE

/// In-memory subscriber store. Records are returned as inserted, duplicates included.
#[derive(Default)]
pub struct MemoryStore {
    records: RwLock<Vec<SubscriberRecord>>,
}

impl MemoryStore {
    pub fn new(records: Vec<SubscriberRecord>) -> Arc<Self> {
        Arc::new(Self {
            records: RwLock::new(records),
        })
    }

    pub fn insert(&self, record: SubscriberRecord) {
        self.records.write().unwrap().push(record);
    }

    pub fn remove(&self, id: SubscriberId) {
        self.records.write().unwrap().retain(|r| r.id != id);
    }
}

#[async_trait]
impl SubscriberStore for MemoryStore {
    async fn list_active_subscribers(&self) -> Result<Vec<SubscriberRecord>, StoreError> {
        Ok(self.records.read().unwrap().clone())
    }

    async fn get_subscriber(
        &self,
        id: SubscriberId,
    ) -> Result<Option<SubscriberRecord>, StoreError> {
        Ok(self
            .records
            .read()
            .unwrap()
            .iter()
            .find(|r| r.id == id)
            .cloned())
    }
}

// RECORDING NOTIFIER

#[derive(Clone, Debug)]
pub struct Delivery {
    pub subscriber_id: SubscriberId,
    pub source: String,
    pub changes: ChangeSet,
}

/// Notifier that records deliveries, or fails them as unreachable when told to.
#[derive(Default)]
pub struct RecordingNotifier {
    deliveries: Mutex<Vec<Delivery>>,
    unreachable: RwLock<bool>,
}

impl RecordingNotifier {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn set_unreachable(&self, unreachable: bool) {
        *self.unreachable.write().unwrap() = unreachable;
    }

    pub fn deliveries(&self) -> Vec<Delivery> {
        self.deliveries.lock().unwrap().clone()
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn deliver(
        &self,
        subscriber_id: SubscriberId,
        source: &str,
        changes: &ChangeSet,
    ) -> Result<(), NotifyError> {
        if *self.unreachable.read().unwrap() {
            return Err(NotifyError::unreachable("chat not found"));
        }
        self.deliveries.lock().unwrap().push(Delivery {
            subscriber_id,
            source: source.to_string(),
            changes: changes.clone(),
        });
        Ok(())
    }
}
