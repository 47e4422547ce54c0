//! Read contract of the external subscriber storage.

pub mod error;

use async_trait::async_trait;

use crate::model::SubscriberId;
use crate::model::SubscriberRecord;
use crate::store::error::StoreError;

/// Source of subscriber snapshots. The engine never writes through it.
#[async_trait]
pub trait SubscriberStore: Send + Sync {
    /// Subscribers with an active subscription. May contain the same id more than once.
    async fn list_active_subscribers(&self) -> Result<Vec<SubscriberRecord>, StoreError>;

    async fn get_subscriber(
        &self,
        id: SubscriberId,
    ) -> Result<Option<SubscriberRecord>, StoreError>;
}
