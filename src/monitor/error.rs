use crate::queue::error::QueueError;
use crate::source::error::SourceError;
use crate::store::error::StoreError;

#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum MonitorError {
    #[error("Subscriber store error: {0}")]
    Store(#[from] StoreError),

    #[error("Source error: {0}")]
    Source(#[from] SourceError),

    #[error("Queue error: {0}")]
    Queue(#[from] QueueError),
}
