#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum StoreError {
    #[error("Subscriber store backend failed: {0}")]
    BackendError(#[source] Box<dyn std::error::Error + Send + Sync>),

    #[error("Unexpected result: {message}")]
    UnexpectedResult { message: String },
}
