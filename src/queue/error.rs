#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum QueueError {
    #[error("Unsupported source `{name}`: no rate limits configured.")]
    UnknownSource { name: String },
}
