/// How the retry policy treats a failed source call.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SourceErrorKind {
    /// Worth another attempt after a backoff delay.
    Retryable,
    /// Retrying cannot succeed until the subscriber fixes something.
    Fatal,
}

#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum SourceError {
    #[error("Invalid API credentials for {source_name}: {message}")]
    InvalidCredentials {
        source_name: String,
        message: String,
    },

    #[error("HTTP request failed: {0}")]
    RequestFailed(#[source] Box<dyn std::error::Error + Send + Sync>),

    #[error("Marketplace API error (status {status}): {message}")]
    ApiError { status: u16, message: String },

    #[error("Failed to parse API response: {0}")]
    JsonParseFailed(#[from] serde_json::Error),

    #[error("Transient failure: {message}")]
    Transient { message: String },
}

impl SourceError {
    pub fn kind(&self) -> SourceErrorKind {
        match self {
            SourceError::InvalidCredentials { .. } => SourceErrorKind::Fatal,
            _ => SourceErrorKind::Retryable,
        }
    }

    pub fn is_retryable(&self) -> bool {
        self.kind() == SourceErrorKind::Retryable
    }

    pub fn transient(message: impl Into<String>) -> Self {
        SourceError::Transient {
            message: message.into(),
        }
    }

    /// Maps an HTTP status reported by a source client onto the error taxonomy.
    pub fn from_status(source_name: &str, status: u16, message: impl Into<String>) -> Self {
        let message = message.into();
        match status {
            401 | 403 => SourceError::InvalidCredentials {
                source_name: source_name.to_string(),
                message,
            },
            _ => SourceError::ApiError { status, message },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classification() {
        assert_eq!(
            SourceError::from_status("ozon", 401, "bad key").kind(),
            SourceErrorKind::Fatal
        );
        assert_eq!(
            SourceError::from_status("ozon", 403, "forbidden").kind(),
            SourceErrorKind::Fatal
        );
        assert!(SourceError::from_status("ozon", 503, "unavailable").is_retryable());
        assert!(SourceError::transient("timeout").is_retryable());

        let parse_err = serde_json::from_str::<serde_json::Value>("{").unwrap_err();
        assert!(SourceError::from(parse_err).is_retryable());
    }
}
