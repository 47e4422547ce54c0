//! Rate-limited, retrying executor for calls to one source.

use std::future::Future;
use std::time::Duration;

use log::error;
use log::warn;
use tokio::time::sleep;

use crate::config::SourceLimits;
use crate::queue::rate_limiter::RateLimiter;
use crate::source::error::SourceError;

/// Runs source calls under the source's shared rate budget.
///
/// A failing call is retried after each delay of the backoff schedule, so
/// the schedule's length is the total number of attempts. Fatal errors are
/// returned after the first attempt. Every attempt waits for the limiter,
/// so retries are charged against the source's budget like first calls.
pub struct SourceQueue {
    name: String,
    limiter: RateLimiter,
    backoff: Vec<Duration>,
}

impl SourceQueue {
    pub fn new(name: impl Into<String>, limits: SourceLimits, backoff: Vec<Duration>) -> Self {
        Self {
            name: name.into(),
            limiter: RateLimiter::new(limits),
            backoff,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn limits(&self) -> SourceLimits {
        self.limiter.limits()
    }

    /// Maximum attempts per [`execute`](Self::execute) call.
    pub fn max_attempts(&self) -> usize {
        self.backoff.len().max(1)
    }

    pub async fn execute<F, Fut, T>(&self, mut operation: F) -> Result<T, SourceError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, SourceError>>,
    {
        let attempts = self.max_attempts();
        let mut attempt = 0;

        loop {
            self.limiter.acquire().await;
            attempt += 1;

            let err = match operation().await {
                Ok(value) => return Ok(value),
                Err(e) => e,
            };

            if !err.is_retryable() {
                error!("{} rejected the request: {}", self.name, err);
                return Err(err);
            }
            if attempt >= attempts {
                error!(
                    "All {} attempts failed for {}: {}",
                    attempts, self.name, err
                );
                return Err(err);
            }

            let delay = self.backoff[attempt - 1];
            warn!(
                "{} request failed (attempt {}/{}): {}. Retrying in {:?}...",
                self.name, attempt, attempts, err, delay
            );
            sleep(delay).await;
        }
    }
}
