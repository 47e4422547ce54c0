//! One [`SourceQueue`] per source, created on first use.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::PoisonError;
use std::time::Duration;

use log::info;

use crate::config::MonitorConfig;
use crate::config::SourceLimits;
use crate::queue::error::QueueError;
use crate::queue::source_queue::SourceQueue;

/// Hands out the single rate-budget tracker of each configured source.
///
/// Every caller asking for the same name gets the same queue, so calls
/// triggered by different subscribers share one budget.
pub struct QueueRegistry {
    limits: HashMap<String, SourceLimits>,
    backoff: Vec<Duration>,
    queues: Mutex<HashMap<String, Arc<SourceQueue>>>,
}

impl QueueRegistry {
    pub fn new(limits: HashMap<String, SourceLimits>, backoff: Vec<Duration>) -> Self {
        Self {
            limits,
            backoff,
            queues: Mutex::new(HashMap::new()),
        }
    }

    pub fn from_config(config: &MonitorConfig) -> Self {
        Self::new(config.sources.clone(), config.retry_backoff.clone())
    }

    /// Returns the queue of `source`, creating it on first request.
    pub fn get(&self, source: &str) -> Result<Arc<SourceQueue>, QueueError> {
        let mut queues = self.queues.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(queue) = queues.get(source) {
            return Ok(queue.clone());
        }

        let limits = self
            .limits
            .get(source)
            .copied()
            .ok_or_else(|| QueueError::UnknownSource {
                name: source.to_string(),
            })?;

        info!(
            "Creating request queue for {} ({} requests/min, {:?} min interval).",
            source, limits.requests_per_minute, limits.min_interval
        );
        let queue = Arc::new(SourceQueue::new(source, limits, self.backoff.clone()));
        queues.insert(source.to_string(), queue.clone());
        Ok(queue)
    }

    /// Number of queues created so far.
    pub fn len(&self) -> usize {
        self.queues
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
