//! Rolling-window rate limiter for one external source.

use std::collections::VecDeque;
use std::time::Duration;

use log::debug;
use tokio::sync::Mutex;
use tokio::time::Instant;
use tokio::time::sleep;

use crate::config::SourceLimits;

const WINDOW: Duration = Duration::from_secs(60);

/// Enforces two ceilings at once: at most `requests_per_minute` calls in
/// any rolling 60 second window, and at least `min_interval` between two
/// consecutive calls.
///
/// Callers are admitted one at a time in arrival order.
pub struct RateLimiter {
    limits: SourceLimits,
    state: Mutex<LimiterState>,
}

struct LimiterState {
    /// Admission instants of the most recent calls, oldest first.
    history: VecDeque<Instant>,
    last: Option<Instant>,
}

impl RateLimiter {
    pub fn new(limits: SourceLimits) -> Self {
        let capacity = limits.requests_per_minute.get() as usize;
        Self {
            limits,
            state: Mutex::new(LimiterState {
                history: VecDeque::with_capacity(capacity),
                last: None,
            }),
        }
    }

    pub fn limits(&self) -> SourceLimits {
        self.limits
    }

    /// Waits until the next call may be issued and records it.
    pub async fn acquire(&self) {
        let mut state = self.state.lock().await;
        let mut now = Instant::now();

        if let Some(last) = state.last {
            let since_last = now.saturating_duration_since(last);
            if since_last < self.limits.min_interval {
                sleep(self.limits.min_interval - since_last).await;
                now = Instant::now();
            }
        }

        let capacity = self.limits.requests_per_minute.get() as usize;
        if state.history.len() >= capacity {
            if let Some(&oldest) = state.history.front() {
                let age = now.saturating_duration_since(oldest);
                if age < WINDOW {
                    let wait = WINDOW - age;
                    debug!("Per-minute budget exhausted, waiting {:?}.", wait);
                    sleep(wait).await;
                    now = Instant::now();
                }
            }
            state.history.pop_front();
        }

        state.history.push_back(now);
        state.last = Some(now);
    }
}

#[cfg(test)]
mod tests {
    use std::num::NonZeroU32;
    use std::sync::Arc;

    use super::*;

    fn limiter(rpm: u32, min_interval_secs: u64) -> RateLimiter {
        RateLimiter::new(SourceLimits::new(
            NonZeroU32::new(rpm).unwrap(),
            Duration::from_secs(min_interval_secs),
        ))
    }

    async fn admission_offsets(limiter: &RateLimiter, calls: usize) -> Vec<Duration> {
        let start = Instant::now();
        let mut offsets = Vec::with_capacity(calls);
        for _ in 0..calls {
            limiter.acquire().await;
            offsets.push(start.elapsed());
        }
        offsets
    }

    #[tokio::test(start_paused = true)]
    async fn test_first_call_is_immediate() {
        let limiter = limiter(30, 2);
        let offsets = admission_offsets(&limiter, 1).await;
        assert_eq!(offsets[0], Duration::ZERO);
    }

    #[tokio::test(start_paused = true)]
    async fn test_min_interval_spacing() {
        let limiter = limiter(30, 2);
        let offsets = admission_offsets(&limiter, 5).await;

        for pair in offsets.windows(2) {
            assert!(pair[1] - pair[0] >= Duration::from_secs(2));
        }
        assert!(offsets[4] >= Duration::from_secs(8));
        assert!(offsets[4] < Duration::from_secs(9));
    }

    #[tokio::test(start_paused = true)]
    async fn test_per_minute_ceiling() {
        // 3 per minute, 2s apart: t = 0, 2, 4 then the 4th waits for the window.
        let limiter = limiter(3, 2);
        let offsets = admission_offsets(&limiter, 4).await;

        assert!(offsets[2] < Duration::from_secs(5));
        assert!(offsets[3] >= Duration::from_secs(60));
        assert!(offsets[3] < Duration::from_secs(61));
    }

    #[tokio::test(start_paused = true)]
    async fn test_no_window_ever_exceeds_budget() {
        let rpm = 3;
        let limiter = limiter(rpm, 1);
        let offsets = admission_offsets(&limiter, 10).await;

        // Any rpm + 1 consecutive admissions span at least a full window.
        for window in offsets.windows(rpm as usize + 1) {
            assert!(window[rpm as usize] - window[0] >= WINDOW);
        }
        // 10 calls at 3 per minute need three full windows.
        assert!(offsets[9] >= Duration::from_secs(180));
    }

    #[tokio::test(start_paused = true)]
    async fn test_concurrent_callers_share_budget() {
        let limiter = Arc::new(limiter(30, 2));
        let start = Instant::now();

        let handles: Vec<_> = (0..4)
            .map(|_| {
                let limiter = limiter.clone();
                tokio::spawn(async move {
                    limiter.acquire().await;
                    start.elapsed()
                })
            })
            .collect();

        let mut offsets = Vec::new();
        for handle in handles {
            offsets.push(handle.await.unwrap());
        }
        offsets.sort();

        assert!(offsets[3] >= Duration::from_secs(6));
        for pair in offsets.windows(2) {
            assert!(pair[1] - pair[0] >= Duration::from_secs(2));
        }
    }
}
