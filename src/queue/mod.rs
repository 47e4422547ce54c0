//! Per-source rate limiting and retry of outbound source calls.

pub mod error;
pub mod rate_limiter;
pub mod registry;
pub mod source_queue;

pub use rate_limiter::RateLimiter;
pub use registry::QueueRegistry;
pub use source_queue::SourceQueue;
