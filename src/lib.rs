//! promo-watch - Marketplace promotion monitoring engine.
//!
//! Polls external marketplace sources on behalf of subscribers, detects
//! new, ended and changed promotions, and hands the changes to a notifier:
//! - Per-source rate limiting and retry of outbound calls
//! - Cadence-aware scheduling with one worker per source
//! - Forced on-demand checks answered directly to the caller
//!
//! Concrete marketplace clients, the subscriber store and the notification
//! channel are supplied by the embedding application through the
//! [`source::SourceClient`], [`store::SubscriberStore`] and
//! [`notifier::Notifier`] traits.

pub mod config;
pub mod error;
pub mod logging;
pub mod model;
pub mod monitor;
pub mod notifier;
pub mod queue;
pub mod source;
pub mod store;
