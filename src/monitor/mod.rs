//! The promotion monitoring engine.
//!
//! A [`Scheduler`] task periodically enqueues regular checks for every due
//! (subscriber, source) pair, and one [`Worker`] task per source consumes
//! them under that source's rate budget. [`PromotionMonitor`] owns both and
//! also serves forced checks directly.

pub mod cache;
pub mod check;
pub mod diff;
pub mod error;
pub mod scheduler;
pub mod worker;

use std::sync::Arc;
use std::sync::Mutex;
use std::sync::PoisonError;

use futures::future::join_all;
use log::error;
use log::info;
use log::warn;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::Instrument;
use tracing::info_span;

use crate::config::MonitorConfig;
use crate::model::ChangeSet;
use crate::model::ChangesBySource;
use crate::model::SubscriberId;
use crate::notifier::NotificationDispatcher;
use crate::notifier::Notifier;
use crate::queue::QueueRegistry;
use crate::source::Sources;
use crate::store::SubscriberStore;

pub use cache::LastCheckTimes;
pub use cache::SnapshotCache;
pub use check::CheckOutcome;
pub use check::PromotionChecker;
pub use check::SourceBinding;
pub use diff::diff;
pub use error::MonitorError;
pub use scheduler::Scheduler;
pub use worker::CheckStatus;
pub use worker::Worker;

struct RunningTasks {
    token: CancellationToken,
    handles: Vec<JoinHandle<()>>,
}

pub struct PromotionMonitor {
    config: MonitorConfig,
    store: Arc<dyn SubscriberStore>,
    bindings: Vec<SourceBinding>,
    cache: Arc<SnapshotCache>,
    last_checks: Arc<LastCheckTimes>,
    checker: Arc<PromotionChecker>,
    dispatcher: Arc<NotificationDispatcher>,
    running: Mutex<Option<RunningTasks>>,
}

impl PromotionMonitor {
    /// Binds every registered source to its queue.
    ///
    /// Fails if a source has no configured rate limits.
    pub fn new(
        config: MonitorConfig,
        store: Arc<dyn SubscriberStore>,
        sources: &Sources,
        queues: &QueueRegistry,
        notifier: Arc<dyn Notifier>,
    ) -> Result<Self, MonitorError> {
        let bindings = sources
            .iter()
            .map(|(name, client)| {
                Ok::<_, MonitorError>(SourceBinding {
                    name: name.to_string(),
                    client: client.clone(),
                    queue: queues.get(name)?,
                })
            })
            .collect::<Result<Vec<_>, MonitorError>>()?;

        let cache = Arc::new(SnapshotCache::new());
        let last_checks = Arc::new(LastCheckTimes::new());
        let checker = Arc::new(PromotionChecker::new(
            cache.clone(),
            last_checks.clone(),
            config.default_check_interval,
        ));
        let dispatcher = Arc::new(NotificationDispatcher::new(notifier, config.notify_interval));

        info!(
            "Initializing PromotionMonitor for sources: {}",
            bindings
                .iter()
                .map(|b| b.name.as_str())
                .collect::<Vec<_>>()
                .join(", ")
        );

        Ok(Self {
            config,
            store,
            bindings,
            cache,
            last_checks,
            checker,
            dispatcher,
            running: Mutex::new(None),
        })
    }

    /// Spawns one worker per source and the scheduler. No-op while running.
    ///
    /// Must be called from within a tokio runtime.
    pub fn start(&self) {
        let mut running = self.running.lock().unwrap_or_else(PoisonError::into_inner);
        if running.is_some() {
            warn!("PromotionMonitor is already running.");
            return;
        }

        info!("Starting PromotionMonitor.");
        let token = CancellationToken::new();
        let mut handles = Vec::with_capacity(self.bindings.len() + 1);
        let mut senders = Vec::with_capacity(self.bindings.len());

        for binding in &self.bindings {
            let (tx, rx) = mpsc::unbounded_channel();
            senders.push((binding.name.clone(), tx));

            let span = info_span!("worker", source = %binding.name);
            let worker = Worker::new(
                binding.clone(),
                self.store.clone(),
                self.checker.clone(),
                self.dispatcher.clone(),
                self.config.worker_error_delay,
            );
            handles.push(tokio::spawn(
                worker.run(rx, token.clone()).instrument(span),
            ));
        }

        let scheduler = Scheduler::new(
            self.store.clone(),
            self.last_checks.clone(),
            senders,
            self.config.scheduler_interval,
            self.config.default_check_interval,
        );
        handles.push(tokio::spawn(
            scheduler
                .run(token.clone())
                .instrument(info_span!("scheduler")),
        ));

        *running = Some(RunningTasks { token, handles });
    }

    /// Cancels every task and waits for them to finish. No-op while stopped.
    pub async fn stop(&self) {
        let tasks = self
            .running
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        let Some(tasks) = tasks else {
            return;
        };

        info!("Stopping PromotionMonitor.");
        tasks.token.cancel();
        for result in join_all(tasks.handles).await {
            if let Err(e) = result {
                error!("Monitor task ended abnormally: {}", e);
            }
        }
        info!("PromotionMonitor stopped.");
    }

    pub fn is_running(&self) -> bool {
        self.running
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .is_some()
    }

    /// Checks every source the subscriber has credentials for, right now.
    ///
    /// The changes are returned rather than notified. The cadence is
    /// neither consulted nor advanced. A source that fails contributes an
    /// empty change set, and an unknown subscriber gets an empty result.
    pub async fn force_check(
        &self,
        subscriber_id: SubscriberId,
    ) -> Result<ChangesBySource, MonitorError> {
        let Some(subscriber) = self.store.get_subscriber(subscriber_id).await? else {
            warn!("Forced check for unknown subscriber {}.", subscriber_id);
            return Ok(ChangesBySource::new());
        };

        let subscriber = &subscriber;
        let checks = self
            .bindings
            .iter()
            .filter(|binding| subscriber.credentials_for(&binding.name).is_some())
            .map(|binding| async move {
                let changes = match self.checker.check(binding, subscriber, true).await {
                    Ok(CheckOutcome::Checked(changes)) => changes,
                    Ok(_) => ChangeSet::default(),
                    Err(e) => {
                        warn!(
                            "Forced {} check failed for subscriber {}: {}",
                            binding.name, subscriber_id, e
                        );
                        ChangeSet::default()
                    }
                };
                (binding.name.clone(), changes)
            });

        Ok(join_all(checks).await.into_iter().collect())
    }

    pub fn sources(&self) -> impl Iterator<Item = &str> {
        self.bindings.iter().map(|b| b.name.as_str())
    }

    pub fn cache(&self) -> &SnapshotCache {
        &self.cache
    }

    pub fn last_checks(&self) -> &LastCheckTimes {
        &self.last_checks
    }
}
