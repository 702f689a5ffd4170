//! Resync driver
//!
//! Invokes reconcile for every known recommendation on a baseline cadence and
//! honours requeue hints in between. A key is never reconciled twice in the
//! same tick, and every tick waits for its reconciles before the next one
//! starts, so passes for one recommendation are strictly ordered.

use crate::controller::{Controller, ReconcileError, Reconciled, Requeue};
use crate::health::{components, HealthRegistry};
use crate::models::ObjectKey;
use crate::scheduling::{ERROR_FALLBACK_PERIOD, RESYNC_PERIOD};
use crate::store::RecommendationStore;
use dashmap::DashMap;
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tokio::time::{interval, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

#[derive(Debug, Clone)]
pub struct DriverConfig {
    /// Re-invocation period when no requeue was requested (default: 60 seconds)
    pub resync_period: Duration,
    /// How often due keys are looked for (default: 1 second)
    pub poll_interval: Duration,
    /// Delay after a failed fetch (default: 5 seconds)
    pub error_fallback_period: Duration,
    /// Reconciles allowed to run at once across keys
    pub max_concurrent: usize,
}

impl Default for DriverConfig {
    fn default() -> Self {
        Self {
            resync_period: RESYNC_PERIOD,
            poll_interval: Duration::from_secs(1),
            error_fallback_period: ERROR_FALLBACK_PERIOD,
            max_concurrent: 4,
        }
    }
}

/// Counts for one driver tick
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TickStats {
    pub listed: usize,
    pub reconciled: usize,
    pub errors: usize,
}

pub struct ResyncDriver {
    controller: Arc<Controller>,
    store: Arc<dyn RecommendationStore>,
    health: HealthRegistry,
    config: DriverConfig,
    next_due: DashMap<ObjectKey, Instant>,
}

impl ResyncDriver {
    pub fn new(
        controller: Arc<Controller>,
        store: Arc<dyn RecommendationStore>,
        health: HealthRegistry,
        config: DriverConfig,
    ) -> Self {
        Self {
            controller,
            store,
            health,
            config,
            next_due: DashMap::new(),
        }
    }

    /// Run until `shutdown` is cancelled
    pub async fn run(self: Arc<Self>, shutdown: CancellationToken) {
        info!(
            resync_secs = self.config.resync_period.as_secs(),
            max_concurrent = self.config.max_concurrent,
            "Starting resync driver"
        );

        let mut ticker = interval(self.config.poll_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = shutdown.cancelled() => break,
                _ = ticker.tick() => {}
            }

            // An in-flight tick is dropped on shutdown, aborting its reconciles.
            tokio::select! {
                _ = shutdown.cancelled() => break,
                stats = self.run_once(&shutdown) => {
                    if stats.reconciled > 0 {
                        debug!(
                            listed = stats.listed,
                            reconciled = stats.reconciled,
                            errors = stats.errors,
                            "Driver tick"
                        );
                    }
                }
            }
        }

        info!("Shutting down resync driver");
    }

    /// Reconcile every key that is due now
    pub async fn run_once(&self, cancel: &CancellationToken) -> TickStats {
        let mut stats = TickStats::default();

        let keys = match self.store.list().await {
            Ok(keys) => keys,
            Err(e) => {
                warn!(error = %e, "Failed to list recommendations");
                self.health
                    .set_unhealthy(components::STORE, e.to_string())
                    .await;
                return stats;
            }
        };
        self.health.set_healthy(components::STORE).await;
        self.health.set_healthy(components::DRIVER).await;
        stats.listed = keys.len();

        let known: HashSet<&ObjectKey> = keys.iter().collect();
        self.next_due.retain(|key, _| known.contains(key));

        let now = Instant::now();
        let due: Vec<ObjectKey> = keys
            .iter()
            .filter(|key| self.next_due.get(*key).map(|at| *at <= now).unwrap_or(true))
            .cloned()
            .collect();

        let semaphore = Arc::new(Semaphore::new(self.config.max_concurrent.max(1)));
        let mut tasks = JoinSet::new();
        for key in due {
            if cancel.is_cancelled() {
                break;
            }
            let Ok(permit) = semaphore.clone().acquire_owned().await else {
                break;
            };
            let controller = self.controller.clone();
            let cancel = cancel.clone();
            tasks.spawn(async move {
                let _permit = permit;
                let result = controller.reconcile(&key, &cancel).await;
                (key, result)
            });
        }

        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((key, result)) => {
                    stats.reconciled += 1;
                    if result.is_err() {
                        stats.errors += 1;
                    }
                    self.record(key, result).await;
                }
                Err(e) => {
                    stats.errors += 1;
                    warn!(error = %e, "Reconcile task failed");
                }
            }
        }

        stats
    }

    async fn record(&self, key: ObjectKey, result: Result<Reconciled, ReconcileError>) {
        self.health.observe_reconcile(&result).await;

        let now = Instant::now();
        match result {
            Ok(reconciled) => {
                let delay = match reconciled.requeue {
                    Requeue::After(delay) => delay,
                    Requeue::None => self.config.resync_period,
                };
                self.next_due.insert(key, self.deadline(now, delay));
            }
            Err(ReconcileError::NotFound(_)) => {
                self.next_due.remove(&key);
            }
            Err(ReconcileError::Cancelled(_)) => {}
            Err(ReconcileError::Store(e)) => {
                warn!(
                    namespace = %key.namespace,
                    name = %key.name,
                    error = %e,
                    "Failed to fetch recommendation"
                );
                let due = self.deadline(now, self.config.error_fallback_period);
                self.next_due.insert(key, due);
            }
        }
    }

    /// `now + delay`, falling back to the resync period, then to `now`, when
    /// the instant is not representable
    fn deadline(&self, now: Instant, delay: Duration) -> Instant {
        now.checked_add(delay)
            .or_else(|| now.checked_add(self.config.resync_period))
            .unwrap_or(now)
    }

    /// When `key` is next reconciled, if it has been seen
    pub fn next_due(&self, key: &ObjectKey) -> Option<Instant> {
        self.next_due.get(key).map(|at| *at)
    }
}
