//! Observability infrastructure for the recommendation controller
//!
//! Provides:
//! - Prometheus metrics (reconcile latency, decisions, recommender failures, status writes)
//! - Structured JSON logging with tracing

use crate::models::ObjectKey;
use prometheus::{Histogram, HistogramOpts, IntCounter, IntCounterVec, Opts, Registry};
use std::sync::Arc;
use tracing::{error, info, warn};

/// Default histogram buckets for latency measurements (in seconds)
const LATENCY_BUCKETS: &[f64] = &[
    0.0005, 0.001, 0.0025, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0,
];

struct ControllerMetricsInner {
    reconcile_latency_seconds: Histogram,
    decisions: IntCounterVec,
    recommender_failures: IntCounterVec,
    status_updates: IntCounter,
    status_update_failures: IntCounter,
}

/// Controller metrics for Prometheus exposition
///
/// Cheap to clone; clones share the same underlying collectors.
#[derive(Clone)]
pub struct ControllerMetrics {
    inner: Arc<ControllerMetricsInner>,
}

impl ControllerMetrics {
    /// Create the collectors and register them with `registry`
    pub fn new(registry: &Registry) -> prometheus::Result<Self> {
        let reconcile_latency_seconds = Histogram::with_opts(
            HistogramOpts::new(
                "recommendation_controller_reconcile_latency_seconds",
                "Time spent in one reconcile pass",
            )
            .buckets(LATENCY_BUCKETS.to_vec()),
        )?;
        let decisions = IntCounterVec::new(
            Opts::new(
                "recommendation_controller_decisions_total",
                "Scheduling decisions by kind",
            ),
            &["decision"],
        )?;
        let recommender_failures = IntCounterVec::new(
            Opts::new(
                "recommendation_controller_recommender_failures_total",
                "Recommender failures by stage",
            ),
            &["stage"],
        )?;
        let status_updates = IntCounter::new(
            "recommendation_controller_status_updates_total",
            "Status writes persisted",
        )?;
        let status_update_failures = IntCounter::new(
            "recommendation_controller_status_update_failures_total",
            "Status writes rejected by the store",
        )?;

        registry.register(Box::new(reconcile_latency_seconds.clone()))?;
        registry.register(Box::new(decisions.clone()))?;
        registry.register(Box::new(recommender_failures.clone()))?;
        registry.register(Box::new(status_updates.clone()))?;
        registry.register(Box::new(status_update_failures.clone()))?;

        Ok(Self {
            inner: Arc::new(ControllerMetricsInner {
                reconcile_latency_seconds,
                decisions,
                recommender_failures,
                status_updates,
                status_update_failures,
            }),
        })
    }

    pub fn observe_reconcile_latency(&self, duration_secs: f64) {
        self.inner.reconcile_latency_seconds.observe(duration_secs);
    }

    pub fn inc_decision(&self, decision: &str) {
        self.inner.decisions.with_label_values(&[decision]).inc();
    }

    /// `stage` is `construction` or `offer`
    pub fn inc_recommender_failure(&self, stage: &str) {
        self.inner
            .recommender_failures
            .with_label_values(&[stage])
            .inc();
    }

    pub fn inc_status_updates(&self) {
        self.inner.status_updates.inc();
    }

    pub fn inc_status_update_failures(&self) {
        self.inner.status_update_failures.inc();
    }

    pub fn status_updates(&self) -> u64 {
        self.inner.status_updates.get()
    }

    pub fn decisions(&self, decision: &str) -> u64 {
        self.inner.decisions.with_label_values(&[decision]).get()
    }
}

/// Structured logger for controller events
///
/// Provides consistent JSON-formatted logging for recommendation outcomes,
/// status writes and lifecycle events.
#[derive(Clone)]
pub struct StructuredLogger {
    controller_name: String,
}

impl StructuredLogger {
    pub fn new(controller_name: impl Into<String>) -> Self {
        Self {
            controller_name: controller_name.into(),
        }
    }

    pub fn log_recommendation_ready(&self, key: &ObjectKey, algorithm: &str) {
        info!(
            event = "recommendation_ready",
            controller = %self.controller_name,
            namespace = %key.namespace,
            name = %key.name,
            algorithm = %algorithm,
            "Recommendation offered"
        );
    }

    /// `stage` is `construction` or `offer`
    pub fn log_recommendation_failed(&self, key: &ObjectKey, stage: &str, error: &str) {
        error!(
            event = "recommendation_failed",
            controller = %self.controller_name,
            namespace = %key.namespace,
            name = %key.name,
            stage = %stage,
            error = %error,
            "Recommendation failed"
        );
    }

    pub fn log_status_updated(&self, key: &ObjectKey, resource_version: u64, ready: bool) {
        info!(
            event = "status_updated",
            controller = %self.controller_name,
            namespace = %key.namespace,
            name = %key.name,
            resource_version = resource_version,
            ready = ready,
            "Update Recommendation status successful"
        );
    }

    pub fn log_status_update_failed(&self, key: &ObjectKey, error: &str) {
        warn!(
            event = "status_update_failed",
            controller = %self.controller_name,
            namespace = %key.namespace,
            name = %key.name,
            error = %error,
            "Failed to update status"
        );
    }

    pub fn log_startup(&self, version: &str, recommendations: usize) {
        info!(
            event = "controller_started",
            controller = %self.controller_name,
            version = %version,
            recommendations = recommendations,
            "Recommendation controller started"
        );
    }

    pub fn log_shutdown(&self, reason: &str) {
        info!(
            event = "controller_shutdown",
            controller = %self.controller_name,
            reason = %reason,
            "Recommendation controller shutting down"
        );
    }
}
