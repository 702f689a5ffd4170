//! Recommendation controller library
//!
//! This crate provides the reconcile loop for recommendation resources:
//! - Scheduling decisions for one-shot and periodical recommendations
//! - Status and condition reconciliation with write suppression
//! - Recommender construction over pluggable predictors
//! - A resync driver, health checks and observability

pub mod clock;
pub mod condition;
pub mod config_set;
pub mod controller;
pub mod driver;
pub mod events;
pub mod health;
pub mod models;
pub mod observability;
pub mod predictor;
pub mod provider;
pub mod recommender;
pub mod scheduling;
pub mod status;
pub mod store;

pub use controller::{
    Controller, ControllerBuilder, Persistence, ReconcileError, ReconcilePhase, Reconciled,
    Requeue,
};
pub use health::{
    ComponentHealth, ComponentStatus, HealthRegistry, HealthResponse, ReadinessResponse,
};
pub use models::*;
pub use observability::{ControllerMetrics, StructuredLogger};
pub use scheduling::{decide, Decision, ERROR_FALLBACK_PERIOD, RESYNC_PERIOD};
pub use status::{reconcile_status, RecommendOutcome, StatusUpdate};
