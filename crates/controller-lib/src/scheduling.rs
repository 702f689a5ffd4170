//! Scheduling decisions
//!
//! Decides from spec, status and the supplied instant whether a recommendation
//! should run now, be revisited later, or be left alone.

use crate::models::{CompletionStrategy, RecommendationSpec, RecommendationStatus};
use chrono::{DateTime, Utc};
use std::time::Duration;

/// Baseline re-invocation period
pub const RESYNC_PERIOD: Duration = Duration::from_secs(60);

/// Requeue delay after a failed recommender construction or offer
pub const ERROR_FALLBACK_PERIOD: Duration = Duration::from_secs(5);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    /// Compute a recommendation now
    Run,
    /// Do nothing now, ask to be invoked again after the delay
    ResyncAfter(Duration),
    /// Nothing to do
    Skip,
}

impl Decision {
    pub fn as_str(&self) -> &'static str {
        match self {
            Decision::Run => "run",
            Decision::ResyncAfter(_) => "resync",
            Decision::Skip => "skip",
        }
    }
}

/// Decide what to do with a recommendation at `now`.
///
/// `Once` recommendations run until the first success, or until
/// `created_at + timeout` has passed. `Periodical` recommendations run on
/// every call while `now <= last_success + period + timeout`; past that
/// deadline the cycle is given up and a resync after [`RESYNC_PERIOD`] is
/// requested instead of running.
///
/// Within the period the engine does not check whether the next cycle is
/// actually due; throttling is left to the caller's invocation cadence.
pub fn decide(
    spec: &RecommendationSpec,
    status: &RecommendationStatus,
    created_at: DateTime<Utc>,
    now: DateTime<Utc>,
) -> Decision {
    let timeout = spec.timeout_seconds();

    match spec.completion_strategy {
        CompletionStrategy::Once => {
            if status.last_successful_time.is_some() {
                return Decision::Skip;
            }
            if is_past(created_at, timeout, now) {
                return Decision::Skip;
            }
            Decision::Run
        }
        CompletionStrategy::Periodical { period_seconds } => {
            let Some(last_success) = status.last_successful_time else {
                return Decision::Run;
            };
            if is_past(last_success, period_seconds.saturating_add(timeout), now) {
                return Decision::ResyncAfter(RESYNC_PERIOD);
            }
            Decision::Run
        }
    }
}

/// `now > anchor + secs`; a deadline beyond the representable range is never reached
fn is_past(anchor: DateTime<Utc>, secs: u64, now: DateTime<Utc>) -> bool {
    i64::try_from(secs)
        .ok()
        .and_then(chrono::Duration::try_seconds)
        .and_then(|offset| anchor.checked_add_signed(offset))
        .map(|deadline| now > deadline)
        .unwrap_or(false)
}
