//! Status reconciliation
//!
//! Folds a recommender outcome into a copy of the current status and reports
//! whether anything changed. Only a changed status is stamped and persisted,
//! so repeated reconciles with the same outcome converge without writes.

use crate::condition::{self, reasons, ConditionStatus, CONDITION_READY};
use crate::models::RecommendationStatus;
use crate::recommender::{ProposedResult, RecommendError};
use chrono::{DateTime, Utc};

/// Result of one recommender attempt
#[derive(Debug, Clone, PartialEq)]
pub enum RecommendOutcome {
    Proposed(ProposedResult),
    ConstructionFailed(RecommendError),
    OfferFailed(RecommendError),
}

impl RecommendOutcome {
    pub fn error(&self) -> Option<&RecommendError> {
        match self {
            RecommendOutcome::Proposed(_) => None,
            RecommendOutcome::ConstructionFailed(e) | RecommendOutcome::OfferFailed(e) => Some(e),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct StatusUpdate {
    pub status: RecommendationStatus,
    pub changed: bool,
}

/// Compute the next status for `outcome` at `now`.
pub fn reconcile_status(
    current: &RecommendationStatus,
    outcome: &RecommendOutcome,
    now: DateTime<Utc>,
) -> StatusUpdate {
    let mut next = current.clone();

    let (status, reason, message) = match outcome {
        RecommendOutcome::Proposed(proposed) => {
            next.resource_request = proposed.resource_request.clone();
            next.effective_hpa = proposed.effective_hpa.clone();
            (
                ConditionStatus::True,
                reasons::RECOMMENDATION_READY,
                "Recommendation is ready".to_string(),
            )
        }
        RecommendOutcome::ConstructionFailed(err) => (
            ConditionStatus::False,
            reasons::FAILED_CREATE_RECOMMENDER,
            format!("Failed to create recommender: {}", err),
        ),
        RecommendOutcome::OfferFailed(err) => (
            ConditionStatus::False,
            reasons::FAILED_OFFER_RECOMMEND,
            format!("Failed to offer recommendation: {}", err),
        ),
    };

    next.conditions = condition::upsert(
        std::mem::take(&mut next.conditions),
        CONDITION_READY,
        status,
        reason,
        &message,
        now,
    );

    let changed = next != *current;
    if changed {
        next.last_update_time = Some(now);
        if is_ready(&next) {
            next.last_successful_time = next.last_update_time;
        }
    }

    StatusUpdate {
        status: next,
        changed,
    }
}

/// Whether the status carries a successful Ready condition
pub fn is_ready(status: &RecommendationStatus) -> bool {
    status.conditions.iter().any(|c| {
        c.is(
            CONDITION_READY,
            ConditionStatus::True,
            reasons::RECOMMENDATION_READY,
        )
    })
}
