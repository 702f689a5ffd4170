//! Status conditions
//!
//! Conditions are kept unique by type. Updating an existing type rewrites it
//! in place; a new type is appended. The transition time is always the
//! caller-supplied `now`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Condition type reporting whether the latest recommendation is usable
pub const CONDITION_READY: &str = "Ready";

/// Condition reasons written by the controller
pub mod reasons {
    pub const RECOMMENDATION_READY: &str = "RecommendationReady";
    pub const FAILED_CREATE_RECOMMENDER: &str = "FailedCreateRecommender";
    pub const FAILED_OFFER_RECOMMEND: &str = "FailedOfferRecommend";
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConditionStatus {
    True,
    False,
    Unknown,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Condition {
    #[serde(rename = "type")]
    pub condition_type: String,
    pub status: ConditionStatus,
    pub reason: String,
    pub message: String,
    pub last_transition_time: DateTime<Utc>,
}

impl Condition {
    pub fn is(&self, condition_type: &str, status: ConditionStatus, reason: &str) -> bool {
        self.condition_type == condition_type && self.status == status && self.reason == reason
    }
}

/// Insert or overwrite the condition of `condition_type`.
pub fn upsert(
    mut conditions: Vec<Condition>,
    condition_type: &str,
    status: ConditionStatus,
    reason: &str,
    message: &str,
    now: DateTime<Utc>,
) -> Vec<Condition> {
    match conditions
        .iter_mut()
        .find(|c| c.condition_type == condition_type)
    {
        Some(existing) => {
            existing.status = status;
            existing.reason = reason.to_string();
            existing.message = message.to_string();
            existing.last_transition_time = now;
        }
        None => conditions.push(Condition {
            condition_type: condition_type.to_string(),
            status,
            reason: reason.to_string(),
            message: message.to_string(),
            last_transition_time: now,
        }),
    }
    conditions
}

pub fn find<'a>(conditions: &'a [Condition], condition_type: &str) -> Option<&'a Condition> {
    conditions.iter().find(|c| c.condition_type == condition_type)
}
