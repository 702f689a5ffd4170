//! Event recording
//!
//! Events are fire-and-forget: emitting never fails and never blocks the
//! reconcile that produced it.

use crate::models::ObjectKey;
use std::sync::Mutex;
use tracing::{info, warn};

/// Event reasons emitted by the controller
///
/// The offer-failure reason differs from the `Ready` condition's in
/// [`crate::condition::reasons`]: `FailedOfferRecommendation` here,
/// `FailedOfferRecommend` on the condition.
pub mod reasons {
    pub const FAILED_CREATE_RECOMMENDER: &str = "FailedCreateRecommender";
    pub const FAILED_OFFER_RECOMMENDATION: &str = "FailedOfferRecommendation";
    pub const FAILED_UPDATE_STATUS: &str = "FailedUpdateStatus";
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventType {
    Normal,
    Warning,
}

impl EventType {
    pub fn as_str(&self) -> &'static str {
        match self {
            EventType::Normal => "Normal",
            EventType::Warning => "Warning",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Event {
    pub key: ObjectKey,
    pub event_type: EventType,
    pub reason: String,
    pub message: String,
}

pub trait EventRecorder: Send + Sync {
    fn emit(&self, key: &ObjectKey, event_type: EventType, reason: &str, message: &str);
}

/// Records events as structured log lines
#[derive(Debug, Clone, Default)]
pub struct TracingEventRecorder;

impl EventRecorder for TracingEventRecorder {
    fn emit(&self, key: &ObjectKey, event_type: EventType, reason: &str, message: &str) {
        match event_type {
            EventType::Normal => info!(
                event = "recommendation_event",
                namespace = %key.namespace,
                name = %key.name,
                event_type = event_type.as_str(),
                reason = %reason,
                message = %message,
                "Event recorded"
            ),
            EventType::Warning => warn!(
                event = "recommendation_event",
                namespace = %key.namespace,
                name = %key.name,
                event_type = event_type.as_str(),
                reason = %reason,
                message = %message,
                "Event recorded"
            ),
        }
    }
}

/// Keeps events in memory for inspection
#[derive(Debug, Default)]
pub struct MemoryEventRecorder {
    events: Mutex<Vec<Event>>,
}

impl MemoryEventRecorder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<Event> {
        self.events
            .lock()
            .map(|events| events.clone())
            .unwrap_or_default()
    }

    pub fn reasons(&self) -> Vec<String> {
        self.events().into_iter().map(|e| e.reason).collect()
    }
}

impl EventRecorder for MemoryEventRecorder {
    fn emit(&self, key: &ObjectKey, event_type: EventType, reason: &str, message: &str) {
        if let Ok(mut events) = self.events.lock() {
            events.push(Event {
                key: key.clone(),
                event_type,
                reason: reason.to_string(),
                message: message.to_string(),
            });
        }
    }
}
