//! Core data models for the recommendation controller

use crate::condition::Condition;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Timeout applied to a recommendation attempt when the spec leaves it unset
pub const DEFAULT_TIMEOUT_SECONDS: u64 = 600;

/// Namespace + name identity of a recommendation
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ObjectKey {
    pub namespace: String,
    pub name: String,
}

impl ObjectKey {
    pub fn new(namespace: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            name: name.into(),
        }
    }
}

impl fmt::Display for ObjectKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.namespace, self.name)
    }
}

/// Object metadata owned by the store
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObjectMeta {
    pub namespace: String,
    pub name: String,
    pub creation_timestamp: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deletion_timestamp: Option<DateTime<Utc>>,
    /// Bumped by the store on every successful update
    #[serde(default)]
    pub resource_version: u64,
}

/// When a recommendation is considered complete
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum CompletionStrategy {
    /// A single successful run, then never again
    Once,
    /// Run again every `period_seconds` after the last success
    Periodical { period_seconds: u64 },
}

/// Kind of proposal a recommendation asks for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RecommendationType {
    Resource,
    Hpa,
}

/// Prediction algorithm used by the recommender
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum AlgorithmType {
    Percentile,
    LinearTrend,
}

impl AlgorithmType {
    pub fn as_str(&self) -> &'static str {
        match self {
            AlgorithmType::Percentile => "percentile",
            AlgorithmType::LinearTrend => "linear-trend",
        }
    }
}

impl fmt::Display for AlgorithmType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Algorithm selection plus per-recommendation parameter overrides
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Algorithm {
    #[serde(rename = "type")]
    pub algorithm_type: AlgorithmType,
    #[serde(default)]
    pub params: BTreeMap<String, String>,
}

/// Workload the recommendation is computed for
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TargetRef {
    pub kind: String,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecommendationSpec {
    pub target_ref: TargetRef,
    #[serde(rename = "type")]
    pub recommendation_type: RecommendationType,
    pub algorithm: Algorithm,
    pub completion_strategy: CompletionStrategy,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout_seconds: Option<u64>,
}

impl RecommendationSpec {
    pub fn timeout_seconds(&self) -> u64 {
        self.timeout_seconds.unwrap_or(DEFAULT_TIMEOUT_SECONDS)
    }
}

/// Per-container request recommendation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContainerRecommendation {
    pub container_name: String,
    pub cpu_millicores: u32,
    pub memory_bytes: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceRequest {
    pub containers: Vec<ContainerRecommendation>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EffectiveHpa {
    pub min_replicas: u32,
    pub max_replicas: u32,
    pub target_cpu_utilization: u32,
}

/// Observed state written by the controller
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecommendationStatus {
    #[serde(default)]
    pub conditions: Vec<Condition>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_successful_time: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_update_time: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resource_request: Option<ResourceRequest>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub effective_hpa: Option<EffectiveHpa>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Recommendation {
    pub metadata: ObjectMeta,
    pub spec: RecommendationSpec,
    #[serde(default)]
    pub status: RecommendationStatus,
}

impl Recommendation {
    pub fn key(&self) -> ObjectKey {
        ObjectKey::new(&self.metadata.namespace, &self.metadata.name)
    }

    pub fn is_deleting(&self) -> bool {
        self.metadata.deletion_timestamp.is_some()
    }
}

/// One usage observation for a container or workload
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct UsageSample {
    pub timestamp: i64,
    pub value: f64,
}

/// Resource dimension a usage series measures
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResourceKind {
    /// CPU in millicores
    Cpu,
    /// Memory working set in bytes
    Memory,
}

impl ResourceKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ResourceKind::Cpu => "cpu",
            ResourceKind::Memory => "memory",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_timeout_defaults_to_600_seconds() {
        let spec: RecommendationSpec = serde_json::from_value(serde_json::json!({
            "target_ref": {"kind": "Deployment", "name": "web"},
            "type": "resource",
            "algorithm": {"type": "percentile"},
            "completion_strategy": {"type": "once"}
        }))
        .unwrap();

        assert_eq!(spec.timeout_seconds, None);
        assert_eq!(spec.timeout_seconds(), DEFAULT_TIMEOUT_SECONDS);
    }

    #[test]
    fn test_periodical_strategy_deserializes() {
        let strategy: CompletionStrategy =
            serde_json::from_str(r#"{"type":"periodical","period_seconds":300}"#).unwrap();
        assert_eq!(
            strategy,
            CompletionStrategy::Periodical { period_seconds: 300 }
        );
    }

    #[test]
    fn test_object_key_display() {
        assert_eq!(ObjectKey::new("default", "web").to_string(), "default/web");
    }
}
