//! Usage history and scale lookups consumed by recommenders

use crate::models::{ResourceKind, TargetRef, UsageSample};
use crate::recommender::RecommendError;
use async_trait::async_trait;
use dashmap::DashMap;
use std::collections::BTreeMap;

/// Source of historic usage for workloads
#[async_trait]
pub trait MetricsProvider: Send + Sync {
    /// Container names belonging to the workload
    async fn containers(
        &self,
        namespace: &str,
        target: &TargetRef,
    ) -> Result<Vec<String>, RecommendError>;

    /// Usage history of a single container
    async fn container_usage(
        &self,
        namespace: &str,
        target: &TargetRef,
        container: &str,
        kind: ResourceKind,
    ) -> Result<Vec<UsageSample>, RecommendError>;

    /// Usage of the whole workload, summed across containers per timestamp
    async fn workload_usage(
        &self,
        namespace: &str,
        target: &TargetRef,
        kind: ResourceKind,
    ) -> Result<Vec<UsageSample>, RecommendError> {
        let mut totals: BTreeMap<i64, f64> = BTreeMap::new();
        for container in self.containers(namespace, target).await? {
            for sample in self
                .container_usage(namespace, target, &container, kind)
                .await?
            {
                *totals.entry(sample.timestamp).or_insert(0.0) += sample.value;
            }
        }
        Ok(totals
            .into_iter()
            .map(|(timestamp, value)| UsageSample { timestamp, value })
            .collect())
    }
}

/// Current replica count of a scalable workload
#[async_trait]
pub trait ScaleClient: Send + Sync {
    async fn replicas(&self, namespace: &str, target: &TargetRef) -> Result<u32, RecommendError>;
}

type SeriesKey = (String, String, String, ResourceKind);

/// In-memory usage history, keyed by namespace, workload, container and resource
#[derive(Debug, Default)]
pub struct StaticMetricsProvider {
    series: DashMap<SeriesKey, Vec<UsageSample>>,
}

impl StaticMetricsProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(
        &self,
        namespace: &str,
        workload: &str,
        container: &str,
        kind: ResourceKind,
        samples: Vec<UsageSample>,
    ) {
        self.series.insert(
            (
                namespace.to_string(),
                workload.to_string(),
                container.to_string(),
                kind,
            ),
            samples,
        );
    }
}

#[async_trait]
impl MetricsProvider for StaticMetricsProvider {
    async fn containers(
        &self,
        namespace: &str,
        target: &TargetRef,
    ) -> Result<Vec<String>, RecommendError> {
        let mut names: Vec<String> = self
            .series
            .iter()
            .filter(|entry| {
                let (ns, workload, _, _) = entry.key();
                ns == namespace && workload == &target.name
            })
            .map(|entry| entry.key().2.clone())
            .collect();
        names.sort();
        names.dedup();
        Ok(names)
    }

    async fn container_usage(
        &self,
        namespace: &str,
        target: &TargetRef,
        container: &str,
        kind: ResourceKind,
    ) -> Result<Vec<UsageSample>, RecommendError> {
        let key = (
            namespace.to_string(),
            target.name.clone(),
            container.to_string(),
            kind,
        );
        self.series
            .get(&key)
            .map(|s| s.value().clone())
            .ok_or_else(|| {
                RecommendError::Provider(format!(
                    "no {} usage for container {} of {}/{}",
                    kind.as_str(),
                    container,
                    namespace,
                    target.name
                ))
            })
    }
}

/// In-memory replica counts
#[derive(Debug, Default)]
pub struct StaticScaleClient {
    replicas: DashMap<(String, String), u32>,
}

impl StaticScaleClient {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_replicas(&self, namespace: &str, workload: &str, replicas: u32) {
        self.replicas
            .insert((namespace.to_string(), workload.to_string()), replicas);
    }
}

#[async_trait]
impl ScaleClient for StaticScaleClient {
    async fn replicas(&self, namespace: &str, target: &TargetRef) -> Result<u32, RecommendError> {
        self.replicas
            .get(&(namespace.to_string(), target.name.clone()))
            .map(|r| *r.value())
            .ok_or_else(|| {
                RecommendError::Provider(format!(
                    "no scale subresource for {} {}/{}",
                    target.kind, namespace, target.name
                ))
            })
    }
}
