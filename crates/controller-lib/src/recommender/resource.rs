//! Per-container resource request recommendations

use super::{ProposedResult, RecommendError, Recommender};
use crate::models::{ContainerRecommendation, ResourceKind, ResourceRequest, TargetRef};
use crate::predictor::{Predictor, PredictorParams};
use crate::provider::MetricsProvider;
use async_trait::async_trait;
use std::sync::Arc;
use tracing::debug;

/// Smallest CPU request ever proposed (10m)
pub const MIN_CPU_MILLICORES: u32 = 10;

/// Smallest memory request ever proposed (64MiB)
pub const MIN_MEMORY_BYTES: u64 = 64 * 1024 * 1024;

pub struct ResourceRecommender {
    namespace: String,
    target: TargetRef,
    predictor: Arc<dyn Predictor>,
    params: PredictorParams,
    provider: Arc<dyn MetricsProvider>,
}

impl ResourceRecommender {
    pub fn new(
        namespace: String,
        target: TargetRef,
        predictor: Arc<dyn Predictor>,
        params: PredictorParams,
        provider: Arc<dyn MetricsProvider>,
    ) -> Self {
        Self {
            namespace,
            target,
            predictor,
            params,
            provider,
        }
    }

    async fn estimate(&self, container: &str, kind: ResourceKind) -> Result<f64, RecommendError> {
        let samples = self
            .provider
            .container_usage(&self.namespace, &self.target, container, kind)
            .await?;
        self.predictor
            .predict(&samples, &self.params.for_resource(kind))
    }
}

#[async_trait]
impl Recommender for ResourceRecommender {
    async fn offer(&self) -> Result<ProposedResult, RecommendError> {
        let containers = self
            .provider
            .containers(&self.namespace, &self.target)
            .await?;
        if containers.is_empty() {
            return Err(RecommendError::Provider(format!(
                "no containers found for {} {}",
                self.target.kind, self.target.name
            )));
        }

        let mut recommendations = Vec::with_capacity(containers.len());
        for container in containers {
            let cpu = self.estimate(&container, ResourceKind::Cpu).await?;
            let memory = self.estimate(&container, ResourceKind::Memory).await?;

            debug!(
                workload = %self.target.name,
                container = %container,
                algorithm = %self.predictor.algorithm(),
                cpu_millicores = cpu,
                memory_bytes = memory,
                "Container estimate"
            );

            recommendations.push(ContainerRecommendation {
                container_name: container,
                cpu_millicores: (cpu.ceil() as u32).max(MIN_CPU_MILLICORES),
                memory_bytes: (memory.ceil() as u64).max(MIN_MEMORY_BYTES),
            });
        }

        Ok(ProposedResult {
            resource_request: Some(ResourceRequest {
                containers: recommendations,
            }),
            effective_hpa: None,
        })
    }
}
