//! Horizontal autoscaling recommendations
//!
//! Sizes replica bounds from the workload's total CPU usage: the predicted
//! peak sets the upper bound, the predicted floor sets the lower bound, both
//! at the configured target utilization of one replica's CPU request.

use super::{ProposedResult, RecommendError, Recommender};
use crate::models::{EffectiveHpa, ResourceKind, TargetRef};
use crate::predictor::{PercentilePredictor, Predictor, PredictorParams};
use crate::provider::MetricsProvider;
use async_trait::async_trait;
use std::sync::Arc;

const DEFAULT_TARGET_UTILIZATION: f64 = 50.0;
const DEFAULT_REPLICA_CPU_MILLICORES: f64 = 1000.0;
const DEFAULT_MIN_PERCENTILE: f64 = 10.0;

pub struct HpaRecommender {
    namespace: String,
    target: TargetRef,
    current_replicas: u32,
    predictor: Arc<dyn Predictor>,
    params: PredictorParams,
    provider: Arc<dyn MetricsProvider>,
    target_utilization: f64,
    replica_cpu_millicores: f64,
}

impl HpaRecommender {
    pub fn new(
        namespace: String,
        target: TargetRef,
        current_replicas: u32,
        predictor: Arc<dyn Predictor>,
        params: PredictorParams,
        provider: Arc<dyn MetricsProvider>,
    ) -> Result<Self, RecommendError> {
        let target_utilization =
            params.get_f64("target-utilization", DEFAULT_TARGET_UTILIZATION)?;
        if !(target_utilization > 0.0 && target_utilization <= 100.0) {
            return Err(RecommendError::InvalidParam {
                key: "target-utilization".to_string(),
                value: target_utilization.to_string(),
            });
        }
        let replica_cpu_millicores =
            params.get_f64("replica-cpu-millicores", DEFAULT_REPLICA_CPU_MILLICORES)?;
        if replica_cpu_millicores <= 0.0 {
            return Err(RecommendError::InvalidParam {
                key: "replica-cpu-millicores".to_string(),
                value: replica_cpu_millicores.to_string(),
            });
        }

        Ok(Self {
            namespace,
            target,
            current_replicas,
            predictor,
            params,
            provider,
            target_utilization,
            replica_cpu_millicores,
        })
    }

    fn replicas_for(&self, cpu_millicores: f64) -> u32 {
        let per_replica = self.replica_cpu_millicores * self.target_utilization / 100.0;
        ((cpu_millicores / per_replica).ceil() as u32).max(1)
    }
}

#[async_trait]
impl Recommender for HpaRecommender {
    async fn offer(&self) -> Result<ProposedResult, RecommendError> {
        let samples = self
            .provider
            .workload_usage(&self.namespace, &self.target, ResourceKind::Cpu)
            .await?;

        let cpu_params = self.params.for_resource(ResourceKind::Cpu);
        let peak = self.predictor.predict(&samples, &cpu_params)?;

        let floor_params = cpu_params.with_override(
            "percentile",
            cpu_params
                .get_f64("min-percentile", DEFAULT_MIN_PERCENTILE)?
                .to_string(),
        );
        let floor = PercentilePredictor.predict(&samples, &floor_params)?;

        let min_replicas = self.replicas_for(floor).min(self.current_replicas.max(1));
        let max_replicas = self.replicas_for(peak).max(min_replicas);

        Ok(ProposedResult {
            resource_request: None,
            effective_hpa: Some(EffectiveHpa {
                min_replicas,
                max_replicas,
                target_cpu_utilization: self.target_utilization.round() as u32,
            }),
        })
    }
}
