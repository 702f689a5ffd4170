//! Recommender construction and invocation
//!
//! A recommender is built per reconcile from the recommendation plus the
//! ambient context (predictor registry, metrics provider, scale client and
//! config set), then asked to offer a proposal.

mod hpa;
mod resource;

pub use hpa::HpaRecommender;
pub use resource::ResourceRecommender;

use crate::config_set::ConfigSet;
use crate::models::{AlgorithmType, EffectiveHpa, Recommendation, RecommendationType, ResourceRequest};
use crate::predictor::{PredictorParams, PredictorRegistry};
use crate::provider::{MetricsProvider, ScaleClient};
use async_trait::async_trait;
use std::sync::Arc;
use thiserror::Error;

/// Errors raised while building or running a recommender
#[derive(Debug, Clone, Error, PartialEq)]
pub enum RecommendError {
    #[error("algorithm {0} is not registered")]
    UnsupportedAlgorithm(AlgorithmType),

    #[error("recommendation has no target workload")]
    MissingTarget,

    #[error("insufficient data: {have} samples, need {need}")]
    InsufficientData { have: usize, need: usize },

    #[error("invalid parameter {key}: {value}")]
    InvalidParam { key: String, value: String },

    #[error("metrics provider: {0}")]
    Provider(String),
}

/// Output of a successful offer, copied verbatim into status
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProposedResult {
    pub resource_request: Option<ResourceRequest>,
    pub effective_hpa: Option<EffectiveHpa>,
}

#[async_trait]
pub trait Recommender: Send + Sync {
    async fn offer(&self) -> Result<ProposedResult, RecommendError>;
}

/// Builds a recommender for one recommendation
#[async_trait]
pub trait RecommenderFactory: Send + Sync {
    async fn new_recommender(
        &self,
        recommendation: &Recommendation,
    ) -> Result<Box<dyn Recommender>, RecommendError>;
}

/// Read-only collaborators shared by every recommender
#[derive(Clone)]
pub struct RecommenderContext {
    pub predictors: PredictorRegistry,
    pub provider: Arc<dyn MetricsProvider>,
    pub scale_client: Arc<dyn ScaleClient>,
    pub config_set: ConfigSet,
}

/// Default factory dispatching on recommendation type and algorithm
#[derive(Clone)]
pub struct DefaultRecommenderFactory {
    context: RecommenderContext,
}

impl DefaultRecommenderFactory {
    pub fn new(context: RecommenderContext) -> Self {
        Self { context }
    }
}

#[async_trait]
impl RecommenderFactory for DefaultRecommenderFactory {
    async fn new_recommender(
        &self,
        recommendation: &Recommendation,
    ) -> Result<Box<dyn Recommender>, RecommendError> {
        let spec = &recommendation.spec;
        if spec.target_ref.name.trim().is_empty() {
            return Err(RecommendError::MissingTarget);
        }

        let algorithm = spec.algorithm.algorithm_type;
        let predictor = self
            .context
            .predictors
            .get(algorithm)
            .ok_or(RecommendError::UnsupportedAlgorithm(algorithm))?;

        // Config set supplies defaults, the recommendation's own params win.
        let mut params = PredictorParams::from_map(
            self.context
                .config_set
                .properties_for(&recommendation.metadata.namespace),
        );
        params.extend(&spec.algorithm.params);

        let namespace = recommendation.metadata.namespace.clone();
        let target = spec.target_ref.clone();

        match spec.recommendation_type {
            RecommendationType::Resource => Ok(Box::new(ResourceRecommender::new(
                namespace,
                target,
                predictor,
                params,
                self.context.provider.clone(),
            ))),
            RecommendationType::Hpa => {
                let replicas = self
                    .context
                    .scale_client
                    .replicas(&namespace, &target)
                    .await?;
                HpaRecommender::new(
                    namespace,
                    target,
                    replicas,
                    predictor,
                    params,
                    self.context.provider.clone(),
                )
                .map(|r| Box::new(r) as Box<dyn Recommender>)
            }
        }
    }
}
