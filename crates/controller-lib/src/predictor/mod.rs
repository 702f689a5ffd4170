//! Usage predictors
//!
//! Each algorithm turns a usage series into a single estimate. The registry
//! maps an [`AlgorithmType`] to its implementation so recommenders never
//! branch on the algorithm themselves.

mod params;
mod percentile;
mod stats;
mod trend;

pub use params::PredictorParams;
pub use percentile::PercentilePredictor;
pub use stats::{linear_regression_slope, percentile};
pub use trend::LinearTrendPredictor;

use crate::models::{AlgorithmType, UsageSample};
use crate::recommender::RecommendError;
use std::collections::HashMap;
use std::sync::Arc;

/// Minimum number of samples required before estimating
pub const MIN_SAMPLES: usize = 10;

/// Default headroom added on top of an estimate
pub const DEFAULT_MARGIN_FRACTION: f64 = 0.15;

/// Trait for prediction implementations
pub trait Predictor: Send + Sync {
    fn algorithm(&self) -> AlgorithmType;

    /// Estimate the value a workload should be provisioned for
    fn predict(
        &self,
        samples: &[UsageSample],
        params: &PredictorParams,
    ) -> Result<f64, RecommendError>;
}

/// Predictors keyed by algorithm type
#[derive(Clone, Default)]
pub struct PredictorRegistry {
    predictors: HashMap<AlgorithmType, Arc<dyn Predictor>>,
}

impl PredictorRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with every built-in algorithm
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        registry.register(Arc::new(PercentilePredictor));
        registry.register(Arc::new(LinearTrendPredictor));
        registry
    }

    pub fn register(&mut self, predictor: Arc<dyn Predictor>) {
        self.predictors.insert(predictor.algorithm(), predictor);
    }

    pub fn get(&self, algorithm: AlgorithmType) -> Option<Arc<dyn Predictor>> {
        self.predictors.get(&algorithm).cloned()
    }

    pub fn algorithms(&self) -> Vec<AlgorithmType> {
        self.predictors.keys().copied().collect()
    }
}

fn require_samples(samples: &[UsageSample], params: &PredictorParams) -> Result<(), RecommendError> {
    let need = params.get_usize("min-samples", MIN_SAMPLES)?;
    if samples.len() < need {
        return Err(RecommendError::InsufficientData {
            have: samples.len(),
            need,
        });
    }
    Ok(())
}

fn margin(params: &PredictorParams) -> Result<f64, RecommendError> {
    let margin = params.get_f64("margin-fraction", DEFAULT_MARGIN_FRACTION)?;
    if margin < 0.0 {
        return Err(RecommendError::InvalidParam {
            key: "margin-fraction".to_string(),
            value: margin.to_string(),
        });
    }
    Ok(margin)
}
