//! Linear trend predictor
//!
//! Projects the latest sample forward along the least-squares slope of the
//! window, so steadily growing workloads get headroom for the next horizon.

use super::{linear_regression_slope, margin, require_samples, Predictor, PredictorParams};
use crate::models::{AlgorithmType, UsageSample};
use crate::recommender::RecommendError;

/// Number of sample intervals to project forward
pub const DEFAULT_HORIZON: usize = 12;

#[derive(Debug, Clone, Copy, Default)]
pub struct LinearTrendPredictor;

impl Predictor for LinearTrendPredictor {
    fn algorithm(&self) -> AlgorithmType {
        AlgorithmType::LinearTrend
    }

    fn predict(
        &self,
        samples: &[UsageSample],
        params: &PredictorParams,
    ) -> Result<f64, RecommendError> {
        require_samples(samples, params)?;
        let horizon = params.get_usize("horizon", DEFAULT_HORIZON)?;

        let values: Vec<f64> = samples.iter().map(|s| s.value).collect();
        let last = values.last().copied().unwrap_or(0.0);
        let slope = linear_regression_slope(&values);
        let projected = (last + slope * horizon as f64).max(0.0);

        Ok(projected * (1.0 + margin(params)?))
    }
}
