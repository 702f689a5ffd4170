//! Percentile predictor: a high percentile of observed usage plus headroom

use super::{margin, percentile, require_samples, Predictor, PredictorParams};
use crate::models::{AlgorithmType, UsageSample};
use crate::recommender::RecommendError;

pub const DEFAULT_PERCENTILE: f64 = 95.0;

#[derive(Debug, Clone, Copy, Default)]
pub struct PercentilePredictor;

impl Predictor for PercentilePredictor {
    fn algorithm(&self) -> AlgorithmType {
        AlgorithmType::Percentile
    }

    fn predict(
        &self,
        samples: &[UsageSample],
        params: &PredictorParams,
    ) -> Result<f64, RecommendError> {
        require_samples(samples, params)?;
        let p = params.get_f64("percentile", DEFAULT_PERCENTILE)?;
        if !(0.0..=100.0).contains(&p) {
            return Err(RecommendError::InvalidParam {
                key: "percentile".to_string(),
                value: p.to_string(),
            });
        }

        let values: Vec<f64> = samples.iter().map(|s| s.value).collect();
        Ok(percentile(&values, p) * (1.0 + margin(params)?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn samples(values: impl IntoIterator<Item = f64>) -> Vec<UsageSample> {
        values
            .into_iter()
            .enumerate()
            .map(|(i, value)| UsageSample {
                timestamp: i as i64 * 10,
                value,
            })
            .collect()
    }

    #[test]
    fn test_percentile_with_margin() {
        let params = PredictorParams::new()
            .with_override("percentile", "100")
            .with_override("margin-fraction", "0.5");
        let estimate = PercentilePredictor
            .predict(&samples((1..=20).map(|v| v as f64)), &params)
            .unwrap();
        assert!((estimate - 30.0).abs() < 1e-9);
    }

    #[test]
    fn test_insufficient_samples() {
        let err = PercentilePredictor
            .predict(&samples([1.0, 2.0]), &PredictorParams::new())
            .unwrap_err();
        assert_eq!(err, RecommendError::InsufficientData { have: 2, need: 10 });
    }

    #[test]
    fn test_out_of_range_percentile() {
        let params = PredictorParams::new().with_override("percentile", "120");
        let err = PercentilePredictor
            .predict(&samples((0..10).map(|v| v as f64)), &params)
            .unwrap_err();
        assert!(matches!(err, RecommendError::InvalidParam { .. }));
    }
}
