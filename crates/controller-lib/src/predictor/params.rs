//! String-keyed predictor parameters
//!
//! Parameters arrive as strings from the config set and the recommendation
//! spec. Resource-scoped keys (`cpu-percentile`, `memory-margin-fraction`)
//! override the unscoped key once [`PredictorParams::for_resource`] is applied.

use crate::models::ResourceKind;
use crate::recommender::RecommendError;
use std::collections::BTreeMap;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PredictorParams {
    values: BTreeMap<String, String>,
}

impl PredictorParams {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_map(values: BTreeMap<String, String>) -> Self {
        Self { values }
    }

    /// Later values win
    pub fn extend(&mut self, values: &BTreeMap<String, String>) {
        self.values
            .extend(values.iter().map(|(k, v)| (k.clone(), v.clone())));
    }

    pub fn with_override(&self, key: &str, value: impl Into<String>) -> Self {
        let mut values = self.values.clone();
        values.insert(key.to_string(), value.into());
        Self { values }
    }

    /// Resolve resource-scoped keys onto their unscoped names
    pub fn for_resource(&self, kind: ResourceKind) -> Self {
        let prefix = format!("{}-", kind.as_str());
        let mut values = self.values.clone();
        for (key, value) in &self.values {
            if let Some(unscoped) = key.strip_prefix(&prefix) {
                values.insert(unscoped.to_string(), value.clone());
            }
        }
        Self { values }
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.values.get(key).map(String::as_str)
    }

    pub fn get_f64(&self, key: &str, default: f64) -> Result<f64, RecommendError> {
        match self.get(key) {
            None => Ok(default),
            Some(raw) => raw
                .trim()
                .parse::<f64>()
                .ok()
                .filter(|v| v.is_finite())
                .ok_or_else(|| invalid(key, raw)),
        }
    }

    pub fn get_usize(&self, key: &str, default: usize) -> Result<usize, RecommendError> {
        match self.get(key) {
            None => Ok(default),
            Some(raw) => raw.trim().parse::<usize>().map_err(|_| invalid(key, raw)),
        }
    }
}

fn invalid(key: &str, value: &str) -> RecommendError {
    RecommendError::InvalidParam {
        key: key.to_string(),
        value: value.to_string(),
    }
}
