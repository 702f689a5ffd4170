//! Startup data for the in-memory collaborators
//!
//! The seed file carries the recommendations to manage plus the usage
//! history and replica counts their recommenders read.

use anyhow::{Context, Result};
use controller_lib::provider::{StaticMetricsProvider, StaticScaleClient};
use controller_lib::store::InMemoryStore;
use controller_lib::{Recommendation, ResourceKind, UsageSample};
use serde::Deserialize;
use std::path::Path;

#[derive(Debug, Clone, Deserialize)]
pub struct UsageSeries {
    pub namespace: String,
    pub workload: String,
    pub container: String,
    pub resource: ResourceKind,
    pub samples: Vec<UsageSample>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ReplicaCount {
    pub namespace: String,
    pub workload: String,
    pub replicas: u32,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct SeedData {
    #[serde(default)]
    pub recommendations: Vec<Recommendation>,
    #[serde(default)]
    pub usage: Vec<UsageSeries>,
    #[serde(default)]
    pub replicas: Vec<ReplicaCount>,
}

impl SeedData {
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read seed file {:?}", path))?;
        serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse seed file {:?}", path))
    }

    /// Load everything into the collaborators; returns the number of recommendations
    pub fn apply(
        self,
        store: &InMemoryStore,
        provider: &StaticMetricsProvider,
        scale: &StaticScaleClient,
    ) -> usize {
        let count = self.recommendations.len();
        for recommendation in self.recommendations {
            store.insert(recommendation);
        }
        for series in self.usage {
            provider.insert(
                &series.namespace,
                &series.workload,
                &series.container,
                series.resource,
                series.samples,
            );
        }
        for replicas in self.replicas {
            scale.set_replicas(&replicas.namespace, &replicas.workload, replicas.replicas);
        }
        count
    }
}
