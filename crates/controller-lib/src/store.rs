//! Recommendation persistence
//!
//! The store hands out snapshots and accepts updates guarded by
//! `resource_version`: an update built from a stale snapshot is rejected
//! with [`StoreError::Conflict`].

use crate::models::{ObjectKey, Recommendation};
use async_trait::async_trait;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use thiserror::Error;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum StoreError {
    #[error("recommendation {0} not found")]
    NotFound(ObjectKey),

    #[error("recommendation {key} was modified: expected version {expected}, found {found}")]
    Conflict {
        key: ObjectKey,
        expected: u64,
        found: u64,
    },

    #[error("store error: {0}")]
    Other(String),
}

#[async_trait]
pub trait RecommendationStore: Send + Sync {
    async fn get(&self, key: &ObjectKey) -> Result<Recommendation, StoreError>;

    /// Replace the stored object; returns it with the new resource version
    async fn update(&self, recommendation: Recommendation) -> Result<Recommendation, StoreError>;

    async fn list(&self) -> Result<Vec<ObjectKey>, StoreError>;
}

/// Process-local store
#[derive(Debug, Default)]
pub struct InMemoryStore {
    objects: DashMap<ObjectKey, Recommendation>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create or overwrite an object regardless of its version
    pub fn insert(&self, mut recommendation: Recommendation) -> Recommendation {
        let key = recommendation.key();
        let version = self
            .objects
            .get(&key)
            .map(|existing| existing.metadata.resource_version)
            .unwrap_or(0);
        recommendation.metadata.resource_version = version + 1;
        self.objects.insert(key, recommendation.clone());
        recommendation
    }

    pub fn remove(&self, key: &ObjectKey) -> Option<Recommendation> {
        self.objects.remove(key).map(|(_, r)| r)
    }

    pub fn len(&self) -> usize {
        self.objects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }
}

#[async_trait]
impl RecommendationStore for InMemoryStore {
    async fn get(&self, key: &ObjectKey) -> Result<Recommendation, StoreError> {
        self.objects
            .get(key)
            .map(|r| r.value().clone())
            .ok_or_else(|| StoreError::NotFound(key.clone()))
    }

    async fn update(
        &self,
        mut recommendation: Recommendation,
    ) -> Result<Recommendation, StoreError> {
        let key = recommendation.key();
        match self.objects.entry(key.clone()) {
            Entry::Vacant(_) => Err(StoreError::NotFound(key)),
            Entry::Occupied(mut slot) => {
                let found = slot.get().metadata.resource_version;
                let expected = recommendation.metadata.resource_version;
                if found != expected {
                    return Err(StoreError::Conflict {
                        key,
                        expected,
                        found,
                    });
                }
                recommendation.metadata.resource_version = found + 1;
                slot.insert(recommendation.clone());
                Ok(recommendation)
            }
        }
    }

    async fn list(&self) -> Result<Vec<ObjectKey>, StoreError> {
        let mut keys: Vec<ObjectKey> = self.objects.iter().map(|e| e.key().clone()).collect();
        keys.sort();
        Ok(keys)
    }
}
