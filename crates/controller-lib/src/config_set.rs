//! Ambient recommender configuration
//!
//! A config set is a list of property maps, each optionally scoped to a
//! namespace. Unscoped entries apply everywhere; a namespace entry overrides
//! them key by key.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfigSetEntry {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub namespace: Option<String>,
    #[serde(default)]
    pub properties: BTreeMap<String, String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfigSet {
    #[serde(default)]
    pub entries: Vec<ConfigSetEntry>,
}

impl ConfigSet {
    /// Merged properties for `namespace`, most specific entry last
    pub fn properties_for(&self, namespace: &str) -> BTreeMap<String, String> {
        let mut merged = BTreeMap::new();
        for entry in self.entries.iter().filter(|e| e.namespace.is_none()) {
            merged.extend(entry.properties.clone());
        }
        for entry in self
            .entries
            .iter()
            .filter(|e| e.namespace.as_deref() == Some(namespace))
        {
            merged.extend(entry.properties.clone());
        }
        merged
    }
}
