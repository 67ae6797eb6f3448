//! Alias table and the aliased view of an entity store.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::schema::AliasKey;
use crate::store::EntityStore;

/// `alias key -> real entity key`, filled in by the pruner.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AliasTable(BTreeMap<String, String>);

impl AliasTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, alias: &AliasKey) {
        self.0.insert(alias.to_string(), alias.entity().to_string());
    }

    pub fn resolve(&self, alias: &str) -> Option<&str> {
        self.0.get(alias).map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(a, e)| (a.as_str(), e.as_str()))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// A copy of `store` that also exposes every real bucket under each of its
/// aliases. Buckets are shared, not copied; `store` is left untouched.
pub fn apply_aliases(store: &EntityStore, aliases: &AliasTable) -> EntityStore {
    let mut expanded = store.clone();
    for (alias, entity) in aliases.iter() {
        match store.bucket(entity) {
            Some(bucket) => expanded.insert_bucket(alias, bucket.clone()),
            None => debug!(alias, entity, "alias target has no bucket in the store"),
        }
    }
    expanded
}
