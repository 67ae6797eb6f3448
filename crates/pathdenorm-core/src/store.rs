//! Normalized entity store: `type key -> id -> raw record`.
//!
//! Buckets and records are reference-counted. Cloning a store, aliasing a
//! bucket, or replacing one record (`with_record`) shares everything else,
//! which is what lets the selector tell an untouched record from a changed one.

use std::collections::BTreeMap;
use std::sync::Arc;

use serde_json::{Map, Value};

use crate::error::{DenormError, Result};

pub type Record = Arc<Value>;
pub type Bucket = Arc<BTreeMap<String, Record>>;

/// String form of an id value. Only strings and numbers are ids.
pub fn id_key(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

#[derive(Debug, Clone, Default)]
pub struct EntityStore {
    buckets: BTreeMap<String, Bucket>,
}

impl EntityStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a store from `{ "<type>": { "<id>": { ..record.. } } }`.
    pub fn from_json(value: &Value) -> Result<Self> {
        let Value::Object(types) = value else {
            return Err(DenormError::InvalidStore(
                "expected an object keyed by entity type".to_string(),
            ));
        };

        let mut store = Self::new();
        for (entity, records) in types {
            let Value::Object(records) = records else {
                return Err(DenormError::InvalidStore(format!(
                    "bucket `{entity}` must be an object keyed by id"
                )));
            };
            let bucket = records
                .iter()
                .map(|(id, record)| (id.clone(), Arc::new(record.clone())))
                .collect();
            store.buckets.insert(entity.clone(), Arc::new(bucket));
        }
        Ok(store)
    }

    pub fn insert_bucket(&mut self, key: impl Into<String>, bucket: Bucket) {
        self.buckets.insert(key.into(), bucket);
    }

    pub fn bucket(&self, key: &str) -> Option<&Bucket> {
        self.buckets.get(key)
    }

    pub fn record(&self, key: &str, id: &str) -> Option<&Record> {
        self.buckets.get(key).and_then(|bucket| bucket.get(id))
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.buckets.keys().map(String::as_str)
    }

    /// A new snapshot with one record replaced (or added). Every other bucket
    /// and record is shared with `self`.
    pub fn with_record(&self, key: &str, id: impl Into<String>, record: Value) -> Self {
        let mut next = self.clone();
        let bucket = next.buckets.entry(key.to_string()).or_default();
        Arc::make_mut(bucket).insert(id.into(), Arc::new(record));
        next
    }

    pub fn to_json(&self) -> Value {
        let types: Map<String, Value> = self
            .buckets
            .iter()
            .map(|(key, bucket)| {
                let records: Map<String, Value> = bucket
                    .iter()
                    .map(|(id, record)| (id.clone(), record.as_ref().clone()))
                    .collect();
                (key.clone(), Value::Object(records))
            })
            .collect();
        Value::Object(types)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn loads_and_looks_up_records() {
        let store = EntityStore::from_json(&json!({
            "people": { "21": { "id": 21, "name": "Devin" } },
            "dogs": {}
        }))
        .expect("load store");

        assert_eq!(
            store.record("people", "21").map(|r| r.as_ref().clone()),
            Some(json!({ "id": 21, "name": "Devin" }))
        );
        assert!(store.record("people", "22").is_none());
        assert!(store.record("cats", "1").is_none());
        assert_eq!(store.keys().collect::<Vec<_>>(), vec!["dogs", "people"]);
    }

    #[test]
    fn rejects_malformed_stores() {
        assert!(EntityStore::from_json(&json!([1, 2])).is_err());
        assert!(EntityStore::from_json(&json!({ "people": [1] })).is_err());
    }

    #[test]
    fn with_record_shares_untouched_data() {
        let store = EntityStore::from_json(&json!({
            "people": { "21": { "id": 21 }, "22": { "id": 22 } },
            "dogs": { "11": { "id": 11 } }
        }))
        .expect("load store");

        let next = store.with_record("people", "22", json!({ "id": 22, "name": "Harper" }));

        let dogs_before = store.bucket("dogs").expect("dogs");
        let dogs_after = next.bucket("dogs").expect("dogs");
        assert!(Arc::ptr_eq(dogs_before, dogs_after));

        let devin_before = store.record("people", "21").expect("devin");
        let devin_after = next.record("people", "21").expect("devin");
        assert!(Arc::ptr_eq(devin_before, devin_after));

        assert_eq!(store.record("people", "22").map(|r| r.as_ref().clone()), Some(json!({ "id": 22 })));
        assert_eq!(
            next.record("people", "22").map(|r| r.as_ref().clone()),
            Some(json!({ "id": 22, "name": "Harper" }))
        );
    }

    #[test]
    fn id_key_accepts_strings_and_numbers() {
        assert_eq!(id_key(&json!(21)), Some("21".to_string()));
        assert_eq!(id_key(&json!("abc")), Some("abc".to_string()));
        assert_eq!(id_key(&json!(null)), None);
        assert_eq!(id_key(&json!({ "id": 1 })), None);
    }
}
