//! Denormalized output.
//!
//! Containers are reference-counted so that identity is observable:
//! `Materialized::same` is the `===` of the output tree. Two materializations
//! of unchanged data handed out by the same selector are `same`, which lets
//! consumers skip work with a pointer comparison.

use std::collections::BTreeMap;
use std::sync::Arc;

use serde::{Serialize, Serializer};
use serde_json::{Map, Value};

#[derive(Debug, Clone)]
pub enum Materialized {
    /// Passed through untouched: scalars, unexpanded ids, fields the schema
    /// does not mention.
    Raw(Value),
    List(Arc<Vec<Materialized>>),
    Record(Arc<BTreeMap<String, Materialized>>),
}

impl Materialized {
    pub fn null() -> Self {
        Self::Raw(Value::Null)
    }

    /// Identity: pointer equality for containers, value equality for raw leaves.
    pub fn same(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Raw(a), Self::Raw(b)) => a == b,
            (Self::List(a), Self::List(b)) => Arc::ptr_eq(a, b),
            (Self::Record(a), Self::Record(b)) => Arc::ptr_eq(a, b),
            _ => false,
        }
    }

    /// One level deeper than `same`: equal shape and pairwise `same` children.
    pub fn same_children(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::List(a), Self::List(b)) => {
                a.len() == b.len() && a.iter().zip(b.iter()).all(|(x, y)| x.same(y))
            }
            (Self::Record(a), Self::Record(b)) => {
                a.len() == b.len()
                    && a
                        .iter()
                        .all(|(key, x)| b.get(key).is_some_and(|y| x.same(y)))
            }
            _ => self.same(other),
        }
    }

    pub fn get(&self, field: &str) -> Option<&Materialized> {
        match self {
            Self::Record(fields) => fields.get(field),
            _ => None,
        }
    }

    pub fn at(&self, index: usize) -> Option<&Materialized> {
        match self {
            Self::List(items) => items.get(index),
            _ => None,
        }
    }

    pub fn as_raw(&self) -> Option<&Value> {
        match self {
            Self::Raw(value) => Some(value),
            _ => None,
        }
    }

    pub fn to_json(&self) -> Value {
        match self {
            Self::Raw(value) => value.clone(),
            Self::List(items) => Value::Array(items.iter().map(Self::to_json).collect()),
            Self::Record(fields) => Value::Object(
                fields
                    .iter()
                    .map(|(key, value)| (key.clone(), value.to_json()))
                    .collect::<Map<String, Value>>(),
            ),
        }
    }
}

impl Serialize for Materialized {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Self::Raw(value) => value.serialize(serializer),
            Self::List(items) => serializer.collect_seq(items.iter()),
            Self::Record(fields) => serializer.collect_map(fields.iter()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn record(fields: &[(&str, Materialized)]) -> Materialized {
        Materialized::Record(Arc::new(
            fields
                .iter()
                .map(|(k, v)| (k.to_string(), v.clone()))
                .collect(),
        ))
    }

    #[test]
    fn raw_leaves_compare_by_value_containers_by_pointer() {
        assert!(Materialized::Raw(json!(21)).same(&Materialized::Raw(json!(21))));
        assert!(!Materialized::Raw(json!(21)).same(&Materialized::Raw(json!("21"))));

        let a = record(&[("id", Materialized::Raw(json!(1)))]);
        let b = record(&[("id", Materialized::Raw(json!(1)))]);
        assert!(a.same(&a.clone()));
        assert!(!a.same(&b));
        assert!(a.same_children(&b));
    }

    #[test]
    fn same_children_checks_shape() {
        let a = Materialized::List(Arc::new(vec![Materialized::Raw(json!(1))]));
        let b = Materialized::List(Arc::new(vec![
            Materialized::Raw(json!(1)),
            Materialized::Raw(json!(2)),
        ]));
        assert!(!a.same_children(&b));

        let r1 = record(&[("x", Materialized::Raw(json!(1)))]);
        let r2 = record(&[("y", Materialized::Raw(json!(1)))]);
        assert!(!r1.same_children(&r2));
    }

    #[test]
    fn serializes_like_its_json_form() {
        let value = record(&[
            ("id", Materialized::Raw(json!(21))),
            (
                "owners",
                Materialized::List(Arc::new(vec![Materialized::Raw(json!(21))])),
            ),
        ]);
        let expected = json!({ "id": 21, "owners": [21] });
        assert_eq!(value.to_json(), expected);
        assert_eq!(serde_json::to_value(&value).expect("serialize"), expected);
        assert_eq!(value.get("owners").and_then(|o| o.at(0)).and_then(Materialized::as_raw), Some(&json!(21)));
    }
}
