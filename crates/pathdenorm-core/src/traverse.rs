//! The denormalizing walk over a compiled plan.
//!
//! Input is raw JSON shaped like the plan (ids, id lists, stubs, nested id
//! structures); output is a `Materialized` tree. Within one walk every
//! `(node, id)` is materialized once and shared, and a reference back to an
//! entity that is still being materialized yields the raw id.
//!
//! `Reconcile` is the hook the selector uses to swap a fresh result for a
//! cached, equivalent one. `Fresh` is the no-op used by one-shot calls.

use std::collections::BTreeMap;
use std::sync::Arc;

use ahash::{AHashMap, AHashSet};
use serde_json::Value;

use crate::config::{DenormalizeConfig, MissingEntityPolicy};
use crate::error::{DenormError, Result};
use crate::materialized::Materialized;
use crate::plan::{EntityNode, MemberNodes, NodeId, Plan, PlanNode, VariantNodes};
use crate::store::{id_key, EntityStore};

pub trait Reconcile {
    /// Settle the result for entity `id` of `node`.
    fn entity(&mut self, node: NodeId, entity: &EntityNode, id: &str, fresh: Materialized)
        -> Materialized;

    /// Settle the result for an array, object or values node given its raw input.
    fn container(&mut self, node: NodeId, plan: &PlanNode, raw: &Value, fresh: Materialized)
        -> Materialized;
}

impl<R: Reconcile + ?Sized> Reconcile for &mut R {
    fn entity(&mut self, node: NodeId, entity: &EntityNode, id: &str, fresh: Materialized) -> Materialized {
        (**self).entity(node, entity, id, fresh)
    }

    fn container(&mut self, node: NodeId, plan: &PlanNode, raw: &Value, fresh: Materialized) -> Materialized {
        (**self).container(node, plan, raw, fresh)
    }
}

/// Always keeps the fresh result.
#[derive(Debug, Clone, Copy, Default)]
pub struct Fresh;

impl Reconcile for Fresh {
    fn entity(&mut self, _: NodeId, _: &EntityNode, _: &str, fresh: Materialized) -> Materialized {
        fresh
    }

    fn container(&mut self, _: NodeId, _: &PlanNode, _: &Value, fresh: Materialized) -> Materialized {
        fresh
    }
}

pub struct Traversal<'a, R> {
    plan: &'a Plan,
    store: &'a EntityStore,
    config: &'a DenormalizeConfig,
    reconcile: R,
    done: AHashMap<(NodeId, String), Materialized>,
    in_progress: AHashSet<(NodeId, String)>,
}

impl<'a, R: Reconcile> Traversal<'a, R> {
    pub fn new(
        plan: &'a Plan,
        store: &'a EntityStore,
        config: &'a DenormalizeConfig,
        reconcile: R,
    ) -> Self {
        Self {
            plan,
            store,
            config,
            reconcile,
            done: AHashMap::new(),
            in_progress: AHashSet::new(),
        }
    }

    /// Denormalize `root` against the plan's root node.
    pub fn run(mut self, root: &Value) -> Result<Materialized> {
        let root_node = self.plan.root();
        self.unvisit(root_node, root)
    }

    fn unvisit(&mut self, id: NodeId, value: &Value) -> Result<Materialized> {
        if value.is_null() {
            return Ok(Materialized::null());
        }
        let plan = self.plan;
        let Some(node) = plan.node(id) else {
            return Ok(Materialized::Raw(value.clone()));
        };

        let fresh = match node {
            PlanNode::Entity(entity) => return self.unvisit_entity(id, entity, value),
            PlanNode::Union(variants) => return self.unvisit_variant(variants, value),
            PlanNode::Array(inner) => match value {
                Value::Array(items) => {
                    let mut out = Vec::with_capacity(items.len());
                    for item in items {
                        out.push(self.unvisit(*inner, item)?);
                    }
                    Materialized::List(Arc::new(out))
                }
                _ => return Ok(Materialized::Raw(value.clone())),
            },
            PlanNode::PolymorphicArray(variants) => match value {
                Value::Array(items) => {
                    let mut out = Vec::with_capacity(items.len());
                    for item in items {
                        out.push(self.unvisit_variant(variants, item)?);
                    }
                    Materialized::List(Arc::new(out))
                }
                _ => return Ok(Materialized::Raw(value.clone())),
            },
            PlanNode::Object(props) => match value {
                Value::Object(fields) => {
                    let mut out = BTreeMap::new();
                    for (key, field) in fields {
                        let settled = match props.get(key) {
                            Some(&prop) => self.unvisit(prop, field)?,
                            None => Materialized::Raw(field.clone()),
                        };
                        out.insert(key.clone(), settled);
                    }
                    Materialized::Record(Arc::new(out))
                }
                _ => return Ok(Materialized::Raw(value.clone())),
            },
            PlanNode::Values(members) => match value {
                Value::Object(entries) => {
                    let mut out = BTreeMap::new();
                    for (key, entry) in entries {
                        let settled = match members {
                            MemberNodes::Single(inner) => self.unvisit(*inner, entry)?,
                            MemberNodes::Polymorphic(variants) => {
                                self.unvisit_variant(variants, entry)?
                            }
                        };
                        out.insert(key.clone(), settled);
                    }
                    Materialized::Record(Arc::new(out))
                }
                _ => return Ok(Materialized::Raw(value.clone())),
            },
        };

        Ok(self.reconcile.container(id, node, value, fresh))
    }

    fn unvisit_variant(&mut self, variants: &VariantNodes, value: &Value) -> Result<Materialized> {
        let stub_tag = value.get(&self.config.variant_tag_field).and_then(id_key);

        let (tag, target) = match stub_tag {
            Some(tag) => {
                let target = match value.get("id") {
                    Some(id) if !id.is_null() => id,
                    _ => value,
                };
                (tag, target)
            }
            None => match variants.discriminator.tag_of(value) {
                Some(tag) => (tag, value),
                None => return Ok(Materialized::Raw(value.clone())),
            },
        };

        match variants.variants.get(&tag) {
            Some(&node) => self.unvisit(node, target),
            None => Err(DenormError::UnknownVariant {
                tag,
                expected: variants.expected(),
            }),
        }
    }

    fn unvisit_entity(&mut self, node: NodeId, entity: &EntityNode, value: &Value) -> Result<Materialized> {
        let (id, record) = match value {
            Value::Object(_) => (
                value.get(&entity.id_attribute).and_then(id_key),
                Arc::new(value.clone()),
            ),
            _ => {
                let Some(id) = id_key(value) else {
                    return Ok(Materialized::Raw(value.clone()));
                };
                match self.store.record(&entity.bucket, &id) {
                    Some(record) => (Some(id), record.clone()),
                    None => return self.missing(entity, id, value),
                }
            }
        };

        let Some(id) = id else {
            // inline record without an id: nothing to share it under
            return self.materialize(entity, &record);
        };

        let key = (node, id);
        if let Some(done) = self.done.get(&key) {
            return Ok(done.clone());
        }
        if self.in_progress.contains(&key) {
            return Ok(Materialized::Raw(value.clone()));
        }

        self.in_progress.insert(key.clone());
        let fresh = self.materialize(entity, &record);
        self.in_progress.remove(&key);

        let settled = self.reconcile.entity(node, entity, &key.1, fresh?);
        self.done.insert(key, settled.clone());
        Ok(settled)
    }

    fn materialize(&mut self, entity: &EntityNode, record: &Value) -> Result<Materialized> {
        let Value::Object(fields) = record else {
            return Ok(Materialized::Raw(record.clone()));
        };

        let mut out = BTreeMap::new();
        for (key, field) in fields {
            let settled = match entity.relations.get(key) {
                Some(&relation) => self.unvisit(relation, field)?,
                None => Materialized::Raw(field.clone()),
            };
            out.insert(key.clone(), settled);
        }
        Ok(Materialized::Record(Arc::new(out)))
    }

    fn missing(&self, entity: &EntityNode, id: String, value: &Value) -> Result<Materialized> {
        match self.config.missing_entity {
            MissingEntityPolicy::KeepReference => Ok(Materialized::Raw(value.clone())),
            MissingEntityPolicy::Null => Ok(Materialized::null()),
            MissingEntityPolicy::Error => Err(DenormError::MissingEntity {
                entity: entity.entity.clone(),
                id,
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{EntityType, Schema, SubSchema};
    use serde_json::json;

    fn store() -> EntityStore {
        EntityStore::from_json(&json!({
            "people": {
                "21": { "id": 21, "name": "Devin", "partner": 22, "pet": 11 },
                "22": { "id": 22, "name": "Harper", "partner": 21, "pet": 12 }
            },
            "dogs": {
                "11": { "id": 11, "name": "Ren" },
                "12": { "id": 12, "name": "Pony" }
            }
        }))
        .expect("load store")
    }

    fn people() -> Schema {
        Schema::new(SubSchema::array(SubSchema::entity("people")))
            .define(
                EntityType::new("people")
                    .relation("pet", SubSchema::entity("dogs"))
                    .relation("partner", SubSchema::entity("people")),
            )
            .define(EntityType::new("dogs"))
    }

    fn run(schema: &Schema, store: &EntityStore, config: &DenormalizeConfig, root: Value) -> Result<Value> {
        let plan = Plan::compile(schema).expect("compile");
        Traversal::new(&plan, store, config, Fresh)
            .run(&root)
            .map(|out| out.to_json())
    }

    #[test]
    fn unpruned_cycle_stops_at_the_entity_in_progress() {
        let out = run(&people(), &store(), &DenormalizeConfig::default(), json!([21])).expect("run");
        assert_eq!(
            out,
            json!([{
                "id": 21, "name": "Devin", "pet": { "id": 11, "name": "Ren" },
                "partner": {
                    "id": 22, "name": "Harper", "pet": { "id": 12, "name": "Pony" },
                    "partner": 21
                }
            }])
        );
    }

    #[test]
    fn repeated_entities_are_shared_within_a_call() {
        let plan = Plan::compile(&people()).expect("compile");
        let config = DenormalizeConfig::default();
        let store = store();
        let out = Traversal::new(&plan, &store, &config, Fresh)
            .run(&json!([22, 22]))
            .expect("run");
        let first = out.at(0).expect("first");
        let second = out.at(1).expect("second");
        assert!(first.same(second));
    }

    #[test]
    fn null_and_non_array_inputs_pass_through() {
        let config = DenormalizeConfig::default();
        assert_eq!(run(&people(), &store(), &config, json!(null)).expect("run"), json!(null));
        assert_eq!(run(&people(), &store(), &config, json!(21)).expect("run"), json!(21));
    }

    #[test]
    fn missing_entities_follow_the_policy() {
        let schema = people().with_root(SubSchema::entity("people"));
        let store = store();

        let keep = DenormalizeConfig::default();
        assert_eq!(run(&schema, &store, &keep, json!(99)).expect("keep"), json!(99));

        let null = DenormalizeConfig {
            missing_entity: MissingEntityPolicy::Null,
            ..DenormalizeConfig::default()
        };
        assert_eq!(run(&schema, &store, &null, json!(99)).expect("null"), json!(null));

        let error = DenormalizeConfig {
            missing_entity: MissingEntityPolicy::Error,
            ..DenormalizeConfig::default()
        };
        let err = run(&schema, &store, &error, json!(99)).expect_err("missing");
        assert!(matches!(
            err,
            DenormError::MissingEntity { ref entity, ref id } if entity == "people" && id == "99"
        ));
    }

    #[test]
    fn inline_records_are_used_as_is() {
        let schema = people().with_root(SubSchema::entity("people"));
        let out = run(
            &schema,
            &store(),
            &DenormalizeConfig::default(),
            json!({ "id": 30, "name": "Inline", "pet": 12 }),
        )
        .expect("run");
        assert_eq!(
            out,
            json!({ "id": 30, "name": "Inline", "pet": { "id": 12, "name": "Pony" } })
        );
    }

    #[test]
    fn variants_resolve_from_stub_tag_or_discriminator() {
        let schema = Schema::new(SubSchema::polymorphic_array(
            [("dog", SubSchema::entity("dogs")), ("cat", SubSchema::entity("cats"))],
            "type",
        ))
        .define(EntityType::new("dogs"))
        .define(EntityType::new("cats"));
        let store = EntityStore::from_json(&json!({
            "dogs": { "11": { "id": 11, "type": "dog" } },
            "cats": { "12": { "id": 12, "type": "cat" } }
        }))
        .expect("load store");

        let out = run(
            &schema,
            &store,
            &DenormalizeConfig::default(),
            json!([
                { "id": 11, "schema": "dog" },
                { "id": 12, "type": "cat", "inline": true },
                { "id": 13 }
            ]),
        )
        .expect("run");

        assert_eq!(
            out,
            json!([
                { "id": 11, "type": "dog" },
                { "id": 12, "type": "cat", "inline": true },
                { "id": 13 }
            ])
        );
    }

    #[test]
    fn unknown_variant_is_an_error() {
        let schema = Schema::new(SubSchema::union([("dog", SubSchema::entity("dogs"))], "type"))
            .define(EntityType::new("dogs"));
        let err = run(
            &schema,
            &store(),
            &DenormalizeConfig::default(),
            json!({ "id": 1, "schema": "lizard" }),
        )
        .expect_err("lizards are not declared");
        assert!(matches!(
            err,
            DenormError::UnknownVariant { ref tag, ref expected } if tag == "lizard" && expected == "dog"
        ));
    }

    #[test]
    fn object_and_values_nodes_replace_declared_entries() {
        let schema = Schema::new(SubSchema::object([
            ("owner", SubSchema::entity("people")),
            ("kennel", SubSchema::values(SubSchema::entity("dogs"))),
        ]))
        .define(EntityType::new("people"))
        .define(EntityType::new("dogs"));

        let out = run(
            &schema,
            &store(),
            &DenormalizeConfig::default(),
            json!({ "owner": 22, "kennel": { "a": 11, "b": 12 }, "note": "x" }),
        )
        .expect("run");

        assert_eq!(out["owner"]["name"], json!("Harper"));
        assert_eq!(out["owner"]["pet"], json!(12));
        assert_eq!(out["kennel"], json!({ "a": { "id": 11, "name": "Ren" }, "b": { "id": 12, "name": "Pony" } }));
        assert_eq!(out["note"], json!("x"));
    }
}
