//! Memoized, incremental denormalization.
//!
//! A `Selector` is built once per (schema, paths) and then called with
//! successive application states. Each call re-denormalizes, but every node
//! whose result is equivalent to the one handed out on the previous call is
//! replaced by that previous result, so unchanged subtrees keep their
//! identity (`Materialized::same`) across calls.
//!
//! Cache slots, one per plan node:
//!
//! | node            | key                         | equivalent when                                   |
//! |-----------------|-----------------------------|---------------------------------------------------|
//! | entity          | record id                   | raw record unchanged and every relation field same |
//! | array           | digest of the id sequence   | same length, items pairwise same                  |
//! | object / values | digest of the raw mapping   | same keys, values pairwise same                   |
//!
//! Union nodes are not cached; the variant they dispatch to is. Each slot
//! keeps two generations: what the previous call produced (looked up) and
//! what this call produces (stored). Rotation at the start of a call drops
//! everything older.

use std::mem;
use std::sync::Arc;

use ahash::AHashMap;
use pathdenorm_paths::Path;
use serde_json::Value;
use sha2::{Digest, Sha256};
use tracing::trace;

use crate::alias::{apply_aliases, AliasTable};
use crate::config::DenormalizeConfig;
use crate::error::Result;
use crate::materialized::Materialized;
use crate::plan::{EntityNode, NodeId, Plan, PlanNode};
use crate::prune::prune;
use crate::schema::Schema;
use crate::store::EntityStore;
use crate::traverse::{Reconcile, Traversal};

type EntitiesFn<S> = Box<dyn Fn(&S) -> EntityStore + Send + Sync>;
type ResultFn<S> = Box<dyn Fn(&S) -> Value + Send + Sync>;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
enum CacheKey {
    Id(String),
    Digest([u8; 32]),
}

#[derive(Debug, Default)]
struct Slot {
    previous: AHashMap<CacheKey, Materialized>,
    current: AHashMap<CacheKey, Materialized>,
}

impl Slot {
    fn rotate(&mut self) {
        self.previous = mem::take(&mut self.current);
    }

    /// Keep the cached result when `equivalent` says so; either way, record
    /// what is handed out under `key` for the next call.
    fn settle(
        &mut self,
        key: CacheKey,
        fresh: Materialized,
        equivalent: impl Fn(&Materialized, &Materialized) -> bool,
    ) -> (Materialized, bool) {
        let (settled, reused) = match self.previous.get(&key) {
            Some(cached) if equivalent(cached, &fresh) => (cached.clone(), true),
            _ => (fresh, false),
        };
        self.current.insert(key, settled.clone());
        (settled, reused)
    }
}

pub struct Selector<S> {
    get_entities: EntitiesFn<S>,
    get_result: ResultFn<S>,
    plan: Plan,
    aliases: AliasTable,
    config: DenormalizeConfig,
    slots: Vec<Slot>,
    last_entities: EntityStore,
    current_entities: EntityStore,
}

impl<S> Selector<S> {
    pub fn new<E, R>(
        get_entities: E,
        get_result: R,
        schema: &Schema,
        allowed: Option<&[Path]>,
    ) -> Result<Self>
    where
        E: Fn(&S) -> EntityStore + Send + Sync + 'static,
        R: Fn(&S) -> Value + Send + Sync + 'static,
    {
        let (plan, aliases) = match allowed {
            Some(allowed) => {
                let pruned = prune(schema, allowed)?;
                (Plan::compile(&pruned.schema)?, pruned.aliases)
            }
            None => (Plan::compile(schema)?, AliasTable::new()),
        };
        let slots = (0..plan.len()).map(|_| Slot::default()).collect();

        Ok(Self {
            get_entities: Box::new(get_entities),
            get_result: Box::new(get_result),
            plan,
            aliases,
            config: DenormalizeConfig::default(),
            slots,
            last_entities: EntityStore::new(),
            current_entities: EntityStore::new(),
        })
    }

    pub fn with_config(mut self, config: DenormalizeConfig) -> Self {
        self.config = config;
        self
    }

    /// Denormalize the result selected from `state`, reusing every subtree
    /// that is equivalent to the previous call's.
    ///
    /// Stored records are tracked by identity. Records passed inline in the
    /// result, with no store entry, are compared field by field.
    pub fn select(&mut self, state: &S) -> Result<Materialized> {
        let entities = (self.get_entities)(state);
        let root = (self.get_result)(state);

        self.last_entities = mem::replace(&mut self.current_entities, entities);
        for slot in &mut self.slots {
            slot.rotate();
        }

        let store = apply_aliases(&self.current_entities, &self.aliases);
        let mut memo = Memo {
            slots: &mut self.slots,
            last: &self.last_entities,
            current: &self.current_entities,
            reused: 0,
            fresh: 0,
        };

        let out = Traversal::new(&self.plan, &store, &self.config, &mut memo).run(&root)?;
        trace!(reused = memo.reused, fresh = memo.fresh, "selector call");
        Ok(out)
    }

    /// Results currently retained across all cache slots, both generations.
    pub fn cache_len(&self) -> usize {
        self.slots
            .iter()
            .map(|slot| slot.previous.len() + slot.current.len())
            .sum()
    }
}

/// `Selector::new` under the name callers of the free-function API expect.
pub fn create_selector<S, E, R>(
    get_entities: E,
    get_result: R,
    schema: &Schema,
    allowed: Option<&[Path]>,
) -> Result<Selector<S>>
where
    E: Fn(&S) -> EntityStore + Send + Sync + 'static,
    R: Fn(&S) -> Value + Send + Sync + 'static,
{
    Selector::new(get_entities, get_result, schema, allowed)
}

// ============================================================================
// Reconciliation against the previous call
// ============================================================================

struct Memo<'a> {
    slots: &'a mut [Slot],
    last: &'a EntityStore,
    current: &'a EntityStore,
    reused: usize,
    fresh: usize,
}

impl Memo<'_> {
    /// Both snapshots hold a bucket for `entity`, and the same record at `id`
    /// (or none in either).
    fn record_unchanged(&self, entity: &str, id: &str) -> bool {
        let (Some(last), Some(current)) = (self.last.bucket(entity), self.current.bucket(entity))
        else {
            return false;
        };
        match (last.get(id), current.get(id)) {
            (Some(a), Some(b)) => Arc::ptr_eq(a, b) || a == b,
            (None, None) => true,
            _ => false,
        }
    }

    fn count(&mut self, reused: bool) {
        if reused {
            self.reused += 1;
        } else {
            self.fresh += 1;
        }
    }
}

impl Reconcile for Memo<'_> {
    fn entity(&mut self, node: NodeId, entity: &EntityNode, id: &str, fresh: Materialized) -> Materialized {
        let unchanged = self.record_unchanged(&entity.entity, id);
        let stored = self.current.record(&entity.entity, id).is_some();
        let Some(slot) = self.slots.get_mut(node) else {
            return fresh;
        };

        let (settled, reused) = slot.settle(CacheKey::Id(id.to_string()), fresh, |cached, fresh| {
            if !unchanged {
                return false;
            }
            if !stored {
                // inline record: no store identity to lean on
                return cached.same_children(fresh);
            }
            entity.relations.keys().all(|relation| {
                match (cached.get(relation), fresh.get(relation)) {
                    (Some(a), Some(b)) => a.same(b),
                    (None, None) => true,
                    _ => false,
                }
            })
        });
        self.count(reused);
        settled
    }

    fn container(&mut self, node: NodeId, plan: &PlanNode, raw: &Value, fresh: Materialized) -> Materialized {
        let key = match plan {
            PlanNode::Object(props) => {
                let retained: serde_json::Map<String, Value> = props
                    .keys()
                    .filter_map(|prop| raw.get(prop).map(|value| (prop.clone(), value.clone())))
                    .collect();
                content_digest(&Value::Object(retained))
            }
            _ => content_digest(raw),
        };
        let Some(slot) = self.slots.get_mut(node) else {
            return fresh;
        };

        let (settled, reused) = slot.settle(key, fresh, |cached, fresh| cached.same_children(fresh));
        self.count(reused);
        settled
    }
}

// ============================================================================
// Content digests
// ============================================================================

fn content_digest(value: &Value) -> CacheKey {
    let mut hasher = Sha256::new();
    feed_canonical(&mut hasher, value);
    CacheKey::Digest(hasher.finalize().into())
}

/// Key-sorted JSON, independent of how the map type orders its keys.
fn feed_canonical(hasher: &mut Sha256, value: &Value) {
    match value {
        Value::Array(items) => {
            hasher.update(b"[");
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    hasher.update(b",");
                }
                feed_canonical(hasher, item);
            }
            hasher.update(b"]");
        }
        Value::Object(fields) => {
            let mut keys: Vec<&String> = fields.keys().collect();
            keys.sort();
            hasher.update(b"{");
            for (i, key) in keys.into_iter().enumerate() {
                if i > 0 {
                    hasher.update(b",");
                }
                hasher.update(Value::from(key.as_str()).to_string().as_bytes());
                hasher.update(b":");
                if let Some(field) = fields.get(key) {
                    feed_canonical(hasher, field);
                }
            }
            hasher.update(b"}");
        }
        scalar => hasher.update(scalar.to_string().as_bytes()),
    }
}
