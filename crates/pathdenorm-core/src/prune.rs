//! Schema pruning.
//!
//! Rewrites a schema so that only relations on an allowed path remain. A
//! dropped relation is absent from the pruned schema, so the traversal copies
//! its raw field (an id, a stub, an id structure) through untouched.
//!
//! Every entity type reached below the root is registered under a fresh
//! `AliasKey` for the path that reached it. The same real entity can thus be
//! expanded differently depending on the route, and self-referential schemas
//! terminate: each relation step lengthens the path, allowed paths are finite,
//! and once no allowed path extends the current one the relation is dropped.
//!
//! Path bookkeeping:
//! - entity relations and object props append their name;
//! - arrays and single-member values are transparent;
//! - polymorphic nodes narrow the last segment to `name(variant)`.

use std::collections::BTreeMap;

use pathdenorm_paths::{retains, Path};
use serde::{Deserialize, Serialize};
use tracing::{debug, trace};

use crate::alias::AliasTable;
use crate::error::Result;
use crate::schema::{AliasKey, EntityRef, EntityType, Members, Schema, SubSchema, Variants};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PrunedSchema {
    pub schema: Schema,
    pub aliases: AliasTable,
}

pub fn prune(schema: &Schema, allowed: &[Path]) -> Result<PrunedSchema> {
    let mut pruner = Pruner {
        source: schema,
        allowed,
        entities: BTreeMap::new(),
        aliases: AliasTable::new(),
    };

    let root = pruner.walk(&schema.root, &Path::new())?;
    debug!(
        allowed = allowed.len(),
        entity_types = pruner.entities.len(),
        aliases = pruner.aliases.len(),
        "pruned schema"
    );

    Ok(PrunedSchema {
        schema: Schema::from_parts(root, pruner.entities),
        aliases: pruner.aliases,
    })
}

struct Pruner<'a> {
    source: &'a Schema,
    allowed: &'a [Path],
    entities: BTreeMap<String, EntityType>,
    aliases: AliasTable,
}

impl Pruner<'_> {
    fn walk(&mut self, node: &SubSchema, path: &Path) -> Result<SubSchema> {
        Ok(match node {
            SubSchema::Entity(reference) => SubSchema::Entity(self.walk_entity(reference, path)?),
            SubSchema::Object(props) => SubSchema::Object(self.walk_relations(props, path, false)?),
            SubSchema::Array(inner) => SubSchema::Array(Box::new(self.walk(inner, path)?)),
            SubSchema::PolymorphicArray(variants) => {
                SubSchema::PolymorphicArray(self.walk_variants(variants, path)?)
            }
            SubSchema::Union(variants) => SubSchema::Union(self.walk_variants(variants, path)?),
            SubSchema::Values(Members::Single(inner)) => {
                SubSchema::Values(Members::Single(Box::new(self.walk(inner, path)?)))
            }
            SubSchema::Values(Members::Polymorphic(variants)) => {
                SubSchema::Values(Members::Polymorphic(self.walk_variants(variants, path)?))
            }
        })
    }

    fn walk_variants(&mut self, variants: &Variants, path: &Path) -> Result<Variants> {
        let mut kept = BTreeMap::new();
        for (tag, schema) in &variants.variants {
            kept.insert(tag.clone(), self.walk(schema, &path.with_variant(tag))?);
        }
        Ok(Variants {
            variants: kept,
            discriminator: variants.discriminator.clone(),
        })
    }

    fn walk_relations(
        &mut self,
        relations: &BTreeMap<String, SubSchema>,
        path: &Path,
        on_entity: bool,
    ) -> Result<BTreeMap<String, SubSchema>> {
        let mut kept = BTreeMap::new();
        for (name, schema) in relations {
            let next = path.child(name);
            if retains(&next, self.allowed, on_entity) {
                kept.insert(name.clone(), self.walk(schema, &next)?);
            } else {
                trace!(relation = %next, "relation left as reference");
            }
        }
        Ok(kept)
    }

    fn walk_entity(&mut self, reference: &EntityRef, path: &Path) -> Result<EntityRef> {
        let source = self.source.entity(&reference.registry_key())?;

        let (alias, pruned_ref) = if path.is_empty() {
            (None, EntityRef::Direct(source.key.clone()))
        } else {
            let alias = AliasKey::new(source.key.clone(), path.clone());
            (Some(alias.clone()), EntityRef::Aliased(alias))
        };

        let registry_key = pruned_ref.registry_key();
        if self.entities.contains_key(&registry_key) {
            // pruning is a function of (entity, path); this one is already done
            return Ok(pruned_ref);
        }

        let relations = self.walk_relations(&source.relations, path, true)?;

        if let Some(alias) = &alias {
            debug!(alias = %alias, entity = %source.key, "registered entity alias");
            self.aliases.insert(alias);
        }
        self.entities.insert(
            registry_key,
            EntityType {
                key: source.key.clone(),
                alias,
                id_attribute: source.id_attribute.clone(),
                relations,
            },
        );

        Ok(pruned_ref)
    }
}
