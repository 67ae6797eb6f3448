//! One-shot denormalization: prune, alias, traverse.

use pathdenorm_paths::Path;
use serde_json::Value;
use tracing::debug;

use crate::alias::apply_aliases;
use crate::config::DenormalizeConfig;
use crate::error::Result;
use crate::materialized::Materialized;
use crate::plan::Plan;
use crate::prune::prune;
use crate::schema::Schema;
use crate::store::EntityStore;
use crate::traverse::{Fresh, Traversal};

/// Denormalize `root` with the default configuration.
///
/// With `allowed` set, only relations on an allowed path are expanded; every
/// other relation keeps its raw reference. Without it the schema is followed
/// as given, and cycles stop at the first entity revisited.
pub fn denormalize(
    root: &Value,
    schema: &Schema,
    store: &EntityStore,
    allowed: Option<&[Path]>,
) -> Result<Materialized> {
    Denormalizer::default().denormalize(root, schema, store, allowed)
}

#[derive(Debug, Clone, Default)]
pub struct Denormalizer {
    config: DenormalizeConfig,
}

impl Denormalizer {
    pub fn new(config: DenormalizeConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &DenormalizeConfig {
        &self.config
    }

    pub fn denormalize(
        &self,
        root: &Value,
        schema: &Schema,
        store: &EntityStore,
        allowed: Option<&[Path]>,
    ) -> Result<Materialized> {
        let (plan, store) = match allowed {
            Some(allowed) => {
                let pruned = prune(schema, allowed)?;
                (
                    Plan::compile(&pruned.schema)?,
                    apply_aliases(store, &pruned.aliases),
                )
            }
            None => (Plan::compile(schema)?, store.clone()),
        };

        let traversal = Traversal::new(&plan, &store, &self.config, Fresh);
        let out = traversal.run(root)?;
        debug!(plan_nodes = plan.len(), "denormalized");
        Ok(out)
    }
}
