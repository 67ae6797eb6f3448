//! PathDenorm core: path-scoped denormalization of normalized entity graphs.
//!
//! Given entities stored by type and id and a root reference (an id, a list
//! of ids, or a nested id structure), rebuild the tree of materialized
//! records, expanding relations only along caller-chosen paths. Every other
//! relation keeps its raw reference, which bounds the output even when the
//! relation graph is cyclic.
//!
//! Pipeline:
//! 1. **Prune** (`prune`): rewrite the schema so only allowed relations
//!    remain; entity types below the root get per-path aliases.
//! 2. **Alias** (`alias`): expose each real store bucket under its aliases.
//! 3. **Traverse** (`plan`, `traverse`): compile the schema and walk it.
//!
//! `denormalize` runs the pipeline once. `Selector` runs it repeatedly over
//! changing stores and keeps unchanged subtrees pointer-identical between
//! calls.
//!
//! ## Module Organization
//!
//! - `schema`: entity types, schema nodes, alias keys
//! - `store`: the normalized entity store
//! - `materialized`: the output tree
//! - `config`: denormalization settings
//! - `selector`: the memoized denormalizer

pub mod alias;
pub mod config;
pub mod driver;
pub mod error;
pub mod materialized;
pub mod plan;
pub mod prune;
pub mod schema;
pub mod selector;
pub mod store;
pub mod traverse;

// Re-export key types
pub use alias::{apply_aliases, AliasTable};
pub use config::{DenormalizeConfig, MissingEntityPolicy};
pub use driver::{denormalize, Denormalizer};
pub use error::{DenormError, Result};
pub use materialized::Materialized;
pub use pathdenorm_paths::{parse_paths, Path, PathParseError};
pub use prune::{prune, PrunedSchema};
pub use schema::{AliasKey, Discriminator, EntityRef, EntityType, Schema, SubSchema};
pub use selector::{create_selector, Selector};
pub use store::EntityStore;
