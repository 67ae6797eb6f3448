//! Input documents for `pathdenorm denormalize`.
//!
//! ```json
//! {
//!   "schema":   { "root": ..., "entities": [...] },
//!   "entities": { "<type>": { "<id>": { ... } } },
//!   "result":   [21, 22],
//!   "paths":    "[pet, partner.pet]",
//!   "config":   { "missing_entity": "null" }
//! }
//! ```
//!
//! `paths` is either a path expression or a list of segment lists. Leaving it
//! out follows the schema unpruned.

use std::fs;
use std::path::Path as FsPath;

use anyhow::{Context, Result};
use pathdenorm_core::{DenormalizeConfig, EntityStore, Schema};
use pathdenorm_paths::{parse_paths, Path};
use serde::Deserialize;
use serde_json::Value;

#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum PathsSpec {
    Expr(String),
    List(Vec<Path>),
}

impl PathsSpec {
    pub fn resolve(self) -> Result<Vec<Path>> {
        match self {
            Self::Expr(expr) => parse_paths(&expr).with_context(|| format!("parsing paths `{expr}`")),
            Self::List(paths) => Ok(paths),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Document {
    pub schema: Schema,
    pub entities: Value,
    pub result: Value,
    #[serde(default)]
    pub paths: Option<PathsSpec>,
    #[serde(default)]
    pub config: DenormalizeConfig,
}

impl Document {
    pub fn load(path: &FsPath) -> Result<Self> {
        let text = fs::read_to_string(path)
            .with_context(|| format!("reading {}", path.display()))?;
        serde_json::from_str(&text).with_context(|| format!("parsing {}", path.display()))
    }

    pub fn store(&self) -> Result<EntityStore> {
        EntityStore::from_json(&self.entities).context("loading `entities`")
    }
}

pub fn load_schema(path: &FsPath) -> Result<Schema> {
    let text = fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
    let value: Value =
        serde_json::from_str(&text).with_context(|| format!("parsing {}", path.display()))?;
    Schema::from_json(value).with_context(|| format!("loading schema from {}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn paths_accept_both_forms() {
        let expr: PathsSpec = serde_json::from_value(json!("[pet, partner.pet]")).expect("expr");
        let list: PathsSpec =
            serde_json::from_value(json!([["pet"], ["partner", "pet"]])).expect("list");
        assert_eq!(expr.resolve().expect("resolve"), list.resolve().expect("resolve"));
    }

    #[test]
    fn document_defaults_paths_and_config() {
        let doc: Document = serde_json::from_value(json!({
            "schema": { "root": { "entity": "people" }, "entities": [{ "key": "people" }] },
            "entities": { "people": { "1": { "id": 1 } } },
            "result": 1
        }))
        .expect("parse document");

        assert!(doc.paths.is_none());
        assert_eq!(doc.config, DenormalizeConfig::default());
        assert!(doc.store().expect("store").record("people", "1").is_some());
    }
}
