//! Denormalization settings.

use serde::{Deserialize, Serialize};

/// What to put in place of a reference whose entity is absent from the store.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MissingEntityPolicy {
    /// Leave the raw id in place.
    #[default]
    KeepReference,
    /// Replace the reference with `null`.
    Null,
    /// Fail the whole call with `DenormError::MissingEntity`.
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct DenormalizeConfig {
    pub missing_entity: MissingEntityPolicy,
    /// Field of a normalized polymorphic stub (`{ "id": 12, "schema": "cat" }`)
    /// that names its variant.
    pub variant_tag_field: String,
}

impl Default for DenormalizeConfig {
    fn default() -> Self {
        Self {
            missing_entity: MissingEntityPolicy::KeepReference,
            variant_tag_field: "schema".to_string(),
        }
    }
}
