//! Relation schemas.
//!
//! Relation graphs are routinely cyclic (`people.partner -> people`), so a
//! `Schema` is a registry of `EntityType`s plus a root `SubSchema`; entity
//! references name registry entries instead of embedding them.
//!
//! Schemas are plain immutable values. Pruning builds a new `Schema` whose
//! registry also holds *aliased* entity types, one per path at which an
//! entity type stays expanded (see `prune`).

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use pathdenorm_paths::Path;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Value;

use crate::error::{DenormError, Result};
use crate::store::id_key;

pub const DEFAULT_ID_ATTRIBUTE: &str = "id";

fn default_id_attribute() -> String {
    DEFAULT_ID_ATTRIBUTE.to_string()
}

// ============================================================================
// Alias keys and entity references
// ============================================================================

/// Per-path name for an entity type: `"<entity>:<path joined by '.'>"`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct AliasKey {
    entity: String,
    path: Path,
}

impl AliasKey {
    pub fn new(entity: impl Into<String>, path: Path) -> Self {
        Self {
            entity: entity.into(),
            path,
        }
    }

    /// The real entity type this alias stands for.
    pub fn entity(&self) -> &str {
        &self.entity
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl fmt::Display for AliasKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.entity, self.path.dotted())
    }
}

impl FromStr for AliasKey {
    type Err = DenormError;

    fn from_str(s: &str) -> Result<Self> {
        match s.split_once(':') {
            Some((entity, path)) if !entity.is_empty() && !path.is_empty() => Ok(Self::new(
                entity,
                path.split('.').collect::<Path>(),
            )),
            _ => Err(DenormError::InvalidAlias(s.to_string())),
        }
    }
}

impl Serialize for AliasKey {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for AliasKey {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

/// A reference from a relation to an entity type.
///
/// Serialized as the registry key: `"people"` or `"people:partner.pet"`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum EntityRef {
    Direct(String),
    Aliased(AliasKey),
}

impl EntityRef {
    /// The real entity type, i.e. the store bucket holding its records.
    pub fn entity(&self) -> &str {
        match self {
            Self::Direct(key) => key,
            Self::Aliased(alias) => alias.entity(),
        }
    }

    pub fn registry_key(&self) -> String {
        match self {
            Self::Direct(key) => key.clone(),
            Self::Aliased(alias) => alias.to_string(),
        }
    }
}

impl Serialize for EntityRef {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.registry_key())
    }
}

impl<'de> Deserialize<'de> for EntityRef {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        if raw.contains(':') {
            raw.parse()
                .map(Self::Aliased)
                .map_err(serde::de::Error::custom)
        } else {
            Ok(Self::Direct(raw))
        }
    }
}

// ============================================================================
// Discriminators
// ============================================================================

pub type TagFn = Arc<dyn Fn(&Value) -> Option<String> + Send + Sync>;

/// Picks the variant of a polymorphic value.
///
/// Normalized stubs carry their variant explicitly (`{ "id": 12, "schema": "cat" }`),
/// so the discriminator only decides for values stored inline.
#[derive(Clone)]
pub enum Discriminator {
    /// Read the tag from a field of the value.
    Field(String),
    /// Compute the tag. Not serializable.
    Function(TagFn),
}

impl Discriminator {
    pub fn function<F>(f: F) -> Self
    where
        F: Fn(&Value) -> Option<String> + Send + Sync + 'static,
    {
        Self::Function(Arc::new(f))
    }

    pub fn tag_of(&self, value: &Value) -> Option<String> {
        match self {
            Self::Field(field) => value.get(field).and_then(id_key),
            Self::Function(f) => f(value),
        }
    }
}

impl fmt::Debug for Discriminator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Field(field) => f.debug_tuple("Field").field(field).finish(),
            Self::Function(_) => f.write_str("Function(..)"),
        }
    }
}

impl PartialEq for Discriminator {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Field(a), Self::Field(b)) => a == b,
            (Self::Function(a), Self::Function(b)) => Arc::ptr_eq(a, b),
            _ => false,
        }
    }
}

impl From<&str> for Discriminator {
    fn from(field: &str) -> Self {
        Self::Field(field.to_string())
    }
}

impl Serialize for Discriminator {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        match self {
            Self::Field(field) => serializer.serialize_str(field),
            Self::Function(_) => Err(serde::ser::Error::custom(
                "function discriminators cannot be serialized",
            )),
        }
    }
}

impl<'de> Deserialize<'de> for Discriminator {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        String::deserialize(deserializer).map(Self::Field)
    }
}

// ============================================================================
// Schema nodes
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Variants {
    pub variants: BTreeMap<String, SubSchema>,
    pub discriminator: Discriminator,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Members {
    Single(Box<SubSchema>),
    Polymorphic(Variants),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubSchema {
    Entity(EntityRef),
    Array(Box<SubSchema>),
    PolymorphicArray(Variants),
    Union(Variants),
    Object(BTreeMap<String, SubSchema>),
    Values(Members),
}

fn variants<K, I>(variants: I, discriminator: impl Into<Discriminator>) -> Variants
where
    K: Into<String>,
    I: IntoIterator<Item = (K, SubSchema)>,
{
    Variants {
        variants: variants.into_iter().map(|(k, v)| (k.into(), v)).collect(),
        discriminator: discriminator.into(),
    }
}

impl SubSchema {
    pub fn entity(key: impl Into<String>) -> Self {
        Self::Entity(EntityRef::Direct(key.into()))
    }

    pub fn array(inner: SubSchema) -> Self {
        Self::Array(Box::new(inner))
    }

    pub fn polymorphic_array<K, I>(members: I, discriminator: impl Into<Discriminator>) -> Self
    where
        K: Into<String>,
        I: IntoIterator<Item = (K, SubSchema)>,
    {
        Self::PolymorphicArray(variants(members, discriminator))
    }

    pub fn union<K, I>(members: I, discriminator: impl Into<Discriminator>) -> Self
    where
        K: Into<String>,
        I: IntoIterator<Item = (K, SubSchema)>,
    {
        Self::Union(variants(members, discriminator))
    }

    pub fn object<K, I>(props: I) -> Self
    where
        K: Into<String>,
        I: IntoIterator<Item = (K, SubSchema)>,
    {
        Self::Object(props.into_iter().map(|(k, v)| (k.into(), v)).collect())
    }

    pub fn values(inner: SubSchema) -> Self {
        Self::Values(Members::Single(Box::new(inner)))
    }

    pub fn polymorphic_values<K, I>(members: I, discriminator: impl Into<Discriminator>) -> Self
    where
        K: Into<String>,
        I: IntoIterator<Item = (K, SubSchema)>,
    {
        Self::Values(Members::Polymorphic(variants(members, discriminator)))
    }
}

// ============================================================================
// Entity types and the registry
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntityType {
    pub key: String,
    /// Set on the per-path copies the pruner creates.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub alias: Option<AliasKey>,
    #[serde(default = "default_id_attribute")]
    pub id_attribute: String,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub relations: BTreeMap<String, SubSchema>,
}

impl EntityType {
    pub fn new(key: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            alias: None,
            id_attribute: default_id_attribute(),
            relations: BTreeMap::new(),
        }
    }

    pub fn with_id_attribute(mut self, attribute: impl Into<String>) -> Self {
        self.id_attribute = attribute.into();
        self
    }

    pub fn relation(mut self, name: impl Into<String>, schema: SubSchema) -> Self {
        self.relations.insert(name.into(), schema);
        self
    }

    /// Key under which this type is registered (and under which the aliased
    /// store exposes its bucket).
    pub fn registry_key(&self) -> String {
        match &self.alias {
            Some(alias) => alias.to_string(),
            None => self.key.clone(),
        }
    }

    /// Id of a raw record of this type.
    pub fn id_of(&self, record: &Value) -> Option<String> {
        record.get(&self.id_attribute).and_then(id_key)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Schema {
    pub root: SubSchema,
    #[serde(with = "entity_list")]
    entities: BTreeMap<String, EntityType>,
}

impl Schema {
    pub fn new(root: SubSchema) -> Self {
        Self {
            root,
            entities: BTreeMap::new(),
        }
    }

    /// Register (or replace) an entity type.
    pub fn define(mut self, entity: EntityType) -> Self {
        self.entities.insert(entity.registry_key(), entity);
        self
    }

    /// Same registry, different root shape (`people` vs `[people]`).
    pub fn with_root(&self, root: SubSchema) -> Self {
        Self {
            root,
            entities: self.entities.clone(),
        }
    }

    pub fn entity(&self, registry_key: &str) -> Result<&EntityType> {
        self.entities
            .get(registry_key)
            .ok_or_else(|| DenormError::UnknownEntity {
                key: registry_key.to_string(),
            })
    }

    pub fn entities(&self) -> impl Iterator<Item = &EntityType> {
        self.entities.values()
    }

    pub fn from_json(value: Value) -> Result<Self> {
        Ok(serde_json::from_value(value)?)
    }

    pub(crate) fn from_parts(root: SubSchema, entities: BTreeMap<String, EntityType>) -> Self {
        Self { root, entities }
    }
}

/// The registry serializes as a list; map keys are recomputed on load.
mod entity_list {
    use super::EntityType;
    use serde::{Deserialize, Deserializer, Serializer};
    use std::collections::BTreeMap;

    pub fn serialize<S: Serializer>(
        entities: &BTreeMap<String, EntityType>,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        serializer.collect_seq(entities.values())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<BTreeMap<String, EntityType>, D::Error> {
        let list = Vec::<EntityType>::deserialize(deserializer)?;
        Ok(list
            .into_iter()
            .map(|entity| (entity.registry_key(), entity))
            .collect())
    }
}
