use pathdenorm_paths::PathParseError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum DenormError {
    #[error("schema references unknown entity type `{key}`")]
    UnknownEntity { key: String },

    #[error("polymorphic value tagged `{tag}` matches none of the declared variants [{expected}]")]
    UnknownVariant { tag: String, expected: String },

    #[error("entity type `{entity}` has no record with id `{id}`")]
    MissingEntity { entity: String, id: String },

    #[error("invalid alias key `{0}` (expected `<entity>:<path>`)")]
    InvalidAlias(String),

    #[error("invalid entity store: {0}")]
    InvalidStore(String),

    #[error(transparent)]
    Paths(#[from] PathParseError),

    #[error("invalid schema: {0}")]
    InvalidSchema(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, DenormError>;
