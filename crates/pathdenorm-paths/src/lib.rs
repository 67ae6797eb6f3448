//! Relation paths for path-scoped denormalization.
//!
//! A path names one traversal route through a relation schema, as an ordered
//! list of relation names (`["partner", "pet", "owners"]`). A segment may
//! carry a `(Variant)` suffix to select one branch of a polymorphic relation
//! (`"pets(cat)"`).
//!
//! This crate provides:
//! - `path`: the `Path` value type and segment helpers
//! - `matcher`: the prefix test deciding whether a relation stays expanded
//! - `grammar`: a small textual syntax (`"[pet, partner.[pet, owners]]"`)
//!   that expands into a list of paths

pub mod grammar;
pub mod matcher;
pub mod path;

pub use grammar::{format_paths, parse_paths, PathParseError};
pub use matcher::{matches, relation_name, retains};
pub use path::Path;
