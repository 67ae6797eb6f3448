//! The `Path` value type.

use serde::{Deserialize, Serialize};
use std::fmt;

/// An ordered sequence of relation-name segments.
///
/// Serializes as a plain JSON array of strings, so `[["pet"], ["partner", "pet"]]`
/// deserializes straight into `Vec<Path>`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Path(Vec<String>);

impl Path {
    pub fn new() -> Self {
        Self(Vec::new())
    }

    pub fn from_segments<I, S>(segments: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self(segments.into_iter().map(Into::into).collect())
    }

    pub fn segments(&self) -> &[String] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// `self + [relation]`.
    pub fn child(&self, relation: &str) -> Self {
        let mut segments = self.0.clone();
        segments.push(relation.to_string());
        Self(segments)
    }

    /// Replace the last segment `s` with `s(tag)`.
    ///
    /// The empty path has no segment to narrow and is returned unchanged, so
    /// polymorphism at the root does not consume a path position.
    pub fn with_variant(&self, tag: &str) -> Self {
        let mut segments = self.0.clone();
        if let Some(last) = segments.pop() {
            segments.push(format!("{last}({tag})"));
        }
        Self(segments)
    }

    /// Segments joined by `.`, as used in alias keys.
    pub fn dotted(&self) -> String {
        self.0.join(".")
    }
}

impl fmt::Display for Path {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.dotted())
    }
}

impl From<Vec<String>> for Path {
    fn from(segments: Vec<String>) -> Self {
        Self(segments)
    }
}

impl<S: Into<String>, const N: usize> From<[S; N]> for Path {
    fn from(segments: [S; N]) -> Self {
        Self::from_segments(segments)
    }
}

impl<S: Into<String>> FromIterator<S> for Path {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        Self::from_segments(iter)
    }
}
