//! Core type definitions with validation.

use std::fmt;
use std::path::Path;
use std::sync::Arc;

use thiserror::Error;

/// Validation errors for core types.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ValidationError {
    /// The provided value was empty.
    #[error("{field} cannot be empty")]
    Empty { field: &'static str },

    /// A path had no usable file stem.
    #[error("cannot derive a source tag from {path}")]
    NoFileStem { path: String },
}

/// Identifies the file a log line came from.
///
/// Derived from the file name minus its extension (`daemon.txt` → `daemon`)
/// and shared by every line of that file, so clones are reference-counted.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SourceTag(Arc<str>);

impl SourceTag {
    /// Creates a new tag after validation.
    pub fn new(tag: impl AsRef<str>) -> Result<Self, ValidationError> {
        let tag = tag.as_ref();
        if tag.is_empty() {
            return Err(ValidationError::Empty {
                field: "source tag",
            });
        }
        Ok(Self(Arc::from(tag)))
    }

    /// Derives the tag from a file path's stem.
    pub fn from_path(path: &Path) -> Result<Self, ValidationError> {
        let stem = path
            .file_stem()
            .and_then(|s| s.to_str())
            .ok_or_else(|| ValidationError::NoFileStem {
                path: path.display().to_string(),
            })?;
        Self::new(stem)
    }

    /// Returns the tag as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<&str> for SourceTag {
    type Error = ValidationError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl TryFrom<String> for SourceTag {
    type Error = ValidationError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl fmt::Display for SourceTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for SourceTag {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl PartialEq<str> for SourceTag {
    fn eq(&self, other: &str) -> bool {
        &*self.0 == other
    }
}

impl PartialEq<&str> for SourceTag {
    fn eq(&self, other: &&str) -> bool {
        &*self.0 == *other
    }
}
