//! Collection naming rules.
//!
//! Every account owns two built-in collections, created at registration.
//! They can hold items like any other collection but cannot be renamed or
//! deleted, and no user collection may take their names.

use core::fmt;

use serde::{Deserialize, Serialize};

/// Name of the built-in favorites collection.
pub const FAVORITES: &str = "Favorites";

/// Name of the built-in "watch / listen / play again" collection.
pub const LOOK_AGAIN: &str = "Look Again";

/// Built-in collections, in display order.
pub const BUILT_IN: [&str; 2] = [FAVORITES, LOOK_AGAIN];

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum CollectionNameError {
    #[error("collection name cannot be empty")]
    Empty,
    #[error("collection name must be at most {max} characters")]
    TooLong { max: usize },
    #[error("'{0}' is a built-in collection")]
    Reserved(String),
    #[error("built-in collection '{0}' cannot be renamed or deleted")]
    BuiltIn(String),
}

/// A validated user collection name.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(transparent)]
pub struct CollectionName(String);

impl CollectionName {
    pub const MAX_LENGTH: usize = 64;

    /// Parse a name for a collection the user is creating or renaming to.
    ///
    /// # Errors
    ///
    /// Returns [`CollectionNameError::Reserved`] when the name matches a
    /// built-in collection (case-insensitively), or a length error.
    pub fn parse(s: &str) -> Result<Self, CollectionNameError> {
        let trimmed = s.trim();
        if trimmed.is_empty() {
            return Err(CollectionNameError::Empty);
        }
        if trimmed.chars().count() > Self::MAX_LENGTH {
            return Err(CollectionNameError::TooLong {
                max: Self::MAX_LENGTH,
            });
        }
        if is_built_in(trimmed) {
            return Err(CollectionNameError::Reserved(trimmed.to_owned()));
        }
        Ok(Self(trimmed.to_owned()))
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CollectionName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Whether `name` refers to a built-in collection.
#[must_use]
pub fn is_built_in(name: &str) -> bool {
    let name = name.trim();
    BUILT_IN.iter().any(|b| b.eq_ignore_ascii_case(name))
}

/// Guard for rename and delete.
///
/// # Errors
///
/// Returns [`CollectionNameError::BuiltIn`] for built-in collections.
pub fn ensure_mutable(name: &str) -> Result<(), CollectionNameError> {
    if is_built_in(name) {
        return Err(CollectionNameError::BuiltIn(name.trim().to_owned()));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_trims() {
        let name = CollectionName::parse("  Road Trip Albums ").map(|n| n.as_str().to_owned());
        assert_eq!(name.as_deref(), Ok("Road Trip Albums"));
    }

    #[test]
    fn test_parse_rejects_built_in_names_any_case() {
        assert_eq!(
            CollectionName::parse("favorites"),
            Err(CollectionNameError::Reserved("favorites".to_owned()))
        );
        assert!(matches!(
            CollectionName::parse("LOOK AGAIN"),
            Err(CollectionNameError::Reserved(_))
        ));
    }

    #[test]
    fn test_parse_length() {
        assert_eq!(CollectionName::parse("   "), Err(CollectionNameError::Empty));
        assert!(matches!(
            CollectionName::parse(&"x".repeat(65)),
            Err(CollectionNameError::TooLong { max: 64 })
        ));
    }

    #[test]
    fn test_built_ins_are_immutable() {
        assert!(ensure_mutable(FAVORITES).is_err());
        assert!(ensure_mutable("look again").is_err());
        assert!(ensure_mutable("Horror Night").is_ok());
    }
}
