//! Username type.

use core::fmt;

use serde::{Deserialize, Serialize};

/// Errors that can occur when parsing a [`Username`].
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum UsernameError {
    #[error("username must be between {min} and {max} characters")]
    Length { min: usize, max: usize },
    #[error("username may only contain letters, digits, '.', '_' and '-'")]
    InvalidCharacter,
    #[error("username cannot contain '@'")]
    LooksLikeEmail,
}

/// A public account handle.
///
/// Case is preserved for display; uniqueness is enforced case-insensitively
/// by the database.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "postgres", derive(sqlx::Type), sqlx(transparent))]
#[serde(transparent)]
pub struct Username(String);

impl Username {
    pub const MIN_LENGTH: usize = 3;
    pub const MAX_LENGTH: usize = 32;

    /// Parse a `Username`, trimming surrounding whitespace.
    ///
    /// # Errors
    ///
    /// Returns a [`UsernameError`] if the input is too short or long or has
    /// characters outside `[A-Za-z0-9._-]`.
    pub fn parse(s: &str) -> Result<Self, UsernameError> {
        let trimmed = s.trim();
        let len = trimmed.chars().count();
        if !(Self::MIN_LENGTH..=Self::MAX_LENGTH).contains(&len) {
            return Err(UsernameError::Length {
                min: Self::MIN_LENGTH,
                max: Self::MAX_LENGTH,
            });
        }
        // '@' gets its own error so login-by-email stays unambiguous
        if trimmed.contains('@') {
            return Err(UsernameError::LooksLikeEmail);
        }
        if !trimmed
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-'))
        {
            return Err(UsernameError::InvalidCharacter);
        }
        Ok(Self(trimmed.to_owned()))
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Username {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for Username {
    fn as_ref(&self) -> &str {
        &self.0
    }
}
