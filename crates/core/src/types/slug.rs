//! URL slugs for news articles, tags, authors, channels and categories.

use core::fmt;

use serde::{Deserialize, Serialize};

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum SlugError {
    #[error("slug cannot be empty")]
    Empty,
    #[error("slug must be at most {max} characters")]
    TooLong { max: usize },
    #[error("slug may only contain lowercase letters, digits and single hyphens")]
    Invalid,
}

/// A lowercase, hyphen-separated identifier usable in a URL path.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "postgres", derive(sqlx::Type), sqlx(transparent))]
#[serde(transparent)]
pub struct Slug(String);

impl Slug {
    pub const MAX_LENGTH: usize = 120;

    /// Derive a slug from free text such as an article title.
    ///
    /// Runs of non-alphanumeric characters collapse into a single hyphen.
    ///
    /// ```
    /// use discvault_core::Slug;
    ///
    /// let slug = Slug::from_title("Top 10 Sci-Fi DVDs of 2024!").unwrap();
    /// assert_eq!(slug.as_str(), "top-10-sci-fi-dvds-of-2024");
    /// ```
    ///
    /// # Errors
    ///
    /// Returns [`SlugError::Empty`] if the text has no ASCII alphanumerics.
    pub fn from_title(title: &str) -> Result<Self, SlugError> {
        let mut slug = String::with_capacity(title.len());
        let mut pending_hyphen = false;

        for c in title.chars() {
            if c.is_ascii_alphanumeric() {
                if pending_hyphen && !slug.is_empty() {
                    slug.push('-');
                }
                pending_hyphen = false;
                slug.push(c.to_ascii_lowercase());
            } else {
                pending_hyphen = true;
            }
        }

        if slug.is_empty() {
            return Err(SlugError::Empty);
        }
        if slug.len() > Self::MAX_LENGTH {
            slug.truncate(Self::MAX_LENGTH);
            while slug.ends_with('-') {
                slug.pop();
            }
        }
        Ok(Self(slug))
    }

    /// Accept an already-formed slug, e.g. from a URL path.
    ///
    /// # Errors
    ///
    /// Returns a [`SlugError`] if the input is not already in slug form.
    pub fn parse(s: &str) -> Result<Self, SlugError> {
        if s.is_empty() {
            return Err(SlugError::Empty);
        }
        if s.len() > Self::MAX_LENGTH {
            return Err(SlugError::TooLong {
                max: Self::MAX_LENGTH,
            });
        }
        let well_formed = s
            .split('-')
            .all(|part| !part.is_empty() && part.chars().all(|c| c.is_ascii_lowercase() || c.is_ascii_digit()));
        if !well_formed {
            return Err(SlugError::Invalid);
        }
        Ok(Self(s.to_owned()))
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    #[must_use]
    pub fn into_inner(self) -> String {
        self.0
    }
}

impl fmt::Display for Slug {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_from_title_collapses_separators() {
        assert_eq!(
            Slug::from_title("  The Matrix -- Reloaded  ").unwrap().as_str(),
            "the-matrix-reloaded"
        );
        assert_eq!(Slug::from_title("Ünïcode Rock").unwrap().as_str(), "n-code-rock");
    }

    #[test]
    fn test_from_title_empty() {
        assert_eq!(Slug::from_title("!!!"), Err(SlugError::Empty));
    }

    #[test]
    fn test_from_title_truncates_without_trailing_hyphen() {
        let title = format!("{} tail", "a".repeat(Slug::MAX_LENGTH));
        let slug = Slug::from_title(&title).unwrap();
        assert_eq!(slug.as_str().len(), Slug::MAX_LENGTH);
        assert!(!slug.as_str().ends_with('-'));
    }

    #[test]
    fn test_parse_requires_slug_form() {
        assert!(Slug::parse("release-news-2024").is_ok());
        assert_eq!(Slug::parse("Upper-Case"), Err(SlugError::Invalid));
        assert_eq!(Slug::parse("double--hyphen"), Err(SlugError::Invalid));
        assert_eq!(Slug::parse("-leading"), Err(SlugError::Invalid));
        assert_eq!(Slug::parse(""), Err(SlugError::Empty));
    }
}
