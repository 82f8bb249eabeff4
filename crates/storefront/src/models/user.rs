//! Account types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use discvault_core::{Email, Role, UserId, Username};

/// A storefront account. The password hash never leaves the repository.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: UserId,
    pub username: Username,
    pub email: Email,
    pub role: Role,
    #[serde(flatten)]
    pub profile: Profile,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Editable profile fields. Every field is optional.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Profile {
    pub display_name: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub phone: Option<String>,
    pub address: Option<String>,
    pub city: Option<String>,
    pub country: Option<String>,
    pub postal_code: Option<String>,
}

impl Profile {
    /// Maximum length of any single profile field.
    pub const MAX_FIELD_LENGTH: usize = 200;

    /// Trim every field and turn blanks into `None`.
    #[must_use]
    pub fn normalized(self) -> Self {
        fn clean(value: Option<String>) -> Option<String> {
            value
                .map(|v| v.trim().to_owned())
                .filter(|v| !v.is_empty())
        }

        Self {
            display_name: clean(self.display_name),
            first_name: clean(self.first_name),
            last_name: clean(self.last_name),
            phone: clean(self.phone),
            address: clean(self.address),
            city: clean(self.city),
            country: clean(self.country),
            postal_code: clean(self.postal_code),
        }
    }

    /// Name of the first field longer than [`Self::MAX_FIELD_LENGTH`].
    #[must_use]
    pub fn oversized_field(&self) -> Option<&'static str> {
        [
            ("displayName", &self.display_name),
            ("firstName", &self.first_name),
            ("lastName", &self.last_name),
            ("phone", &self.phone),
            ("address", &self.address),
            ("city", &self.city),
            ("country", &self.country),
            ("postalCode", &self.postal_code),
        ]
        .into_iter()
        .find(|(_, v)| {
            v.as_ref()
                .is_some_and(|s| s.chars().count() > Self::MAX_FIELD_LENGTH)
        })
        .map(|(name, _)| name)
    }
}

impl User {
    /// Name shown next to reviews, posts and comments.
    #[must_use]
    pub fn public_name(&self) -> &str {
        self.profile
            .display_name
            .as_deref()
            .unwrap_or_else(|| self.username.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_profile_normalized() {
        let profile = Profile {
            display_name: Some("  Ana ".to_string()),
            city: Some("   ".to_string()),
            ..Profile::default()
        }
        .normalized();

        assert_eq!(profile.display_name.as_deref(), Some("Ana"));
        assert_eq!(profile.city, None);
    }

    #[test]
    fn test_profile_oversized_field() {
        let profile = Profile {
            address: Some("x".repeat(Profile::MAX_FIELD_LENGTH + 1)),
            ..Profile::default()
        };
        assert_eq!(profile.oversized_field(), Some("address"));
        assert_eq!(Profile::default().oversized_field(), None);
    }
}
