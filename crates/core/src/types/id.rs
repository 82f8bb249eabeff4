//! Newtype IDs for type-safe entity references.
//!
//! Catalog, commerce, forum and news rows use `SERIAL` keys and get an `i32`
//! newtype from [`define_id!`]. Users are keyed by UUID, see [`UserId`].

use core::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Macro to define a type-safe ID wrapper around an `i32` key.
///
/// Creates a newtype with:
/// - `Serialize`/`Deserialize` with `#[serde(transparent)]`
/// - `Debug`, `Clone`, `Copy`, `PartialEq`, `Eq`, `Hash`, `PartialOrd`, `Ord`
/// - `new()` and `as_i32()`
/// - `From<i32>` both ways
/// - `sqlx` `Type`, `Encode` and `Decode` (with the `postgres` feature)
///
/// # Example
///
/// ```rust
/// # use discvault_core::define_id;
/// define_id!(WidgetId);
/// define_id!(GadgetId);
///
/// let widget = WidgetId::new(1);
/// let gadget = GadgetId::new(1);
///
/// assert_eq!(widget.as_i32(), gadget.as_i32());
/// // But they are different types, so this won't compile:
/// // let _: WidgetId = gadget;
/// ```
#[macro_export]
macro_rules! define_id {
    ($name:ident) => {
        #[derive(
            Debug,
            Clone,
            Copy,
            PartialEq,
            Eq,
            Hash,
            PartialOrd,
            Ord,
            ::serde::Serialize,
            ::serde::Deserialize
        )]
        #[serde(transparent)]
        pub struct $name(i32);

        impl $name {
            /// Create a new ID from an i32 value.
            #[must_use]
            pub const fn new(id: i32) -> Self {
                Self(id)
            }

            /// Get the underlying i32 value.
            #[must_use]
            pub const fn as_i32(&self) -> i32 {
                self.0
            }
        }

        impl ::core::fmt::Display for $name {
            fn fmt(&self, f: &mut ::core::fmt::Formatter<'_>) -> ::core::fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<i32> for $name {
            fn from(id: i32) -> Self {
                Self(id)
            }
        }

        impl From<$name> for i32 {
            fn from(id: $name) -> Self {
                id.0
            }
        }

        #[cfg(feature = "postgres")]
        impl ::sqlx::Type<::sqlx::Postgres> for $name {
            fn type_info() -> ::sqlx::postgres::PgTypeInfo {
                <i32 as ::sqlx::Type<::sqlx::Postgres>>::type_info()
            }

            fn compatible(ty: &::sqlx::postgres::PgTypeInfo) -> bool {
                <i32 as ::sqlx::Type<::sqlx::Postgres>>::compatible(ty)
            }
        }

        #[cfg(feature = "postgres")]
        impl<'r> ::sqlx::Decode<'r, ::sqlx::Postgres> for $name {
            fn decode(
                value: ::sqlx::postgres::PgValueRef<'r>,
            ) -> ::core::result::Result<Self, ::sqlx::error::BoxDynError> {
                let id = <i32 as ::sqlx::Decode<::sqlx::Postgres>>::decode(value)?;
                Ok(Self(id))
            }
        }

        #[cfg(feature = "postgres")]
        impl ::sqlx::Encode<'_, ::sqlx::Postgres> for $name {
            fn encode_by_ref(
                &self,
                buf: &mut ::sqlx::postgres::PgArgumentBuffer,
            ) -> ::std::result::Result<::sqlx::encode::IsNull, ::sqlx::error::BoxDynError> {
                <i32 as ::sqlx::Encode<::sqlx::Postgres>>::encode_by_ref(&self.0, buf)
            }
        }
    };
}

// Catalog
define_id!(ProductId);
define_id!(CategoryId);
define_id!(GenreId);
define_id!(CreatorId);
define_id!(PromotionId);
define_id!(HighlightId);

// Commerce
define_id!(CartItemId);
define_id!(OrderId);
define_id!(OrderItemId);
define_id!(ReviewId);
define_id!(CollectionId);

// Forum
define_id!(ChannelId);
define_id!(PostId);
define_id!(CommentId);

// News
define_id!(NewsId);
define_id!(TagId);
define_id!(AuthorId);

/// User identifier.
///
/// Users are keyed by a UUID assigned at registration rather than a serial
/// integer, so ids can be handed to the frontend without leaking user counts.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[cfg_attr(feature = "postgres", derive(sqlx::Type), sqlx(transparent))]
#[serde(transparent)]
pub struct UserId(Uuid);

impl UserId {
    /// Wrap an existing UUID.
    #[must_use]
    pub const fn new(id: Uuid) -> Self {
        Self(id)
    }

    /// Generate a fresh random user id.
    #[must_use]
    pub fn generate() -> Self {
        Self(Uuid::new_v4())
    }

    /// Get the underlying UUID.
    #[must_use]
    pub const fn as_uuid(&self) -> Uuid {
        self.0
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<Uuid> for UserId {
    fn from(id: Uuid) -> Self {
        Self(id)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_int_id_roundtrips_through_json_as_number() {
        let id = ProductId::new(42);
        assert_eq!(serde_json::to_string(&id).unwrap(), "42");

        let parsed: ProductId = serde_json::from_str("42").unwrap();
        assert_eq!(parsed, id);
        assert_eq!(i32::from(parsed), 42);
    }

    #[test]
    fn test_user_id_serializes_as_uuid_string() {
        let uuid = Uuid::new_v4();
        let id = UserId::new(uuid);
        assert_eq!(
            serde_json::to_string(&id).unwrap(),
            format!("\"{uuid}\"")
        );
        assert_eq!(id.to_string(), uuid.to_string());
    }

    #[test]
    fn test_generated_user_ids_differ() {
        assert_ne!(UserId::generate(), UserId::generate());
    }
}
