//! Status and kind enums shared by the storefront and CLI.

use serde::{Deserialize, Serialize};

/// Account role.
///
/// `Admin` gates catalog, news and order-status mutations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[cfg_attr(feature = "postgres", derive(sqlx::Type))]
#[cfg_attr(
    feature = "postgres",
    sqlx(type_name = "store.user_role", rename_all = "snake_case")
)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    #[default]
    User,
    Admin,
}

impl Role {
    #[must_use]
    pub const fn is_admin(self) -> bool {
        matches!(self, Self::Admin)
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::User => write!(f, "user"),
            Self::Admin => write!(f, "admin"),
        }
    }
}

impl std::str::FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "user" => Ok(Self::User),
            "admin" => Ok(Self::Admin),
            _ => Err(format!("invalid role: {s}")),
        }
    }
}

/// Order lifecycle.
///
/// ```text
/// Pending -> Processing -> Shipped -> Delivered
///    |           |
///    +-----------+--> Cancelled
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[cfg_attr(feature = "postgres", derive(sqlx::Type))]
#[cfg_attr(
    feature = "postgres",
    sqlx(type_name = "store.order_status", rename_all = "snake_case")
)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    #[default]
    Pending,
    Processing,
    Shipped,
    Delivered,
    Cancelled,
}

impl OrderStatus {
    /// Whether an order in this status may move to `next`.
    #[must_use]
    pub const fn can_transition_to(self, next: Self) -> bool {
        matches!(
            (self, next),
            (Self::Pending, Self::Processing | Self::Cancelled)
                | (Self::Processing, Self::Shipped | Self::Cancelled)
                | (Self::Shipped, Self::Delivered)
        )
    }

    /// Whether the customer may still cancel.
    #[must_use]
    pub const fn is_cancellable(self) -> bool {
        self.can_transition_to(Self::Cancelled)
    }
}

impl std::fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Pending => "pending",
            Self::Processing => "processing",
            Self::Shipped => "shipped",
            Self::Delivered => "delivered",
            Self::Cancelled => "cancelled",
        };
        f.write_str(s)
    }
}

/// Top-level catalog category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "postgres", derive(sqlx::Type))]
#[cfg_attr(
    feature = "postgres",
    sqlx(type_name = "store.category_kind", rename_all = "snake_case")
)]
#[serde(rename_all = "snake_case")]
pub enum CategoryKind {
    Music,
    Movie,
    Game,
}

impl CategoryKind {
    /// The kind of creator credited on products of this category.
    #[must_use]
    pub const fn creator_kind(self) -> CreatorKind {
        match self {
            Self::Music => CreatorKind::Artist,
            Self::Movie => CreatorKind::Producer,
            Self::Game => CreatorKind::Studio,
        }
    }
}

/// The party credited on a product: an artist for music, a producer for
/// movies and a studio for games.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "postgres", derive(sqlx::Type))]
#[cfg_attr(
    feature = "postgres",
    sqlx(type_name = "store.creator_kind", rename_all = "snake_case")
)]
#[serde(rename_all = "snake_case")]
pub enum CreatorKind {
    Artist,
    Producer,
    Studio,
}

impl std::str::FromStr for CreatorKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "artist" => Ok(Self::Artist),
            "producer" => Ok(Self::Producer),
            "studio" => Ok(Self::Studio),
            _ => Err(format!("invalid creator kind: {s}")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_order_status_forward_path() {
        assert!(OrderStatus::Pending.can_transition_to(OrderStatus::Processing));
        assert!(OrderStatus::Processing.can_transition_to(OrderStatus::Shipped));
        assert!(OrderStatus::Shipped.can_transition_to(OrderStatus::Delivered));
    }

    #[test]
    fn test_order_status_rejects_skips_and_reversals() {
        assert!(!OrderStatus::Pending.can_transition_to(OrderStatus::Shipped));
        assert!(!OrderStatus::Delivered.can_transition_to(OrderStatus::Pending));
        assert!(!OrderStatus::Cancelled.can_transition_to(OrderStatus::Processing));
        assert!(!OrderStatus::Pending.can_transition_to(OrderStatus::Pending));
    }

    #[test]
    fn test_cancellable_only_before_shipping() {
        assert!(OrderStatus::Pending.is_cancellable());
        assert!(OrderStatus::Processing.is_cancellable());
        assert!(!OrderStatus::Shipped.is_cancellable());
        assert!(!OrderStatus::Cancelled.is_cancellable());
    }

    #[test]
    fn test_role_parse_and_display() {
        assert_eq!("admin".parse::<Role>(), Ok(Role::Admin));
        assert_eq!(Role::User.to_string(), "user");
        assert!("root".parse::<Role>().is_err());
    }

    #[test]
    fn test_creator_kind_per_category() {
        assert_eq!(CategoryKind::Music.creator_kind(), CreatorKind::Artist);
        assert_eq!(CategoryKind::Movie.creator_kind(), CreatorKind::Producer);
        assert_eq!(CategoryKind::Game.creator_kind(), CreatorKind::Studio);
    }
}
