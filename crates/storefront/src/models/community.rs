//! Reviews, collections and forum DTOs.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;

use discvault_core::{
    ChannelId, CollectionId, CommentId, CommentNode, PostId, ProductId, Rating, RatingSummary,
    ReviewId, UserId, VoteValue,
};

// =============================================================================
// Reviews
// =============================================================================

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Review {
    pub id: ReviewId,
    pub product_id: ProductId,
    pub product_title: String,
    pub user_id: UserId,
    pub author_name: String,
    pub rating: Rating,
    pub body: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Reviews on one product plus their aggregate.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductReviews {
    pub product_id: ProductId,
    pub summary: RatingSummary,
    pub reviews: Vec<Review>,
}

// =============================================================================
// Collections
// =============================================================================

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CollectionSummary {
    pub id: CollectionId,
    pub name: String,
    pub is_default: bool,
    pub item_count: i64,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CollectionItem {
    pub product_id: ProductId,
    pub title: String,
    pub price: Decimal,
    pub image_url: Option<String>,
    pub added_at: DateTime<Utc>,
}

// =============================================================================
// Forum
// =============================================================================

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Channel {
    pub id: ChannelId,
    pub name: String,
    pub slug: String,
    pub description: String,
    pub post_count: i64,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PostSummary {
    pub id: PostId,
    pub channel_id: ChannelId,
    pub author_id: UserId,
    pub author_name: String,
    pub title: String,
    pub score: i64,
    pub comment_count: i64,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PostDetail {
    pub id: PostId,
    pub channel_id: ChannelId,
    pub channel_slug: String,
    pub author_id: UserId,
    pub author_name: String,
    pub title: String,
    pub body: String,
    pub score: i64,
    pub my_vote: Option<VoteValue>,
    pub comments: Vec<CommentNode>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Comment {
    pub id: CommentId,
    pub post_id: PostId,
    pub parent_comment_id: Option<CommentId>,
    pub author_id: UserId,
    pub body: String,
    pub created_at: DateTime<Utc>,
}

/// Score and the caller's vote after a vote toggle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VoteOutcome {
    pub score: i64,
    pub my_vote: Option<VoteValue>,
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_vote_outcome_serializes_vote_as_number() {
        let outcome = VoteOutcome {
            score: -1,
            my_vote: Some(VoteValue::Down),
        };
        let json = serde_json::to_value(outcome).unwrap();
        assert_eq!(json["score"], -1);
        assert_eq!(json["myVote"], -1);

        let cleared = VoteOutcome {
            score: 0,
            my_vote: None,
        };
        assert!(serde_json::to_value(cleared).unwrap()["myVote"].is_null());
    }
}
