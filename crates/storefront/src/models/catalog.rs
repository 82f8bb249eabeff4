//! Catalog DTOs: categories, genres, creators, products, promotions and
//! highlights.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;

use discvault_core::pricing::discounted_price;
use discvault_core::{
    CategoryId, CategoryKind, CreatorId, CreatorKind, GenreId, HighlightId, ProductId,
    PromotionId, RatingSummary,
};

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Category {
    pub id: CategoryId,
    pub name: String,
    pub slug: String,
    pub kind: CategoryKind,
    /// Label for the creator credited on this category's products.
    pub creator_kind: CreatorKind,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Genre {
    pub id: GenreId,
    pub category_id: CategoryId,
    pub name: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Creator {
    pub id: CreatorId,
    pub name: String,
    pub kind: CreatorKind,
    pub bio: Option<String>,
    pub image_url: Option<String>,
}

/// Creator as embedded in a product summary.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreatorRef {
    pub id: CreatorId,
    pub name: String,
    pub kind: CreatorKind,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Promotion {
    pub id: PromotionId,
    pub product_id: ProductId,
    pub discount_percent: i32,
    pub starts_at: DateTime<Utc>,
    pub ends_at: DateTime<Utc>,
}

/// The promotion currently running on a product, with the resulting price.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ActivePromotion {
    pub id: PromotionId,
    pub discount_percent: i32,
    pub ends_at: DateTime<Utc>,
    pub discounted_price: Decimal,
}

impl ActivePromotion {
    #[must_use]
    pub fn new(id: PromotionId, discount_percent: i32, ends_at: DateTime<Utc>, price: Decimal) -> Self {
        Self {
            id,
            discount_percent,
            ends_at,
            discounted_price: discounted_price(price, discount_percent),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Highlight {
    pub id: HighlightId,
    pub category_id: CategoryId,
    pub title: String,
    pub image_url: String,
    pub link_url: Option<String>,
    pub position: i32,
}

/// One row of a product listing.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductSummary {
    pub id: ProductId,
    pub title: String,
    pub category_id: CategoryId,
    pub creator: Option<CreatorRef>,
    pub price: Decimal,
    pub stock: i32,
    pub in_stock: bool,
    pub release_year: Option<i16>,
    pub image_url: Option<String>,
    pub promotion: Option<ActivePromotion>,
    pub average_rating: Option<f64>,
    pub review_count: i64,
}

/// Full product page.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductDetail {
    pub id: ProductId,
    pub title: String,
    pub description: String,
    pub category: Category,
    pub creator: Option<Creator>,
    pub genres: Vec<Genre>,
    pub price: Decimal,
    pub stock: i32,
    pub in_stock: bool,
    pub release_year: Option<i16>,
    pub image_url: Option<String>,
    pub promotion: Option<ActivePromotion>,
    pub rating: RatingSummary,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Validated product fields for create and update.
#[derive(Debug, Clone)]
pub struct ProductDraft {
    pub category_id: CategoryId,
    pub creator_id: Option<CreatorId>,
    pub title: String,
    pub description: String,
    pub price: Decimal,
    pub stock: i32,
    pub release_year: Option<i16>,
    pub image_url: Option<String>,
    pub genre_ids: Vec<GenreId>,
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_active_promotion_price() {
        let promo = ActivePromotion::new(PromotionId::new(1), 20, Utc::now(), Decimal::new(2500, 2));
        assert_eq!(promo.discounted_price, Decimal::new(2000, 2));

        let json = serde_json::to_value(&promo).unwrap();
        assert_eq!(json["discountPercent"], 20);
        assert_eq!(json["discountedPrice"], "20.00");
    }
}
