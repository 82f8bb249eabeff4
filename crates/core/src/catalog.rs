//! Catalog filtering.
//!
//! The storefront turns a `ProductFilter` into nullable SQL parameters, so
//! every field left as `None` simply does not constrain the result.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::types::{CategoryId, CreatorId, GenreId};

/// Maximum length of a free-text title search.
pub const MAX_SEARCH_LENGTH: usize = 100;

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum FilterError {
    #[error("price bounds cannot be negative")]
    NegativePrice,
    #[error("priceMin ({min}) is greater than priceMax ({max})")]
    InvertedPriceRange { min: Decimal, max: Decimal },
    #[error("minRating must be between 1 and 5")]
    RatingOutOfRange,
    #[error("search text must be at most {max} characters", max = MAX_SEARCH_LENGTH)]
    SearchTooLong,
}

/// Sort order for product listings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProductSort {
    #[default]
    Newest,
    PriceAsc,
    PriceDesc,
    Rating,
    Title,
}

impl ProductSort {
    /// ORDER BY clause for the product listing query.
    ///
    /// Columns refer to the aliases used by the storefront listing query;
    /// `p.id` is always the final tiebreaker so pagination is stable.
    #[must_use]
    pub const fn order_by(self) -> &'static str {
        match self {
            Self::Newest => "p.created_at DESC, p.id DESC",
            Self::PriceAsc => "p.price ASC, p.id ASC",
            Self::PriceDesc => "p.price DESC, p.id DESC",
            Self::Rating => "average_rating DESC NULLS LAST, review_count DESC, p.id ASC",
            Self::Title => "p.title ASC, p.id ASC",
        }
    }
}

/// Product listing filter.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProductFilter {
    pub category_id: Option<CategoryId>,
    pub creator_id: Option<CreatorId>,
    pub genre_id: Option<GenreId>,
    pub price_min: Option<Decimal>,
    pub price_max: Option<Decimal>,
    pub min_rating: Option<i16>,
    pub in_stock: Option<bool>,
    pub search: Option<String>,
    pub sort: ProductSort,
}

impl ProductFilter {
    /// Check the filter for contradictory or out-of-range bounds and
    /// normalize the search text (trimmed, blank treated as absent).
    ///
    /// # Errors
    ///
    /// Returns the first [`FilterError`] found.
    pub fn validate(mut self) -> Result<Self, FilterError> {
        if self.price_min.is_some_and(|p| p.is_sign_negative())
            || self.price_max.is_some_and(|p| p.is_sign_negative())
        {
            return Err(FilterError::NegativePrice);
        }
        if let (Some(min), Some(max)) = (self.price_min, self.price_max)
            && min > max
        {
            return Err(FilterError::InvertedPriceRange { min, max });
        }
        if self.min_rating.is_some_and(|r| !(1..=5).contains(&r)) {
            return Err(FilterError::RatingOutOfRange);
        }

        self.search = self
            .search
            .map(|s| s.trim().to_owned())
            .filter(|s| !s.is_empty());
        if self
            .search
            .as_ref()
            .is_some_and(|s| s.chars().count() > MAX_SEARCH_LENGTH)
        {
            return Err(FilterError::SearchTooLong);
        }

        Ok(self)
    }

    /// The search text as an escaped `ILIKE` pattern.
    #[must_use]
    pub fn search_pattern(&self) -> Option<String> {
        self.search.as_ref().map(|s| {
            let escaped = s
                .replace('\\', "\\\\")
                .replace('%', "\\%")
                .replace('_', "\\_");
            format!("%{escaped}%")
        })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn dec(n: i64) -> Decimal {
        Decimal::from(n)
    }

    #[test]
    fn test_price_range_validation() {
        let filter = ProductFilter {
            category_id: Some(CategoryId::new(1)),
            price_min: Some(dec(100)),
            price_max: Some(dec(500)),
            ..ProductFilter::default()
        };
        assert!(filter.validate().is_ok());

        let inverted = ProductFilter {
            price_min: Some(dec(500)),
            price_max: Some(dec(100)),
            ..ProductFilter::default()
        };
        assert!(matches!(
            inverted.validate(),
            Err(FilterError::InvertedPriceRange { .. })
        ));

        let negative = ProductFilter {
            price_min: Some(dec(-1)),
            ..ProductFilter::default()
        };
        assert_eq!(negative.validate(), Err(FilterError::NegativePrice));
    }

    #[test]
    fn test_equal_bounds_allowed() {
        let filter = ProductFilter {
            price_min: Some(dec(20)),
            price_max: Some(dec(20)),
            ..ProductFilter::default()
        };
        assert!(filter.validate().is_ok());
    }

    #[test]
    fn test_min_rating_range() {
        for rating in [0, 6] {
            let filter = ProductFilter {
                min_rating: Some(rating),
                ..ProductFilter::default()
            };
            assert_eq!(filter.validate(), Err(FilterError::RatingOutOfRange));
        }
    }

    #[test]
    fn test_search_normalization_and_escaping() {
        let blank = ProductFilter {
            search: Some("   ".to_owned()),
            ..ProductFilter::default()
        }
        .validate()
        .unwrap();
        assert_eq!(blank.search, None);
        assert_eq!(blank.search_pattern(), None);

        let wild = ProductFilter {
            search: Some(" 100%_pure ".to_owned()),
            ..ProductFilter::default()
        }
        .validate()
        .unwrap();
        assert_eq!(wild.search_pattern().as_deref(), Some("%100\\%\\_pure%"));
    }

    #[test]
    fn test_search_too_long() {
        let filter = ProductFilter {
            search: Some("a".repeat(MAX_SEARCH_LENGTH + 1)),
            ..ProductFilter::default()
        };
        assert_eq!(filter.validate(), Err(FilterError::SearchTooLong));
    }

    #[test]
    fn test_sort_parses_snake_case() {
        let sort: ProductSort = serde_json::from_str("\"price_desc\"").unwrap();
        assert_eq!(sort, ProductSort::PriceDesc);
        assert!(sort.order_by().starts_with("p.price DESC"));
    }
}
