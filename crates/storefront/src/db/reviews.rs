//! Review repository.
//!
//! One review per user and product is enforced by a unique constraint, so a
//! second submission fails without writing a row.

use chrono::{DateTime, Utc};
use sqlx::PgPool;

use discvault_core::{ProductId, Rating, RatingSummary, ReviewId, UserId};

use super::RepositoryError;
use crate::models::community::{ProductReviews, Review};

const REVIEW_COLUMNS: &str = r"
    SELECT r.id, r.product_id, p.title AS product_title, r.user_id,
           COALESCE(u.display_name, u.username) AS author_name,
           r.rating, r.body, r.created_at, r.updated_at
    FROM store.review r
    JOIN store.product p ON p.id = r.product_id
    JOIN store.user u ON u.id = r.user_id
";

#[derive(Debug, sqlx::FromRow)]
struct ReviewRow {
    id: ReviewId,
    product_id: ProductId,
    product_title: String,
    user_id: UserId,
    author_name: String,
    rating: i16,
    body: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<ReviewRow> for Review {
    type Error = RepositoryError;

    fn try_from(row: ReviewRow) -> Result<Self, Self::Error> {
        let rating = Rating::new(row.rating)
            .map_err(|e| RepositoryError::DataCorruption(format!("review {}: {e}", row.id)))?;
        Ok(Self {
            id: row.id,
            product_id: row.product_id,
            product_title: row.product_title,
            user_id: row.user_id,
            author_name: row.author_name,
            rating,
            body: row.body,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

fn convert(rows: Vec<ReviewRow>) -> Result<Vec<Review>, RepositoryError> {
    rows.into_iter().map(Review::try_from).collect()
}

/// Repository for review database operations.
pub struct ReviewRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> ReviewRepository<'a> {
    /// Create a new review repository.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// All reviews of a product, newest first, with the rating summary
    /// computed from the same rows.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails, or
    /// `RepositoryError::DataCorruption` for an out-of-range rating.
    pub async fn for_product(&self, product_id: ProductId) -> Result<ProductReviews, RepositoryError> {
        let sql = format!("{REVIEW_COLUMNS} WHERE r.product_id = $1 ORDER BY r.created_at DESC, r.id DESC");
        let rows: Vec<ReviewRow> = sqlx::query_as(&sql)
            .bind(product_id)
            .fetch_all(self.pool)
            .await?;

        let reviews = convert(rows)?;
        let summary: RatingSummary = reviews.iter().map(|r| r.rating).collect();

        Ok(ProductReviews {
            product_id,
            summary,
            reviews,
        })
    }

    /// Reviews written by a user, newest first.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn for_user(&self, user_id: UserId) -> Result<Vec<Review>, RepositoryError> {
        let sql = format!("{REVIEW_COLUMNS} WHERE r.user_id = $1 ORDER BY r.created_at DESC, r.id DESC");
        let rows: Vec<ReviewRow> = sqlx::query_as(&sql)
            .bind(user_id)
            .fetch_all(self.pool)
            .await?;
        convert(rows)
    }

    /// Get a single review.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get(&self, id: ReviewId) -> Result<Option<Review>, RepositoryError> {
        let sql = format!("{REVIEW_COLUMNS} WHERE r.id = $1");
        let row: Option<ReviewRow> = sqlx::query_as(&sql)
            .bind(id)
            .fetch_optional(self.pool)
            .await?;
        row.map(Review::try_from).transpose()
    }

    /// Create a review.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Conflict` if the user already reviewed the
    /// product, `RepositoryError::NotFound` if the product does not exist.
    pub async fn create(
        &self,
        product_id: ProductId,
        user_id: UserId,
        rating: Rating,
        body: &str,
    ) -> Result<Review, RepositoryError> {
        let (id,): (ReviewId,) = sqlx::query_as(
            r"
            INSERT INTO store.review (product_id, user_id, rating, body)
            VALUES ($1, $2, $3, $4)
            RETURNING id
            ",
        )
        .bind(product_id)
        .bind(user_id)
        .bind(i16::from(rating))
        .bind(body)
        .fetch_one(self.pool)
        .await
        .map_err(|e| {
            match RepositoryError::conflict_on_unique(e, "you have already reviewed this product") {
                RepositoryError::Database(e) => RepositoryError::not_found_on_foreign_key(e),
                other => other,
            }
        })?;

        self.get(id).await?.ok_or(RepositoryError::NotFound)
    }

    /// Update the rating and body of the caller's own review.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the review does not exist or
    /// belongs to someone else.
    pub async fn update(
        &self,
        id: ReviewId,
        user_id: UserId,
        rating: Rating,
        body: &str,
    ) -> Result<Review, RepositoryError> {
        let result = sqlx::query(
            r"
            UPDATE store.review
            SET rating = $3, body = $4, updated_at = NOW()
            WHERE id = $1 AND user_id = $2
            ",
        )
        .bind(id)
        .bind(user_id)
        .bind(i16::from(rating))
        .bind(body)
        .execute(self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }
        self.get(id).await?.ok_or(RepositoryError::NotFound)
    }

    /// Delete a review.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the review does not exist.
    pub async fn delete(&self, id: ReviewId) -> Result<(), RepositoryError> {
        let result = sqlx::query("DELETE FROM store.review WHERE id = $1")
            .bind(id)
            .execute(self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }
        Ok(())
    }
}
