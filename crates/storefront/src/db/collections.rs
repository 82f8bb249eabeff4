//! Collection repository.
//!
//! Collections are addressed by name within a user's account, matched
//! case-insensitively. The built-in collections carry `is_default = TRUE`
//! and are never renamed or deleted here.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::PgPool;

use discvault_core::{CollectionId, CollectionName, ProductId, UserId};

use super::RepositoryError;
use crate::models::community::{CollectionItem, CollectionSummary};

const DUPLICATE_NAME: &str = "a collection with this name already exists";

#[derive(Debug, sqlx::FromRow)]
struct CollectionRow {
    id: CollectionId,
    name: String,
    is_default: bool,
    item_count: i64,
    created_at: DateTime<Utc>,
}

impl From<CollectionRow> for CollectionSummary {
    fn from(row: CollectionRow) -> Self {
        Self {
            id: row.id,
            name: row.name,
            is_default: row.is_default,
            item_count: row.item_count,
            created_at: row.created_at,
        }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct CollectionItemRow {
    product_id: ProductId,
    title: String,
    price: Decimal,
    image_url: Option<String>,
    added_at: DateTime<Utc>,
}

impl From<CollectionItemRow> for CollectionItem {
    fn from(row: CollectionItemRow) -> Self {
        Self {
            product_id: row.product_id,
            title: row.title,
            price: row.price,
            image_url: row.image_url,
            added_at: row.added_at,
        }
    }
}

/// Repository for collection database operations.
pub struct CollectionRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> CollectionRepository<'a> {
    /// Create a new collection repository.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// List a user's collections with item counts, built-ins first.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list(&self, user_id: UserId) -> Result<Vec<CollectionSummary>, RepositoryError> {
        let rows: Vec<CollectionRow> = sqlx::query_as(
            r"
            SELECT c.id, c.name, c.is_default, c.created_at,
                   (SELECT COUNT(*) FROM store.collection_item ci WHERE ci.collection_id = c.id)
                       AS item_count
            FROM store.collection c
            WHERE c.user_id = $1
            ORDER BY c.is_default DESC, c.created_at, c.id
            ",
        )
        .bind(user_id)
        .fetch_all(self.pool)
        .await?;
        Ok(rows.into_iter().map(CollectionSummary::from).collect())
    }

    /// Find one of the user's collections by name.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn find(
        &self,
        user_id: UserId,
        name: &str,
    ) -> Result<Option<CollectionSummary>, RepositoryError> {
        let row: Option<CollectionRow> = sqlx::query_as(
            r"
            SELECT c.id, c.name, c.is_default, c.created_at,
                   (SELECT COUNT(*) FROM store.collection_item ci WHERE ci.collection_id = c.id)
                       AS item_count
            FROM store.collection c
            WHERE c.user_id = $1 AND LOWER(c.name) = LOWER($2)
            ",
        )
        .bind(user_id)
        .bind(name.trim())
        .fetch_optional(self.pool)
        .await?;
        Ok(row.map(CollectionSummary::from))
    }

    /// Create a user collection.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Conflict` if the user already has a
    /// collection with this name.
    pub async fn create(
        &self,
        user_id: UserId,
        name: &CollectionName,
    ) -> Result<CollectionSummary, RepositoryError> {
        let row: CollectionRow = sqlx::query_as(
            r"
            INSERT INTO store.collection (user_id, name)
            VALUES ($1, $2)
            RETURNING id, name, is_default, created_at, 0::int8 AS item_count
            ",
        )
        .bind(user_id)
        .bind(name.as_str())
        .fetch_one(self.pool)
        .await
        .map_err(|e| RepositoryError::conflict_on_unique(e, DUPLICATE_NAME))?;
        Ok(row.into())
    }

    /// Rename a user collection.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Conflict` if the new name is taken,
    /// `RepositoryError::NotFound` if the collection does not exist or is
    /// built in.
    pub async fn rename(
        &self,
        id: CollectionId,
        name: &CollectionName,
    ) -> Result<(), RepositoryError> {
        let result = sqlx::query(
            "UPDATE store.collection SET name = $2 WHERE id = $1 AND NOT is_default",
        )
        .bind(id)
        .bind(name.as_str())
        .execute(self.pool)
        .await
        .map_err(|e| RepositoryError::conflict_on_unique(e, DUPLICATE_NAME))?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }
        Ok(())
    }

    /// Delete a user collection and, by cascade, its items.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the collection does not exist
    /// or is built in.
    pub async fn delete(&self, id: CollectionId) -> Result<(), RepositoryError> {
        let result = sqlx::query("DELETE FROM store.collection WHERE id = $1 AND NOT is_default")
            .bind(id)
            .execute(self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }
        Ok(())
    }

    /// Items in a collection, most recently added first.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn items(&self, id: CollectionId) -> Result<Vec<CollectionItem>, RepositoryError> {
        let rows: Vec<CollectionItemRow> = sqlx::query_as(
            r"
            SELECT ci.product_id, p.title, p.price, p.image_url, ci.added_at
            FROM store.collection_item ci
            JOIN store.product p ON p.id = ci.product_id
            WHERE ci.collection_id = $1
            ORDER BY ci.added_at DESC, ci.product_id
            ",
        )
        .bind(id)
        .fetch_all(self.pool)
        .await?;
        Ok(rows.into_iter().map(CollectionItem::from).collect())
    }

    /// Add a product to a collection. Adding it twice is a no-op.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the product does not exist.
    pub async fn add_item(
        &self,
        id: CollectionId,
        product_id: ProductId,
    ) -> Result<(), RepositoryError> {
        sqlx::query(
            r"
            INSERT INTO store.collection_item (collection_id, product_id)
            VALUES ($1, $2)
            ON CONFLICT DO NOTHING
            ",
        )
        .bind(id)
        .bind(product_id)
        .execute(self.pool)
        .await
        .map_err(RepositoryError::not_found_on_foreign_key)?;
        Ok(())
    }

    /// Remove a product from a collection.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the product is not in the
    /// collection.
    pub async fn remove_item(
        &self,
        id: CollectionId,
        product_id: ProductId,
    ) -> Result<(), RepositoryError> {
        let result = sqlx::query(
            "DELETE FROM store.collection_item WHERE collection_id = $1 AND product_id = $2",
        )
        .bind(id)
        .bind(product_id)
        .execute(self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }
        Ok(())
    }
}
