//! Cart repository.
//!
//! Cart lines always carry the live catalog price; prices are only frozen
//! when an order is placed.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::PgPool;

use discvault_core::pricing::line_total;
use discvault_core::{ProductId, UserId};

use super::RepositoryError;
use crate::models::commerce::{Cart, CartLine};

#[derive(Debug, sqlx::FromRow)]
struct CartLineRow {
    product_id: ProductId,
    title: String,
    image_url: Option<String>,
    unit_price: Decimal,
    quantity: i32,
    available: i32,
    added_at: DateTime<Utc>,
}

impl From<CartLineRow> for CartLine {
    fn from(row: CartLineRow) -> Self {
        Self {
            product_id: row.product_id,
            title: row.title,
            image_url: row.image_url,
            unit_price: row.unit_price,
            quantity: row.quantity,
            line_total: line_total(row.unit_price, row.quantity),
            available: row.available,
            added_at: row.added_at,
        }
    }
}

/// Repository for cart database operations.
pub struct CartRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> CartRepository<'a> {
    /// Create a new cart repository.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Get the user's cart.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get(&self, user_id: UserId) -> Result<Cart, RepositoryError> {
        let rows: Vec<CartLineRow> = sqlx::query_as(
            r"
            SELECT ci.product_id, p.title, p.image_url, p.price AS unit_price,
                   ci.quantity, p.stock AS available, ci.added_at
            FROM store.cart_item ci
            JOIN store.product p ON p.id = ci.product_id
            WHERE ci.user_id = $1
            ORDER BY ci.added_at, ci.id
            ",
        )
        .bind(user_id)
        .fetch_all(self.pool)
        .await?;

        Ok(Cart::from_lines(
            rows.into_iter().map(CartLine::from).collect(),
        ))
    }

    /// Add `quantity` of a product, incrementing an existing line.
    ///
    /// Returns `false` and leaves the line unchanged when the new total
    /// would exceed `max_quantity`.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the product does not exist.
    pub async fn add(
        &self,
        user_id: UserId,
        product_id: ProductId,
        quantity: i32,
        max_quantity: i32,
    ) -> Result<bool, RepositoryError> {
        let result = sqlx::query(
            r"
            INSERT INTO store.cart_item (user_id, product_id, quantity)
            VALUES ($1, $2, $3)
            ON CONFLICT (user_id, product_id)
            DO UPDATE SET quantity = store.cart_item.quantity + EXCLUDED.quantity
            WHERE store.cart_item.quantity + EXCLUDED.quantity <= $4
            ",
        )
        .bind(user_id)
        .bind(product_id)
        .bind(quantity)
        .bind(max_quantity)
        .execute(self.pool)
        .await
        .map_err(RepositoryError::not_found_on_foreign_key)?;
        Ok(result.rows_affected() > 0)
    }

    /// Set the quantity of a line. Zero removes it.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the product is not in the cart.
    pub async fn set_quantity(
        &self,
        user_id: UserId,
        product_id: ProductId,
        quantity: i32,
    ) -> Result<(), RepositoryError> {
        if quantity == 0 {
            return self.remove(user_id, product_id).await;
        }

        let result = sqlx::query(
            "UPDATE store.cart_item SET quantity = $3 WHERE user_id = $1 AND product_id = $2",
        )
        .bind(user_id)
        .bind(product_id)
        .bind(quantity)
        .execute(self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }
        Ok(())
    }

    /// Remove a line.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the product is not in the cart.
    pub async fn remove(
        &self,
        user_id: UserId,
        product_id: ProductId,
    ) -> Result<(), RepositoryError> {
        let result =
            sqlx::query("DELETE FROM store.cart_item WHERE user_id = $1 AND product_id = $2")
                .bind(user_id)
                .bind(product_id)
                .execute(self.pool)
                .await?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }
        Ok(())
    }

    /// Empty the cart.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn clear(&self, user_id: UserId) -> Result<(), RepositoryError> {
        sqlx::query("DELETE FROM store.cart_item WHERE user_id = $1")
            .bind(user_id)
            .execute(self.pool)
            .await?;
        Ok(())
    }
}
