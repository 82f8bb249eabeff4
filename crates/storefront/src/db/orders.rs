//! Order repository.
//!
//! Placing an order is a single transaction: each line decrements stock
//! with a guarded `UPDATE ... WHERE stock >= quantity` that also returns
//! the current price, which is frozen into the order item. Lines are
//! processed in product id order so concurrent checkouts lock rows in the
//! same sequence.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::{PgPool, Postgres, Transaction};
use thiserror::Error;

use discvault_core::pricing::{PricedLine, order_total};
use discvault_core::{
    OrderId, OrderItemId, OrderStatus, PageRequest, Paged, ProductId, UserId,
};

use super::RepositoryError;
use crate::models::commerce::{Order, OrderItem, OrderLineRequest, OrderSummary};

/// Errors specific to order placement and status changes.
#[derive(Debug, Error)]
pub enum OrderError {
    #[error("order has no items")]
    Empty,

    #[error("product {0} does not exist")]
    UnknownProduct(ProductId),

    #[error("insufficient stock for product {0}")]
    InsufficientStock(ProductId),

    #[error("cannot change order status from {from} to {to}")]
    InvalidTransition { from: OrderStatus, to: OrderStatus },

    #[error(transparent)]
    Repository(#[from] RepositoryError),
}

impl From<sqlx::Error> for OrderError {
    fn from(err: sqlx::Error) -> Self {
        Self::Repository(RepositoryError::Database(err))
    }
}

/// What to put on a new order.
#[derive(Debug, Clone, Copy)]
pub enum OrderSource<'a> {
    /// Use the user's cart, clearing it on success.
    Cart,
    /// Use explicit lines and leave the cart untouched.
    Lines(&'a [OrderLineRequest]),
}

/// Result of [`OrderRepository::place`].
#[derive(Debug)]
pub struct PlacedOrder {
    pub order: Order,
    /// `false` when an earlier order with the same idempotency key was returned.
    pub created: bool,
}

#[derive(Debug, sqlx::FromRow)]
struct OrderRow {
    id: OrderId,
    user_id: UserId,
    status: OrderStatus,
    total: Decimal,
    shipping_address: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

#[derive(Debug, sqlx::FromRow)]
struct OrderItemRow {
    id: OrderItemId,
    product_id: ProductId,
    title: String,
    quantity: i32,
    unit_price: Decimal,
}

impl From<OrderItemRow> for OrderItem {
    fn from(row: OrderItemRow) -> Self {
        Self::new(row.id, row.product_id, row.title, row.quantity, row.unit_price)
    }
}

#[derive(Debug, sqlx::FromRow)]
struct OrderSummaryRow {
    id: OrderId,
    status: OrderStatus,
    total: Decimal,
    item_count: i64,
    created_at: DateTime<Utc>,
}

impl From<OrderSummaryRow> for OrderSummary {
    fn from(row: OrderSummaryRow) -> Self {
        Self {
            id: row.id,
            status: row.status,
            total: row.total,
            item_count: row.item_count,
            created_at: row.created_at,
        }
    }
}

/// Merge repeated products and order lines by product id.
fn merge_lines(lines: impl IntoIterator<Item = OrderLineRequest>) -> BTreeMap<ProductId, i32> {
    let mut merged = BTreeMap::new();
    for line in lines {
        let quantity = merged.entry(line.product_id).or_insert(0_i32);
        *quantity = quantity.saturating_add(line.quantity);
    }
    merged
}

/// Repository for order database operations.
pub struct OrderRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> OrderRepository<'a> {
    /// Create a new order repository.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Place an order.
    ///
    /// With an idempotency key, a repeat request returns the order created
    /// by the first one instead of charging stock twice.
    ///
    /// # Errors
    ///
    /// - `OrderError::Empty` if there is nothing to order
    /// - `OrderError::UnknownProduct` if a line references a missing product
    /// - `OrderError::InsufficientStock` if a product cannot cover its line
    pub async fn place(
        &self,
        user_id: UserId,
        source: OrderSource<'_>,
        shipping_address: Option<&str>,
        idempotency_key: Option<&str>,
    ) -> Result<PlacedOrder, OrderError> {
        let mut tx = self.pool.begin().await?;

        if let Some(key) = idempotency_key
            && let Some(existing) = find_by_key(&mut tx, user_id, key).await?
        {
            tx.rollback().await?;
            return self.existing(existing).await;
        }

        let requested = match source {
            OrderSource::Lines(lines) => lines.to_vec(),
            OrderSource::Cart => {
                let rows: Vec<(ProductId, i32)> = sqlx::query_as(
                    r"
                    SELECT product_id, quantity
                    FROM store.cart_item
                    WHERE user_id = $1
                    FOR UPDATE
                    ",
                )
                .bind(user_id)
                .fetch_all(&mut *tx)
                .await?;
                rows.into_iter()
                    .map(|(product_id, quantity)| OrderLineRequest {
                        product_id,
                        quantity,
                    })
                    .collect()
            }
        };

        let lines = merge_lines(requested);
        if lines.is_empty() {
            return Err(OrderError::Empty);
        }

        let inserted: Option<(OrderId,)> = sqlx::query_as(
            r"
            INSERT INTO store.order (user_id, shipping_address, idempotency_key)
            VALUES ($1, $2, $3)
            ON CONFLICT (user_id, idempotency_key) DO NOTHING
            RETURNING id
            ",
        )
        .bind(user_id)
        .bind(shipping_address)
        .bind(idempotency_key)
        .fetch_optional(&mut *tx)
        .await?;

        // A concurrent request with the same key committed first.
        let Some((order_id,)) = inserted else {
            tx.rollback().await?;
            let key = idempotency_key.unwrap_or_default();
            let mut tx = self.pool.begin().await?;
            let existing = find_by_key(&mut tx, user_id, key).await?;
            tx.commit().await?;
            return match existing {
                Some(id) => self.existing(id).await,
                None => Err(RepositoryError::NotFound.into()),
            };
        };

        let mut items = Vec::with_capacity(lines.len());
        for (product_id, quantity) in lines {
            let taken: Option<(Decimal, String)> = sqlx::query_as(
                r"
                UPDATE store.product
                SET stock = stock - $2
                WHERE id = $1 AND stock >= $2
                RETURNING price, title
                ",
            )
            .bind(product_id)
            .bind(quantity)
            .fetch_optional(&mut *tx)
            .await?;

            let Some((unit_price, title)) = taken else {
                let (exists,): (bool,) =
                    sqlx::query_as("SELECT EXISTS (SELECT 1 FROM store.product WHERE id = $1)")
                        .bind(product_id)
                        .fetch_one(&mut *tx)
                        .await?;
                return Err(if exists {
                    OrderError::InsufficientStock(product_id)
                } else {
                    OrderError::UnknownProduct(product_id)
                });
            };

            let (item_id,): (OrderItemId,) = sqlx::query_as(
                r"
                INSERT INTO store.order_item (order_id, product_id, quantity, unit_price)
                VALUES ($1, $2, $3, $4)
                RETURNING id
                ",
            )
            .bind(order_id)
            .bind(product_id)
            .bind(quantity)
            .bind(unit_price)
            .fetch_one(&mut *tx)
            .await?;

            items.push(OrderItem::new(
                item_id, product_id, title, quantity, unit_price,
            ));
        }

        let priced: Vec<PricedLine> = items
            .iter()
            .map(|item| PricedLine {
                unit_price: item.unit_price,
                quantity: item.quantity,
            })
            .collect();
        let total = order_total(&priced);

        let row: OrderRow = sqlx::query_as(
            r"
            UPDATE store.order SET total = $2
            WHERE id = $1
            RETURNING id, user_id, status, total, shipping_address, created_at, updated_at
            ",
        )
        .bind(order_id)
        .bind(total)
        .fetch_one(&mut *tx)
        .await?;

        if matches!(source, OrderSource::Cart) {
            sqlx::query("DELETE FROM store.cart_item WHERE user_id = $1")
                .bind(user_id)
                .execute(&mut *tx)
                .await?;
        }

        tx.commit().await?;

        Ok(PlacedOrder {
            order: assemble(row, items),
            created: true,
        })
    }

    async fn existing(&self, id: OrderId) -> Result<PlacedOrder, OrderError> {
        let order = self.get(id).await?.ok_or(RepositoryError::NotFound)?;
        Ok(PlacedOrder {
            order,
            created: false,
        })
    }

    /// List a user's orders, newest first.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if a query fails.
    pub async fn list_for_user(
        &self,
        user_id: UserId,
        page: PageRequest,
    ) -> Result<Paged<OrderSummary>, RepositoryError> {
        let (total,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM store.order WHERE user_id = $1")
            .bind(user_id)
            .fetch_one(self.pool)
            .await?;

        let rows: Vec<OrderSummaryRow> = sqlx::query_as(
            r"
            SELECT o.id, o.status, o.total, o.created_at,
                   COALESCE((SELECT SUM(quantity) FROM store.order_item WHERE order_id = o.id), 0)::int8
                       AS item_count
            FROM store.order o
            WHERE o.user_id = $1
            ORDER BY o.created_at DESC, o.id DESC
            LIMIT $2 OFFSET $3
            ",
        )
        .bind(user_id)
        .bind(page.limit())
        .bind(page.offset())
        .fetch_all(self.pool)
        .await?;

        Ok(Paged::new(
            rows.into_iter().map(OrderSummary::from).collect(),
            page,
            u64::try_from(total).unwrap_or_default(),
        ))
    }

    /// Get an order with its items.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if a query fails.
    pub async fn get(&self, id: OrderId) -> Result<Option<Order>, RepositoryError> {
        let row: Option<OrderRow> = sqlx::query_as(
            r"
            SELECT id, user_id, status, total, shipping_address, created_at, updated_at
            FROM store.order
            WHERE id = $1
            ",
        )
        .bind(id)
        .fetch_optional(self.pool)
        .await?;

        let Some(row) = row else {
            return Ok(None);
        };

        let items: Vec<OrderItemRow> = sqlx::query_as(
            r"
            SELECT oi.id, oi.product_id, p.title, oi.quantity, oi.unit_price
            FROM store.order_item oi
            JOIN store.product p ON p.id = oi.product_id
            WHERE oi.order_id = $1
            ORDER BY oi.id
            ",
        )
        .bind(id)
        .fetch_all(self.pool)
        .await?;

        Ok(Some(assemble(
            row,
            items.into_iter().map(OrderItem::from).collect(),
        )))
    }

    /// Cancel one of the user's own orders and return its stock.
    ///
    /// # Errors
    ///
    /// - `RepositoryError::NotFound` (wrapped) if the order does not exist
    ///   or belongs to someone else
    /// - `OrderError::InvalidTransition` if the order is past processing
    pub async fn cancel(&self, id: OrderId, user_id: UserId) -> Result<Order, OrderError> {
        self.transition(id, OrderStatus::Cancelled, Some(user_id))
            .await
    }

    /// Move an order to `next` on behalf of an administrator.
    ///
    /// # Errors
    ///
    /// - `RepositoryError::NotFound` (wrapped) if the order does not exist
    /// - `OrderError::InvalidTransition` if the move is not allowed
    pub async fn update_status(&self, id: OrderId, next: OrderStatus) -> Result<Order, OrderError> {
        self.transition(id, next, None).await
    }

    async fn transition(
        &self,
        id: OrderId,
        next: OrderStatus,
        owner: Option<UserId>,
    ) -> Result<Order, OrderError> {
        let mut tx = self.pool.begin().await?;

        let current: Option<(OrderStatus, UserId)> =
            sqlx::query_as("SELECT status, user_id FROM store.order WHERE id = $1 FOR UPDATE")
                .bind(id)
                .fetch_optional(&mut *tx)
                .await?;

        let Some((status, order_user)) = current else {
            return Err(RepositoryError::NotFound.into());
        };
        if owner.is_some_and(|owner| owner != order_user) {
            return Err(RepositoryError::NotFound.into());
        }
        if !status.can_transition_to(next) {
            return Err(OrderError::InvalidTransition {
                from: status,
                to: next,
            });
        }

        if next == OrderStatus::Cancelled {
            restock(&mut tx, id).await?;
        }

        sqlx::query("UPDATE store.order SET status = $2, updated_at = NOW() WHERE id = $1")
            .bind(id)
            .bind(next)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;

        tracing::info!(order_id = %id, from = %status, to = %next, "Order status changed");

        Ok(self.get(id).await?.ok_or(RepositoryError::NotFound)?)
    }
}

async fn find_by_key(
    tx: &mut Transaction<'_, Postgres>,
    user_id: UserId,
    key: &str,
) -> Result<Option<OrderId>, sqlx::Error> {
    let row: Option<(OrderId,)> =
        sqlx::query_as("SELECT id FROM store.order WHERE user_id = $1 AND idempotency_key = $2")
            .bind(user_id)
            .bind(key)
            .fetch_optional(&mut **tx)
            .await?;
    Ok(row.map(|(id,)| id))
}

async fn restock(tx: &mut Transaction<'_, Postgres>, order_id: OrderId) -> Result<(), sqlx::Error> {
    sqlx::query(
        r"
        UPDATE store.product p
        SET stock = p.stock + oi.quantity
        FROM store.order_item oi
        WHERE oi.order_id = $1 AND p.id = oi.product_id
        ",
    )
    .bind(order_id)
    .execute(&mut **tx)
    .await?;
    Ok(())
}

fn assemble(row: OrderRow, items: Vec<OrderItem>) -> Order {
    Order {
        id: row.id,
        user_id: row.user_id,
        status: row.status,
        total: row.total,
        shipping_address: row.shipping_address,
        created_at: row.created_at,
        updated_at: row.updated_at,
        items,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn line(product: i32, quantity: i32) -> OrderLineRequest {
        OrderLineRequest {
            product_id: ProductId::new(product),
            quantity,
        }
    }

    #[test]
    fn test_merge_lines_sums_repeats_in_id_order() {
        let merged = merge_lines([line(7, 1), line(3, 2), line(7, 4)]);
        let pairs: Vec<(i32, i32)> = merged.iter().map(|(p, q)| (p.as_i32(), *q)).collect();
        assert_eq!(pairs, vec![(3, 2), (7, 5)]);
    }

    #[test]
    fn test_merge_lines_empty() {
        assert!(merge_lines(Vec::new()).is_empty());
    }
}
