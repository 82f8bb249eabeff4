//! Catalog repository: products, categories, genres, creators, promotions
//! and highlights.
//!
//! Product listings translate a validated [`ProductFilter`] into nullable
//! parameters: a `NULL` parameter leaves its column unconstrained.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::{PgPool, Postgres, Transaction};

use discvault_core::rating::round_to_tenth;
use discvault_core::{
    CategoryId, CategoryKind, CreatorId, CreatorKind, GenreId, HighlightId, PageRequest, Paged,
    ProductFilter, ProductId, PromotionId, RatingSummary, Slug,
};

use super::RepositoryError;
use crate::models::catalog::{
    ActivePromotion, Category, Creator, CreatorRef, Genre, Highlight, ProductDetail, ProductDraft,
    ProductSummary, Promotion,
};

/// Shared FROM/WHERE for listing and counting products.
///
/// Parameters: `$1` category, `$2` creator, `$3` genre, `$4` min price,
/// `$5` max price, `$6` min average rating, `$7` in stock, `$8` title pattern.
/// The average is rounded to one decimal before filtering so `minRating`
/// agrees with the `averageRating` shown in listings.
const PRODUCT_FILTER_SQL: &str = r"
    FROM store.product p
    LEFT JOIN store.creator c ON c.id = p.creator_id
    LEFT JOIN (
        SELECT product_id, ROUND(AVG(rating)::numeric, 1)::float8 AS average_rating,
               COUNT(*) AS review_count
        FROM store.review
        GROUP BY product_id
    ) r ON r.product_id = p.id
    LEFT JOIN LATERAL (
        SELECT id, discount_percent, ends_at
        FROM store.promotion
        WHERE product_id = p.id AND starts_at <= NOW() AND ends_at > NOW()
        ORDER BY discount_percent DESC, id
        LIMIT 1
    ) promo ON TRUE
    WHERE ($1::int IS NULL OR p.category_id = $1)
      AND ($2::int IS NULL OR p.creator_id = $2)
      AND ($3::int IS NULL OR EXISTS (
            SELECT 1 FROM store.product_genre pg
            WHERE pg.product_id = p.id AND pg.genre_id = $3))
      AND ($4::numeric IS NULL OR p.price >= $4)
      AND ($5::numeric IS NULL OR p.price <= $5)
      AND ($6::float8 IS NULL OR r.average_rating >= $6)
      AND ($7::bool IS NULL OR (p.stock > 0) = $7)
      AND ($8::text IS NULL OR p.title ILIKE $8)
";

const PRODUCT_SUMMARY_COLUMNS: &str = r"
    SELECT p.id, p.title, p.category_id, p.creator_id,
           c.name AS creator_name, c.kind AS creator_kind,
           p.price, p.stock, p.release_year, p.image_url,
           promo.id AS promotion_id, promo.discount_percent,
           promo.ends_at AS promotion_ends_at,
           r.average_rating, COALESCE(r.review_count, 0) AS review_count
";

// =============================================================================
// Rows
// =============================================================================

#[derive(Debug, sqlx::FromRow)]
struct CategoryRow {
    id: CategoryId,
    name: String,
    slug: String,
    kind: CategoryKind,
}

impl From<CategoryRow> for Category {
    fn from(row: CategoryRow) -> Self {
        Self {
            id: row.id,
            name: row.name,
            slug: row.slug,
            kind: row.kind,
            creator_kind: row.kind.creator_kind(),
        }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct GenreRow {
    id: GenreId,
    category_id: CategoryId,
    name: String,
}

impl From<GenreRow> for Genre {
    fn from(row: GenreRow) -> Self {
        Self {
            id: row.id,
            category_id: row.category_id,
            name: row.name,
        }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct CreatorRow {
    id: CreatorId,
    name: String,
    kind: CreatorKind,
    bio: Option<String>,
    image_url: Option<String>,
}

impl From<CreatorRow> for Creator {
    fn from(row: CreatorRow) -> Self {
        Self {
            id: row.id,
            name: row.name,
            kind: row.kind,
            bio: row.bio,
            image_url: row.image_url,
        }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct PromotionRow {
    id: PromotionId,
    product_id: ProductId,
    discount_percent: i32,
    starts_at: DateTime<Utc>,
    ends_at: DateTime<Utc>,
}

impl From<PromotionRow> for Promotion {
    fn from(row: PromotionRow) -> Self {
        Self {
            id: row.id,
            product_id: row.product_id,
            discount_percent: row.discount_percent,
            starts_at: row.starts_at,
            ends_at: row.ends_at,
        }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct HighlightRow {
    id: HighlightId,
    category_id: CategoryId,
    title: String,
    image_url: String,
    link_url: Option<String>,
    position: i32,
}

impl From<HighlightRow> for Highlight {
    fn from(row: HighlightRow) -> Self {
        Self {
            id: row.id,
            category_id: row.category_id,
            title: row.title,
            image_url: row.image_url,
            link_url: row.link_url,
            position: row.position,
        }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct ProductSummaryRow {
    id: ProductId,
    title: String,
    category_id: CategoryId,
    creator_id: Option<CreatorId>,
    creator_name: Option<String>,
    creator_kind: Option<CreatorKind>,
    price: Decimal,
    stock: i32,
    release_year: Option<i16>,
    image_url: Option<String>,
    promotion_id: Option<PromotionId>,
    discount_percent: Option<i32>,
    promotion_ends_at: Option<DateTime<Utc>>,
    average_rating: Option<f64>,
    review_count: i64,
}

fn active_promotion(
    id: Option<PromotionId>,
    percent: Option<i32>,
    ends_at: Option<DateTime<Utc>>,
    price: Decimal,
) -> Option<ActivePromotion> {
    match (id, percent, ends_at) {
        (Some(id), Some(percent), Some(ends_at)) => {
            Some(ActivePromotion::new(id, percent, ends_at, price))
        }
        _ => None,
    }
}

impl From<ProductSummaryRow> for ProductSummary {
    fn from(row: ProductSummaryRow) -> Self {
        let creator = match (row.creator_id, row.creator_name, row.creator_kind) {
            (Some(id), Some(name), Some(kind)) => Some(CreatorRef { id, name, kind }),
            _ => None,
        };
        Self {
            id: row.id,
            title: row.title,
            category_id: row.category_id,
            creator,
            price: row.price,
            stock: row.stock,
            in_stock: row.stock > 0,
            release_year: row.release_year,
            image_url: row.image_url,
            promotion: active_promotion(
                row.promotion_id,
                row.discount_percent,
                row.promotion_ends_at,
                row.price,
            ),
            average_rating: row.average_rating.map(round_to_tenth),
            review_count: row.review_count,
        }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct ProductDetailRow {
    id: ProductId,
    title: String,
    description: String,
    price: Decimal,
    stock: i32,
    release_year: Option<i16>,
    image_url: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    category_id: CategoryId,
    category_name: String,
    category_slug: String,
    category_kind: CategoryKind,
    creator_id: Option<CreatorId>,
    creator_name: Option<String>,
    creator_kind: Option<CreatorKind>,
    creator_bio: Option<String>,
    creator_image_url: Option<String>,
    promotion_id: Option<PromotionId>,
    discount_percent: Option<i32>,
    promotion_ends_at: Option<DateTime<Utc>>,
}

// =============================================================================
// Repository
// =============================================================================

/// Repository for catalog database operations.
pub struct CatalogRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> CatalogRepository<'a> {
    /// Create a new catalog repository.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    // =========================================================================
    // Products
    // =========================================================================

    /// List products matching every constraint in `filter`.
    ///
    /// `filter` must already have passed [`ProductFilter::validate`].
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if a query fails.
    pub async fn list_products(
        &self,
        filter: &ProductFilter,
        page: PageRequest,
    ) -> Result<Paged<ProductSummary>, RepositoryError> {
        let pattern = filter.search_pattern();
        let min_rating = filter.min_rating.map(f64::from);

        let count_sql = format!("SELECT COUNT(*) {PRODUCT_FILTER_SQL}");
        let (total,): (i64,) = sqlx::query_as(&count_sql)
            .bind(filter.category_id)
            .bind(filter.creator_id)
            .bind(filter.genre_id)
            .bind(filter.price_min)
            .bind(filter.price_max)
            .bind(min_rating)
            .bind(filter.in_stock)
            .bind(pattern.as_deref())
            .fetch_one(self.pool)
            .await?;

        let list_sql = format!(
            "{PRODUCT_SUMMARY_COLUMNS} {PRODUCT_FILTER_SQL} ORDER BY {} LIMIT $9 OFFSET $10",
            filter.sort.order_by()
        );
        let rows: Vec<ProductSummaryRow> = sqlx::query_as(&list_sql)
            .bind(filter.category_id)
            .bind(filter.creator_id)
            .bind(filter.genre_id)
            .bind(filter.price_min)
            .bind(filter.price_max)
            .bind(min_rating)
            .bind(filter.in_stock)
            .bind(pattern.as_deref())
            .bind(page.limit())
            .bind(page.offset())
            .fetch_all(self.pool)
            .await?;

        let items = rows.into_iter().map(ProductSummary::from).collect();
        Ok(Paged::new(
            items,
            page,
            u64::try_from(total).unwrap_or_default(),
        ))
    }

    /// Get the full product page.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if a query fails.
    pub async fn get_product(&self, id: ProductId) -> Result<Option<ProductDetail>, RepositoryError> {
        let row: Option<ProductDetailRow> = sqlx::query_as(
            r"
            SELECT p.id, p.title, p.description, p.price, p.stock, p.release_year,
                   p.image_url, p.created_at, p.updated_at,
                   cat.id AS category_id, cat.name AS category_name,
                   cat.slug AS category_slug, cat.kind AS category_kind,
                   c.id AS creator_id, c.name AS creator_name, c.kind AS creator_kind,
                   c.bio AS creator_bio, c.image_url AS creator_image_url,
                   promo.id AS promotion_id, promo.discount_percent,
                   promo.ends_at AS promotion_ends_at
            FROM store.product p
            JOIN store.category cat ON cat.id = p.category_id
            LEFT JOIN store.creator c ON c.id = p.creator_id
            LEFT JOIN LATERAL (
                SELECT id, discount_percent, ends_at
                FROM store.promotion
                WHERE product_id = p.id AND starts_at <= NOW() AND ends_at > NOW()
                ORDER BY discount_percent DESC, id
                LIMIT 1
            ) promo ON TRUE
            WHERE p.id = $1
            ",
        )
        .bind(id)
        .fetch_optional(self.pool)
        .await?;

        let Some(row) = row else {
            return Ok(None);
        };

        let genres: Vec<GenreRow> = sqlx::query_as(
            r"
            SELECT g.id, g.category_id, g.name
            FROM store.product_genre pg
            JOIN store.genre g ON g.id = pg.genre_id
            WHERE pg.product_id = $1
            ORDER BY g.name
            ",
        )
        .bind(id)
        .fetch_all(self.pool)
        .await?;

        let rating = self.rating_summary(id).await?;

        let creator = match (row.creator_id, row.creator_name, row.creator_kind) {
            (Some(id), Some(name), Some(kind)) => Some(Creator {
                id,
                name,
                kind,
                bio: row.creator_bio,
                image_url: row.creator_image_url,
            }),
            _ => None,
        };

        Ok(Some(ProductDetail {
            id: row.id,
            title: row.title,
            description: row.description,
            category: Category::from(CategoryRow {
                id: row.category_id,
                name: row.category_name,
                slug: row.category_slug,
                kind: row.category_kind,
            }),
            creator,
            genres: genres.into_iter().map(Genre::from).collect(),
            price: row.price,
            stock: row.stock,
            in_stock: row.stock > 0,
            release_year: row.release_year,
            image_url: row.image_url,
            promotion: active_promotion(
                row.promotion_id,
                row.discount_percent,
                row.promotion_ends_at,
                row.price,
            ),
            rating,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }))
    }

    /// Per-star counts for a product folded into a [`RatingSummary`].
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn rating_summary(&self, id: ProductId) -> Result<RatingSummary, RepositoryError> {
        let counts: Vec<(i16, i64)> = sqlx::query_as(
            "SELECT rating, COUNT(*) FROM store.review WHERE product_id = $1 GROUP BY rating",
        )
        .bind(id)
        .fetch_all(self.pool)
        .await?;

        Ok(RatingSummary::from_counts(counts))
    }

    /// Whether a product exists.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn product_exists(&self, id: ProductId) -> Result<bool, RepositoryError> {
        let (exists,): (bool,) =
            sqlx::query_as("SELECT EXISTS (SELECT 1 FROM store.product WHERE id = $1)")
                .bind(id)
                .fetch_one(self.pool)
                .await?;
        Ok(exists)
    }

    /// Find a product in a category by exact title (case-insensitive).
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn find_product_by_title(
        &self,
        category_id: CategoryId,
        title: &str,
    ) -> Result<Option<ProductId>, RepositoryError> {
        let row: Option<(ProductId,)> = sqlx::query_as(
            "SELECT id FROM store.product WHERE category_id = $1 AND LOWER(title) = LOWER($2) LIMIT 1",
        )
        .bind(category_id)
        .bind(title)
        .fetch_optional(self.pool)
        .await?;
        Ok(row.map(|(id,)| id))
    }

    /// Create a product and its genre links.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the category, creator or a
    /// genre does not exist.
    pub async fn create_product(&self, draft: &ProductDraft) -> Result<ProductId, RepositoryError> {
        let mut tx = self.pool.begin().await?;

        let (id,): (ProductId,) = sqlx::query_as(
            r"
            INSERT INTO store.product
                (category_id, creator_id, title, description, price, stock, release_year, image_url)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            RETURNING id
            ",
        )
        .bind(draft.category_id)
        .bind(draft.creator_id)
        .bind(&draft.title)
        .bind(&draft.description)
        .bind(draft.price)
        .bind(draft.stock)
        .bind(draft.release_year)
        .bind(draft.image_url.as_deref())
        .fetch_one(&mut *tx)
        .await
        .map_err(RepositoryError::not_found_on_foreign_key)?;

        replace_genres(&mut tx, id, &draft.genre_ids).await?;

        tx.commit().await?;
        Ok(id)
    }

    /// Update a product. Genre links are replaced in the same transaction,
    /// so readers never see a product with a partial genre set.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the product (or a referenced
    /// category, creator or genre) does not exist.
    pub async fn update_product(
        &self,
        id: ProductId,
        draft: &ProductDraft,
    ) -> Result<(), RepositoryError> {
        let mut tx = self.pool.begin().await?;

        let result = sqlx::query(
            r"
            UPDATE store.product
            SET category_id = $2, creator_id = $3, title = $4, description = $5,
                price = $6, stock = $7, release_year = $8, image_url = $9,
                updated_at = NOW()
            WHERE id = $1
            ",
        )
        .bind(id)
        .bind(draft.category_id)
        .bind(draft.creator_id)
        .bind(&draft.title)
        .bind(&draft.description)
        .bind(draft.price)
        .bind(draft.stock)
        .bind(draft.release_year)
        .bind(draft.image_url.as_deref())
        .execute(&mut *tx)
        .await
        .map_err(RepositoryError::not_found_on_foreign_key)?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }

        replace_genres(&mut tx, id, &draft.genre_ids).await?;

        tx.commit().await?;
        Ok(())
    }

    /// Delete a product. Products that appear on orders are kept for the
    /// order history and cannot be deleted.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the product does not exist, or
    /// `RepositoryError::Conflict` if it has been ordered.
    pub async fn delete_product(&self, id: ProductId) -> Result<(), RepositoryError> {
        let result = sqlx::query("DELETE FROM store.product WHERE id = $1")
            .bind(id)
            .execute(self.pool)
            .await
            .map_err(|e| {
                if let sqlx::Error::Database(ref db_err) = e
                    && db_err.is_foreign_key_violation()
                {
                    return RepositoryError::Conflict(
                        "product appears on orders and cannot be deleted".to_owned(),
                    );
                }
                RepositoryError::Database(e)
            })?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }
        Ok(())
    }

    // =========================================================================
    // Categories & genres
    // =========================================================================

    /// List all categories.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list_categories(&self) -> Result<Vec<Category>, RepositoryError> {
        let rows: Vec<CategoryRow> =
            sqlx::query_as("SELECT id, name, slug, kind FROM store.category ORDER BY id")
                .fetch_all(self.pool)
                .await?;
        Ok(rows.into_iter().map(Category::from).collect())
    }

    /// Create a category, or update the name and kind of the one with this
    /// slug.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Conflict` if another category has the name.
    pub async fn upsert_category(
        &self,
        name: &str,
        slug: &Slug,
        kind: CategoryKind,
    ) -> Result<Category, RepositoryError> {
        let row: CategoryRow = sqlx::query_as(
            r"
            INSERT INTO store.category (name, slug, kind)
            VALUES ($1, $2, $3)
            ON CONFLICT (slug) DO UPDATE SET name = EXCLUDED.name, kind = EXCLUDED.kind
            RETURNING id, name, slug, kind
            ",
        )
        .bind(name)
        .bind(slug.as_str())
        .bind(kind)
        .fetch_one(self.pool)
        .await
        .map_err(|e| RepositoryError::conflict_on_unique(e, "category name already exists"))?;
        Ok(row.into())
    }

    /// List genres, optionally for one category.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list_genres(
        &self,
        category_id: Option<CategoryId>,
    ) -> Result<Vec<Genre>, RepositoryError> {
        let rows: Vec<GenreRow> = sqlx::query_as(
            r"
            SELECT id, category_id, name
            FROM store.genre
            WHERE ($1::int IS NULL OR category_id = $1)
            ORDER BY category_id, name
            ",
        )
        .bind(category_id)
        .fetch_all(self.pool)
        .await?;
        Ok(rows.into_iter().map(Genre::from).collect())
    }

    /// Create a genre.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Conflict` if the category already has a
    /// genre with this name, `RepositoryError::NotFound` if the category
    /// does not exist.
    pub async fn create_genre(
        &self,
        category_id: CategoryId,
        name: &str,
    ) -> Result<Genre, RepositoryError> {
        let row: GenreRow = sqlx::query_as(
            r"
            INSERT INTO store.genre (category_id, name)
            VALUES ($1, $2)
            RETURNING id, category_id, name
            ",
        )
        .bind(category_id)
        .bind(name)
        .fetch_one(self.pool)
        .await
        .map_err(|e| match RepositoryError::conflict_on_unique(e, "genre already exists") {
            RepositoryError::Database(e) => RepositoryError::not_found_on_foreign_key(e),
            other => other,
        })?;
        Ok(row.into())
    }

    // =========================================================================
    // Creators
    // =========================================================================

    /// List creators, optionally of one kind.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list_creators(
        &self,
        kind: Option<CreatorKind>,
    ) -> Result<Vec<Creator>, RepositoryError> {
        let rows: Vec<CreatorRow> = sqlx::query_as(
            r"
            SELECT id, name, kind, bio, image_url
            FROM store.creator
            WHERE ($1::store.creator_kind IS NULL OR kind = $1)
            ORDER BY name
            ",
        )
        .bind(kind)
        .fetch_all(self.pool)
        .await?;
        Ok(rows.into_iter().map(Creator::from).collect())
    }

    /// Create a creator.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Conflict` if a creator of this kind and
    /// name already exists.
    pub async fn create_creator(
        &self,
        name: &str,
        kind: CreatorKind,
        bio: Option<&str>,
        image_url: Option<&str>,
    ) -> Result<Creator, RepositoryError> {
        let row: CreatorRow = sqlx::query_as(
            r"
            INSERT INTO store.creator (name, kind, bio, image_url)
            VALUES ($1, $2, $3, $4)
            RETURNING id, name, kind, bio, image_url
            ",
        )
        .bind(name)
        .bind(kind)
        .bind(bio)
        .bind(image_url)
        .fetch_one(self.pool)
        .await
        .map_err(|e| RepositoryError::conflict_on_unique(e, "creator already exists"))?;
        Ok(row.into())
    }

    // =========================================================================
    // Promotions & highlights
    // =========================================================================

    /// Create a promotion.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the product does not exist.
    pub async fn create_promotion(
        &self,
        product_id: ProductId,
        discount_percent: i32,
        starts_at: DateTime<Utc>,
        ends_at: DateTime<Utc>,
    ) -> Result<Promotion, RepositoryError> {
        let row: PromotionRow = sqlx::query_as(
            r"
            INSERT INTO store.promotion (product_id, discount_percent, starts_at, ends_at)
            VALUES ($1, $2, $3, $4)
            RETURNING id, product_id, discount_percent, starts_at, ends_at
            ",
        )
        .bind(product_id)
        .bind(discount_percent)
        .bind(starts_at)
        .bind(ends_at)
        .fetch_one(self.pool)
        .await
        .map_err(RepositoryError::not_found_on_foreign_key)?;
        Ok(row.into())
    }

    /// Delete a promotion.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the promotion does not exist.
    pub async fn delete_promotion(&self, id: PromotionId) -> Result<(), RepositoryError> {
        let result = sqlx::query("DELETE FROM store.promotion WHERE id = $1")
            .bind(id)
            .execute(self.pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }
        Ok(())
    }

    /// List highlights ordered by position, optionally for one category.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list_highlights(
        &self,
        category_id: Option<CategoryId>,
    ) -> Result<Vec<Highlight>, RepositoryError> {
        let rows: Vec<HighlightRow> = sqlx::query_as(
            r"
            SELECT id, category_id, title, image_url, link_url, position
            FROM store.highlight
            WHERE ($1::int IS NULL OR category_id = $1)
            ORDER BY category_id, position, id
            ",
        )
        .bind(category_id)
        .fetch_all(self.pool)
        .await?;
        Ok(rows.into_iter().map(Highlight::from).collect())
    }

    /// Create a highlight.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the category does not exist.
    pub async fn create_highlight(
        &self,
        category_id: CategoryId,
        title: &str,
        image_url: &str,
        link_url: Option<&str>,
        position: i32,
    ) -> Result<Highlight, RepositoryError> {
        let row: HighlightRow = sqlx::query_as(
            r"
            INSERT INTO store.highlight (category_id, title, image_url, link_url, position)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING id, category_id, title, image_url, link_url, position
            ",
        )
        .bind(category_id)
        .bind(title)
        .bind(image_url)
        .bind(link_url)
        .bind(position)
        .fetch_one(self.pool)
        .await
        .map_err(RepositoryError::not_found_on_foreign_key)?;
        Ok(row.into())
    }
}

/// Delete-then-insert the genre links of a product inside `tx`.
async fn replace_genres(
    tx: &mut Transaction<'_, Postgres>,
    product_id: ProductId,
    genre_ids: &[GenreId],
) -> Result<(), RepositoryError> {
    sqlx::query("DELETE FROM store.product_genre WHERE product_id = $1")
        .bind(product_id)
        .execute(&mut **tx)
        .await?;

    if genre_ids.is_empty() {
        return Ok(());
    }

    let ids: Vec<i32> = genre_ids.iter().map(GenreId::as_i32).collect();
    sqlx::query(
        r"
        INSERT INTO store.product_genre (product_id, genre_id)
        SELECT $1, UNNEST($2::int[])
        ON CONFLICT DO NOTHING
        ",
    )
    .bind(product_id)
    .bind(&ids)
    .execute(&mut **tx)
    .await
    .map_err(RepositoryError::not_found_on_foreign_key)?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use discvault_core::rating::round_to_tenth;

    use super::PRODUCT_FILTER_SQL;

    #[test]
    fn test_rating_filter_uses_displayed_average() {
        // 99 fives and one one average 4.96; listings show 5.0
        let average = f64::from(99 * 5 + 1) / 100.0;
        assert!(average < 5.0);
        assert!((round_to_tenth(average) - 5.0).abs() < f64::EPSILON);

        assert!(PRODUCT_FILTER_SQL.contains("ROUND(AVG(rating)::numeric, 1)::float8 AS average_rating"));
        assert!(PRODUCT_FILTER_SQL.contains("r.average_rating >= $6"));
    }
}
