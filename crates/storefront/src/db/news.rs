//! News metadata repository.
//!
//! Titles, authors, tags and publication dates live here; article bodies
//! live in the markdown content store under the same slug.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use sqlx::{PgPool, Postgres, Transaction};

use discvault_core::{AuthorId, NewsId, PageRequest, Paged, Slug, TagId};

use super::RepositoryError;
use crate::models::news::{Author, AuthorRef, NewsDraft, NewsSummary, Tag, TagCount, YearCount};

/// Index filters for the news feed. Tag and author are slugs.
#[derive(Debug, Clone, Default)]
pub struct NewsFilter {
    pub tag: Option<String>,
    pub year: Option<i32>,
    pub author: Option<String>,
}

const NEWS_FILTER_SQL: &str = r"
    FROM store.news n
    JOIN store.author a ON a.id = n.author_id
    WHERE n.published_at <= NOW()
      AND ($1::text IS NULL OR EXISTS (
            SELECT 1 FROM store.news_tag nt
            JOIN store.tag t ON t.id = nt.tag_id
            WHERE nt.news_id = n.id AND t.slug = $1))
      AND ($2::int IS NULL OR EXTRACT(YEAR FROM n.published_at)::int = $2)
      AND ($3::text IS NULL OR a.slug = $3)
";

const NEWS_COLUMNS: &str = r"
    SELECT n.id, n.title, n.slug, n.summary, n.image_url, n.published_at, n.updated_at,
           a.id AS author_id, a.name AS author_name, a.slug AS author_slug
";

#[derive(Debug, sqlx::FromRow)]
struct NewsRow {
    id: NewsId,
    title: String,
    slug: String,
    summary: String,
    image_url: Option<String>,
    published_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    author_id: AuthorId,
    author_name: String,
    author_slug: String,
}

impl NewsRow {
    fn into_summary(self, tags: Vec<Tag>) -> NewsSummary {
        NewsSummary {
            id: self.id,
            title: self.title,
            slug: self.slug,
            summary: self.summary,
            image_url: self.image_url,
            author: AuthorRef {
                id: self.author_id,
                name: self.author_name,
                slug: self.author_slug,
            },
            tags,
            published_at: self.published_at,
        }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct NewsTagRow {
    news_id: NewsId,
    id: TagId,
    name: String,
    slug: String,
}

#[derive(Debug, sqlx::FromRow)]
struct AuthorRow {
    id: AuthorId,
    name: String,
    slug: String,
    bio: String,
    article_count: i64,
}

impl From<AuthorRow> for Author {
    fn from(row: AuthorRow) -> Self {
        Self {
            id: row.id,
            name: row.name,
            slug: row.slug,
            bio: row.bio,
            article_count: row.article_count,
        }
    }
}

/// Normalize tag names to `(name, slug)` pairs, dropping names that yield
/// no slug and repeats of the same slug.
fn tag_pairs(names: &[String]) -> Vec<(String, String)> {
    let mut pairs: Vec<(String, String)> = Vec::with_capacity(names.len());
    for name in names {
        let name = name.trim();
        let Ok(slug) = Slug::from_title(name) else {
            continue;
        };
        if pairs.iter().any(|(_, s)| s == slug.as_str()) {
            continue;
        }
        pairs.push((name.to_owned(), slug.into_inner()));
    }
    pairs
}

/// Repository for news database operations.
pub struct NewsRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> NewsRepository<'a> {
    /// Create a new news repository.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Published articles, newest first.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if a query fails.
    pub async fn list(
        &self,
        filter: &NewsFilter,
        page: PageRequest,
    ) -> Result<Paged<NewsSummary>, RepositoryError> {
        let count_sql = format!("SELECT COUNT(*) {NEWS_FILTER_SQL}");
        let (total,): (i64,) = sqlx::query_as(&count_sql)
            .bind(filter.tag.as_deref())
            .bind(filter.year)
            .bind(filter.author.as_deref())
            .fetch_one(self.pool)
            .await?;

        let list_sql = format!(
            "{NEWS_COLUMNS} {NEWS_FILTER_SQL} ORDER BY n.published_at DESC, n.id DESC LIMIT $4 OFFSET $5"
        );
        let rows: Vec<NewsRow> = sqlx::query_as(&list_sql)
            .bind(filter.tag.as_deref())
            .bind(filter.year)
            .bind(filter.author.as_deref())
            .bind(page.limit())
            .bind(page.offset())
            .fetch_all(self.pool)
            .await?;

        let ids: Vec<i32> = rows.iter().map(|r| r.id.as_i32()).collect();
        let mut tags = self.tags_for(&ids).await?;

        let items = rows
            .into_iter()
            .map(|row| {
                let row_tags = tags.remove(&row.id).unwrap_or_default();
                row.into_summary(row_tags)
            })
            .collect();

        Ok(Paged::new(
            items,
            page,
            u64::try_from(total).unwrap_or_default(),
        ))
    }

    async fn tags_for(&self, ids: &[i32]) -> Result<HashMap<NewsId, Vec<Tag>>, RepositoryError> {
        if ids.is_empty() {
            return Ok(HashMap::new());
        }

        let rows: Vec<NewsTagRow> = sqlx::query_as(
            r"
            SELECT nt.news_id, t.id, t.name, t.slug
            FROM store.news_tag nt
            JOIN store.tag t ON t.id = nt.tag_id
            WHERE nt.news_id = ANY($1)
            ORDER BY t.name
            ",
        )
        .bind(ids)
        .fetch_all(self.pool)
        .await?;

        let mut by_news: HashMap<NewsId, Vec<Tag>> = HashMap::new();
        for row in rows {
            by_news.entry(row.news_id).or_default().push(Tag {
                id: row.id,
                name: row.name,
                slug: row.slug,
            });
        }
        Ok(by_news)
    }

    /// Article metadata by slug, with its last update time.
    ///
    /// Articles scheduled for a future `published_at` are only returned when
    /// `include_scheduled` is set.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if a query fails.
    pub async fn get_by_slug(
        &self,
        slug: &str,
        include_scheduled: bool,
    ) -> Result<Option<(NewsSummary, DateTime<Utc>)>, RepositoryError> {
        let sql = format!(
            "{NEWS_COLUMNS} FROM store.news n JOIN store.author a ON a.id = n.author_id \
             WHERE n.slug = $1 AND ($2 OR n.published_at <= NOW())"
        );
        let row: Option<NewsRow> = sqlx::query_as(&sql)
            .bind(slug)
            .bind(include_scheduled)
            .fetch_optional(self.pool)
            .await?;

        let Some(row) = row else {
            return Ok(None);
        };

        let tags = self
            .tags_for(&[row.id.as_i32()])
            .await?
            .remove(&row.id)
            .unwrap_or_default();
        let updated_at = row.updated_at;
        Ok(Some((row.into_summary(tags), updated_at)))
    }

    /// Tags with the number of published articles carrying them.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn tag_counts(&self) -> Result<Vec<TagCount>, RepositoryError> {
        let rows: Vec<(String, String, i64)> = sqlx::query_as(
            r"
            SELECT t.name, t.slug, COUNT(n.id) AS count
            FROM store.tag t
            JOIN store.news_tag nt ON nt.tag_id = t.id
            JOIN store.news n ON n.id = nt.news_id AND n.published_at <= NOW()
            GROUP BY t.id, t.name, t.slug
            ORDER BY count DESC, t.name
            ",
        )
        .fetch_all(self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(|(name, slug, count)| TagCount { name, slug, count })
            .collect())
    }

    /// Publication years with article counts, newest first.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn year_counts(&self) -> Result<Vec<YearCount>, RepositoryError> {
        let rows: Vec<(i32, i64)> = sqlx::query_as(
            r"
            SELECT EXTRACT(YEAR FROM published_at)::int AS year, COUNT(*) AS count
            FROM store.news
            WHERE published_at <= NOW()
            GROUP BY year
            ORDER BY year DESC
            ",
        )
        .fetch_all(self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(|(year, count)| YearCount { year, count })
            .collect())
    }

    /// All authors with their published article counts.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn authors(&self) -> Result<Vec<Author>, RepositoryError> {
        let rows: Vec<AuthorRow> = sqlx::query_as(
            r"
            SELECT a.id, a.name, a.slug, a.bio,
                   (SELECT COUNT(*) FROM store.news n
                    WHERE n.author_id = a.id AND n.published_at <= NOW()) AS article_count
            FROM store.author a
            ORDER BY a.name
            ",
        )
        .fetch_all(self.pool)
        .await?;
        Ok(rows.into_iter().map(Author::from).collect())
    }

    /// Create an author.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Conflict` if the slug is taken.
    pub async fn create_author(
        &self,
        name: &str,
        slug: &Slug,
        bio: &str,
    ) -> Result<Author, RepositoryError> {
        let row: AuthorRow = sqlx::query_as(
            r"
            INSERT INTO store.author (name, slug, bio)
            VALUES ($1, $2, $3)
            RETURNING id, name, slug, bio, 0::int8 AS article_count
            ",
        )
        .bind(name)
        .bind(slug.as_str())
        .bind(bio)
        .fetch_one(self.pool)
        .await
        .map_err(|e| RepositoryError::conflict_on_unique(e, "author slug already exists"))?;
        Ok(row.into())
    }

    /// Create an article's metadata and tags.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Conflict` if the slug is taken,
    /// `RepositoryError::NotFound` if the author does not exist.
    pub async fn create(&self, draft: &NewsDraft) -> Result<NewsId, RepositoryError> {
        let mut tx = self.pool.begin().await?;

        let (id,): (NewsId,) = sqlx::query_as(
            r"
            INSERT INTO store.news (author_id, title, slug, summary, image_url, published_at)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING id
            ",
        )
        .bind(draft.author_id)
        .bind(&draft.title)
        .bind(&draft.slug)
        .bind(&draft.summary)
        .bind(draft.image_url.as_deref())
        .bind(draft.published_at)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| match RepositoryError::conflict_on_unique(e, "news slug already exists") {
            RepositoryError::Database(e) => RepositoryError::not_found_on_foreign_key(e),
            other => other,
        })?;

        replace_tags(&mut tx, id, &draft.tags).await?;

        tx.commit().await?;
        Ok(id)
    }

    /// Replace an article's metadata and tags. The slug may change.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if no article has `slug`,
    /// `RepositoryError::Conflict` if the new slug is taken.
    pub async fn update(&self, slug: &str, draft: &NewsDraft) -> Result<NewsId, RepositoryError> {
        let mut tx = self.pool.begin().await?;

        let row: Option<(NewsId,)> = sqlx::query_as(
            r"
            UPDATE store.news
            SET author_id = $2, title = $3, slug = $4, summary = $5, image_url = $6,
                published_at = $7, updated_at = NOW()
            WHERE slug = $1
            RETURNING id
            ",
        )
        .bind(slug)
        .bind(draft.author_id)
        .bind(&draft.title)
        .bind(&draft.slug)
        .bind(&draft.summary)
        .bind(draft.image_url.as_deref())
        .bind(draft.published_at)
        .fetch_optional(&mut *tx)
        .await
        .map_err(|e| match RepositoryError::conflict_on_unique(e, "news slug already exists") {
            RepositoryError::Database(e) => RepositoryError::not_found_on_foreign_key(e),
            other => other,
        })?;

        let Some((id,)) = row else {
            return Err(RepositoryError::NotFound);
        };

        replace_tags(&mut tx, id, &draft.tags).await?;

        tx.commit().await?;
        Ok(id)
    }

    /// Delete an article's metadata.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if no article has `slug`.
    pub async fn delete(&self, slug: &str) -> Result<(), RepositoryError> {
        let result = sqlx::query("DELETE FROM store.news WHERE slug = $1")
            .bind(slug)
            .execute(self.pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }
        Ok(())
    }
}

/// Upsert the named tags and relink them to `news_id`.
async fn replace_tags(
    tx: &mut Transaction<'_, Postgres>,
    news_id: NewsId,
    names: &[String],
) -> Result<(), RepositoryError> {
    sqlx::query("DELETE FROM store.news_tag WHERE news_id = $1")
        .bind(news_id)
        .execute(&mut **tx)
        .await?;

    for (name, slug) in tag_pairs(names) {
        let (tag_id,): (TagId,) = sqlx::query_as(
            r"
            INSERT INTO store.tag (name, slug)
            VALUES ($1, $2)
            ON CONFLICT (slug) DO UPDATE SET name = store.tag.name
            RETURNING id
            ",
        )
        .bind(&name)
        .bind(&slug)
        .fetch_one(&mut **tx)
        .await?;

        sqlx::query("INSERT INTO store.news_tag (news_id, tag_id) VALUES ($1, $2)")
            .bind(news_id)
            .bind(tag_id)
            .execute(&mut **tx)
            .await?;
    }

    Ok(())
}
