//! Forum repository: channels, posts, comments and votes.
//!
//! Scores are never stored; they are the sum of the vote rows of a target.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use sqlx::PgPool;
use thiserror::Error;

use discvault_core::{
    ChannelId, CommentId, CommentRecord, PageRequest, Paged, PostId, UserId, VoteAction,
    VoteTally, VoteValue, build_thread,
};

use super::RepositoryError;
use crate::models::community::{Channel, Comment, PostDetail, PostSummary, VoteOutcome};

/// Errors specific to posting comments.
#[derive(Debug, Error)]
pub enum ForumError {
    #[error("parent comment does not belong to this post")]
    ForeignParent,

    #[error(transparent)]
    Repository(#[from] RepositoryError),
}

impl From<sqlx::Error> for ForumError {
    fn from(err: sqlx::Error) -> Self {
        Self::Repository(RepositoryError::Database(err))
    }
}

/// Something a user can vote on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VoteTarget {
    Post(PostId),
    Comment(CommentId),
}

impl VoteTarget {
    const fn table(self) -> &'static str {
        match self {
            Self::Post(_) => "store.post_vote",
            Self::Comment(_) => "store.comment_vote",
        }
    }

    const fn column(self) -> &'static str {
        match self {
            Self::Post(_) => "post_id",
            Self::Comment(_) => "comment_id",
        }
    }

    const fn id(self) -> i32 {
        match self {
            Self::Post(id) => id.as_i32(),
            Self::Comment(id) => id.as_i32(),
        }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct ChannelRow {
    id: ChannelId,
    name: String,
    slug: String,
    description: String,
    post_count: i64,
}

impl From<ChannelRow> for Channel {
    fn from(row: ChannelRow) -> Self {
        Self {
            id: row.id,
            name: row.name,
            slug: row.slug,
            description: row.description,
            post_count: row.post_count,
        }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct PostSummaryRow {
    id: PostId,
    channel_id: ChannelId,
    author_id: UserId,
    author_name: String,
    title: String,
    score: i64,
    comment_count: i64,
    created_at: DateTime<Utc>,
}

impl From<PostSummaryRow> for PostSummary {
    fn from(row: PostSummaryRow) -> Self {
        Self {
            id: row.id,
            channel_id: row.channel_id,
            author_id: row.author_id,
            author_name: row.author_name,
            title: row.title,
            score: row.score,
            comment_count: row.comment_count,
            created_at: row.created_at,
        }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct PostRow {
    id: PostId,
    channel_id: ChannelId,
    channel_slug: String,
    author_id: UserId,
    author_name: String,
    title: String,
    body: String,
    score: i64,
    my_vote: Option<i16>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

#[derive(Debug, sqlx::FromRow)]
struct CommentRow {
    id: CommentId,
    parent_comment_id: Option<CommentId>,
    author_id: UserId,
    author_name: String,
    body: String,
    created_at: DateTime<Utc>,
    score: i64,
}

#[derive(Debug, sqlx::FromRow)]
struct NewCommentRow {
    id: CommentId,
    post_id: PostId,
    parent_comment_id: Option<CommentId>,
    user_id: UserId,
    body: String,
    created_at: DateTime<Utc>,
}

fn decode_vote(value: Option<i16>) -> Result<Option<VoteValue>, RepositoryError> {
    value
        .map(VoteValue::try_from)
        .transpose()
        .map_err(|e| RepositoryError::DataCorruption(e.to_string()))
}

/// Fold raw vote rows into a tally, rejecting anything but -1 and 1.
fn tally_votes(values: impl IntoIterator<Item = i16>) -> Result<VoteTally, RepositoryError> {
    values
        .into_iter()
        .map(|v| VoteValue::try_from(v).map_err(|e| RepositoryError::DataCorruption(e.to_string())))
        .collect()
}

/// Repository for forum database operations.
pub struct ForumRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> ForumRepository<'a> {
    /// Create a new forum repository.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    // =========================================================================
    // Channels
    // =========================================================================

    /// List channels with their post counts.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list_channels(&self) -> Result<Vec<Channel>, RepositoryError> {
        let rows: Vec<ChannelRow> = sqlx::query_as(
            r"
            SELECT c.id, c.name, c.slug, c.description,
                   (SELECT COUNT(*) FROM store.post p WHERE p.channel_id = c.id) AS post_count
            FROM store.channel c
            ORDER BY c.name
            ",
        )
        .fetch_all(self.pool)
        .await?;
        Ok(rows.into_iter().map(Channel::from).collect())
    }

    /// Find a channel by slug.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn channel_by_slug(&self, slug: &str) -> Result<Option<Channel>, RepositoryError> {
        let row: Option<ChannelRow> = sqlx::query_as(
            r"
            SELECT c.id, c.name, c.slug, c.description,
                   (SELECT COUNT(*) FROM store.post p WHERE p.channel_id = c.id) AS post_count
            FROM store.channel c
            WHERE c.slug = $1
            ",
        )
        .bind(slug)
        .fetch_optional(self.pool)
        .await?;
        Ok(row.map(Channel::from))
    }

    /// Create a channel.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Conflict` if the slug is taken.
    pub async fn create_channel(
        &self,
        name: &str,
        slug: &str,
        description: &str,
    ) -> Result<Channel, RepositoryError> {
        let row: ChannelRow = sqlx::query_as(
            r"
            INSERT INTO store.channel (name, slug, description)
            VALUES ($1, $2, $3)
            RETURNING id, name, slug, description, 0::int8 AS post_count
            ",
        )
        .bind(name)
        .bind(slug)
        .bind(description)
        .fetch_one(self.pool)
        .await
        .map_err(|e| RepositoryError::conflict_on_unique(e, "channel slug already exists"))?;
        Ok(row.into())
    }

    // =========================================================================
    // Posts
    // =========================================================================

    /// List a channel's posts, newest first, with scores and comment counts.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if a query fails.
    pub async fn list_posts(
        &self,
        channel_id: ChannelId,
        page: PageRequest,
    ) -> Result<Paged<PostSummary>, RepositoryError> {
        let (total,): (i64,) =
            sqlx::query_as("SELECT COUNT(*) FROM store.post WHERE channel_id = $1")
                .bind(channel_id)
                .fetch_one(self.pool)
                .await?;

        let rows: Vec<PostSummaryRow> = sqlx::query_as(
            r"
            SELECT p.id, p.channel_id, p.user_id AS author_id,
                   COALESCE(u.display_name, u.username) AS author_name, p.title,
                   COALESCE((SELECT SUM(v.value) FROM store.post_vote v WHERE v.post_id = p.id), 0)::int8
                       AS score,
                   (SELECT COUNT(*) FROM store.comment c WHERE c.post_id = p.id) AS comment_count,
                   p.created_at
            FROM store.post p
            JOIN store.user u ON u.id = p.user_id
            WHERE p.channel_id = $1
            ORDER BY p.created_at DESC, p.id DESC
            LIMIT $2 OFFSET $3
            ",
        )
        .bind(channel_id)
        .bind(page.limit())
        .bind(page.offset())
        .fetch_all(self.pool)
        .await?;

        Ok(Paged::new(
            rows.into_iter().map(PostSummary::from).collect(),
            page,
            u64::try_from(total).unwrap_or_default(),
        ))
    }

    /// Create a post.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the channel does not exist.
    pub async fn create_post(
        &self,
        channel_id: ChannelId,
        user_id: UserId,
        title: &str,
        body: &str,
    ) -> Result<PostId, RepositoryError> {
        let (id,): (PostId,) = sqlx::query_as(
            r"
            INSERT INTO store.post (channel_id, user_id, title, body)
            VALUES ($1, $2, $3, $4)
            RETURNING id
            ",
        )
        .bind(channel_id)
        .bind(user_id)
        .bind(title)
        .bind(body)
        .fetch_one(self.pool)
        .await
        .map_err(RepositoryError::not_found_on_foreign_key)?;
        Ok(id)
    }

    /// Get a post with its score, the viewer's vote and the comment thread.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if a query fails.
    pub async fn get_post(
        &self,
        id: PostId,
        viewer: Option<UserId>,
    ) -> Result<Option<PostDetail>, RepositoryError> {
        let row: Option<PostRow> = sqlx::query_as(
            r"
            SELECT p.id, p.channel_id, ch.slug AS channel_slug, p.user_id AS author_id,
                   COALESCE(u.display_name, u.username) AS author_name,
                   p.title, p.body,
                   COALESCE((SELECT SUM(v.value) FROM store.post_vote v WHERE v.post_id = p.id), 0)::int8
                       AS score,
                   (SELECT v.value FROM store.post_vote v WHERE v.post_id = p.id AND v.user_id = $2)
                       AS my_vote,
                   p.created_at, p.updated_at
            FROM store.post p
            JOIN store.channel ch ON ch.id = p.channel_id
            JOIN store.user u ON u.id = p.user_id
            WHERE p.id = $1
            ",
        )
        .bind(id)
        .bind(viewer)
        .fetch_optional(self.pool)
        .await?;

        let Some(row) = row else {
            return Ok(None);
        };

        let comment_rows: Vec<CommentRow> = sqlx::query_as(
            r"
            SELECT c.id, c.parent_comment_id, c.user_id AS author_id,
                   COALESCE(u.display_name, u.username) AS author_name,
                   c.body, c.created_at,
                   COALESCE((SELECT SUM(v.value) FROM store.comment_vote v WHERE v.comment_id = c.id), 0)::int8
                       AS score
            FROM store.comment c
            JOIN store.user u ON u.id = c.user_id
            WHERE c.post_id = $1
            ",
        )
        .bind(id)
        .fetch_all(self.pool)
        .await?;

        let scores: HashMap<CommentId, i64> =
            comment_rows.iter().map(|c| (c.id, c.score)).collect();
        let records = comment_rows
            .into_iter()
            .map(|c| CommentRecord {
                id: c.id,
                parent_id: c.parent_comment_id,
                author_id: c.author_id,
                author_name: c.author_name,
                body: c.body,
                created_at: c.created_at,
            })
            .collect();

        Ok(Some(PostDetail {
            id: row.id,
            channel_id: row.channel_id,
            channel_slug: row.channel_slug,
            author_id: row.author_id,
            author_name: row.author_name,
            title: row.title,
            body: row.body,
            score: row.score,
            my_vote: decode_vote(row.my_vote)?,
            comments: build_thread(records, &scores),
            created_at: row.created_at,
            updated_at: row.updated_at,
        }))
    }

    /// Author of a post.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn post_author(&self, id: PostId) -> Result<Option<UserId>, RepositoryError> {
        let row: Option<(UserId,)> = sqlx::query_as("SELECT user_id FROM store.post WHERE id = $1")
            .bind(id)
            .fetch_optional(self.pool)
            .await?;
        Ok(row.map(|(user_id,)| user_id))
    }

    /// Delete a post with its comments and votes.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the post does not exist.
    pub async fn delete_post(&self, id: PostId) -> Result<(), RepositoryError> {
        let result = sqlx::query("DELETE FROM store.post WHERE id = $1")
            .bind(id)
            .execute(self.pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }
        Ok(())
    }

    // =========================================================================
    // Comments
    // =========================================================================

    /// Add a comment to a post, optionally as a reply.
    ///
    /// # Errors
    ///
    /// - `ForumError::ForeignParent` if the parent comment is missing or
    ///   belongs to another post
    /// - `RepositoryError::NotFound` (wrapped) if the post does not exist
    pub async fn create_comment(
        &self,
        post_id: PostId,
        user_id: UserId,
        parent: Option<CommentId>,
        body: &str,
    ) -> Result<Comment, ForumError> {
        if let Some(parent_id) = parent {
            let parent_post: Option<(PostId,)> =
                sqlx::query_as("SELECT post_id FROM store.comment WHERE id = $1")
                    .bind(parent_id)
                    .fetch_optional(self.pool)
                    .await?;
            if parent_post.is_none_or(|(p,)| p != post_id) {
                return Err(ForumError::ForeignParent);
            }
        }

        let row: NewCommentRow = sqlx::query_as(
            r"
            INSERT INTO store.comment (post_id, user_id, parent_comment_id, body)
            VALUES ($1, $2, $3, $4)
            RETURNING id, post_id, parent_comment_id, user_id, body, created_at
            ",
        )
        .bind(post_id)
        .bind(user_id)
        .bind(parent)
        .bind(body)
        .fetch_one(self.pool)
        .await
        .map_err(RepositoryError::not_found_on_foreign_key)?;

        Ok(Comment {
            id: row.id,
            post_id: row.post_id,
            parent_comment_id: row.parent_comment_id,
            author_id: row.user_id,
            body: row.body,
            created_at: row.created_at,
        })
    }

    /// Author of a comment.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn comment_author(&self, id: CommentId) -> Result<Option<UserId>, RepositoryError> {
        let row: Option<(UserId,)> =
            sqlx::query_as("SELECT user_id FROM store.comment WHERE id = $1")
                .bind(id)
                .fetch_optional(self.pool)
                .await?;
        Ok(row.map(|(user_id,)| user_id))
    }

    /// Delete a comment and, by cascade, its replies.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the comment does not exist.
    pub async fn delete_comment(&self, id: CommentId) -> Result<(), RepositoryError> {
        let result = sqlx::query("DELETE FROM store.comment WHERE id = $1")
            .bind(id)
            .execute(self.pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }
        Ok(())
    }

    // =========================================================================
    // Votes
    // =========================================================================

    /// Toggle a vote.
    ///
    /// Repeating the stored direction removes the vote; anything else
    /// replaces it. The existing row is locked for the duration so
    /// concurrent toggles by the same user serialize.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the target does not exist.
    pub async fn vote(
        &self,
        target: VoteTarget,
        user_id: UserId,
        requested: VoteValue,
    ) -> Result<VoteOutcome, RepositoryError> {
        let table = target.table();
        let column = target.column();
        let mut tx = self.pool.begin().await?;

        let select = format!(
            "SELECT value FROM {table} WHERE {column} = $1 AND user_id = $2 FOR UPDATE"
        );
        let existing: Option<(i16,)> = sqlx::query_as(&select)
            .bind(target.id())
            .bind(user_id)
            .fetch_optional(&mut *tx)
            .await?;
        let existing = decode_vote(existing.map(|(v,)| v))?;

        let action = VoteAction::resolve(existing, requested);
        match action {
            VoteAction::Remove => {
                let delete = format!("DELETE FROM {table} WHERE {column} = $1 AND user_id = $2");
                sqlx::query(&delete)
                    .bind(target.id())
                    .bind(user_id)
                    .execute(&mut *tx)
                    .await?;
            }
            VoteAction::Upsert(value) => {
                let upsert = format!(
                    "INSERT INTO {table} ({column}, user_id, value) VALUES ($1, $2, $3) \
                     ON CONFLICT ({column}, user_id) DO UPDATE SET value = EXCLUDED.value"
                );
                sqlx::query(&upsert)
                    .bind(target.id())
                    .bind(user_id)
                    .bind(value.as_i16())
                    .execute(&mut *tx)
                    .await
                    .map_err(RepositoryError::not_found_on_foreign_key)?;
            }
        }

        let values_sql = format!("SELECT value FROM {table} WHERE {column} = $1");
        let values: Vec<(i16,)> = sqlx::query_as(&values_sql)
            .bind(target.id())
            .fetch_all(&mut *tx)
            .await?;

        tx.commit().await?;

        let tally = tally_votes(values.into_iter().map(|(v,)| v))?;
        Ok(VoteOutcome {
            score: tally.score,
            my_vote: action.resulting_vote(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_vote_target_tables() {
        let post = VoteTarget::Post(PostId::new(4));
        assert_eq!(post.table(), "store.post_vote");
        assert_eq!(post.column(), "post_id");
        assert_eq!(post.id(), 4);

        let comment = VoteTarget::Comment(CommentId::new(9));
        assert_eq!(comment.table(), "store.comment_vote");
        assert_eq!(comment.column(), "comment_id");
        assert_eq!(comment.id(), 9);
    }

    #[test]
    fn test_decode_vote_rejects_bad_values() {
        assert_eq!(decode_vote(Some(1)).unwrap_or_default(), Some(VoteValue::Up));
        assert_eq!(decode_vote(None).unwrap_or_default(), None);
        assert!(decode_vote(Some(3)).is_err());
    }

    #[test]
    fn test_tally_votes_sums_rows() {
        let tally = tally_votes([1, 1, -1, 1]).unwrap_or_default();
        assert_eq!(tally.score, 2);
        assert_eq!(tally.up, 3);
        assert_eq!(tally.down, 1);

        assert_eq!(tally_votes([]).unwrap_or_default().score, 0);
        assert!(matches!(
            tally_votes([1, 0]),
            Err(RepositoryError::DataCorruption(_))
        ));
    }
}
