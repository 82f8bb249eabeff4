//! Forum route handlers: channels, posts, threaded comments and votes.

use axum::{
    Json, Router,
    extract::State,
    http::StatusCode,
    response::IntoResponse,
    routing::{delete, get, post},
};
use serde::Deserialize;
use tracing::instrument;

use discvault_core::{CommentId, Paged, PostId, Slug, VoteValue};

use crate::db::ForumRepository;
use crate::db::forum::VoteTarget;
use crate::error::{AppError, Result, add_breadcrumb};
use crate::middleware::{OptionalAuth, RequireAdmin, RequireAuth};
use crate::models::community::{Channel, PostDetail, PostSummary, VoteOutcome};
use crate::routes::{ApiJson, ApiPath, ApiQuery, PageQuery, ensure_owner_or_admin, require_text};
use crate::state::AppState;

const MAX_NAME_LENGTH: usize = 80;
const MAX_TITLE_LENGTH: usize = 200;
const MAX_BODY_LENGTH: usize = 20_000;

/// Build the forum router.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/channels", get(channels).post(create_channel))
        .route("/api/channels/{slug}/posts", get(posts).post(create_post))
        .route("/api/posts/{id}", get(show_post).delete(delete_post))
        .route("/api/posts/{id}/vote", post(vote_post))
        .route("/api/posts/{id}/comments", post(create_comment))
        .route("/api/comments/{id}", delete(delete_comment))
        .route("/api/comments/{id}/vote", post(vote_comment))
}

/// Create channel request body. The slug defaults to one derived from the
/// name.
#[derive(Debug, Deserialize)]
pub struct ChannelRequest {
    pub name: String,
    pub slug: Option<String>,
    #[serde(default)]
    pub description: String,
}

impl ChannelRequest {
    fn slug(&self, name: &str) -> Result<Slug> {
        let slug = match self.slug.as_deref().map(str::trim) {
            Some(s) if !s.is_empty() => Slug::parse(s)?,
            _ => Slug::from_title(name)?,
        };
        Ok(slug)
    }
}

#[derive(Debug, Deserialize)]
pub struct PostRequest {
    pub title: String,
    pub body: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommentRequest {
    pub body: String,
    pub parent_comment_id: Option<CommentId>,
}

/// Vote request body; `value` is `1` or `-1`.
#[derive(Debug, Deserialize)]
pub struct VoteRequest {
    pub value: VoteValue,
}

async fn channel(repo: &ForumRepository<'_>, slug: &str) -> Result<Channel> {
    repo.channel_by_slug(slug)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Channel '{slug}' not found")))
}

/// List channels.
///
/// # Errors
///
/// 500 if the database is unavailable.
#[instrument(skip(state))]
pub async fn channels(State(state): State<AppState>) -> Result<Json<Vec<Channel>>> {
    let channels = ForumRepository::new(state.pool()).list_channels().await?;
    Ok(Json(channels))
}

/// Create a channel.
///
/// # Errors
///
/// 400 for a blank name or malformed slug, 409 if the slug is taken.
#[instrument(skip(state, admin, body), fields(admin_id = %admin.id))]
pub async fn create_channel(
    State(state): State<AppState>,
    RequireAdmin(admin): RequireAdmin,
    ApiJson(body): ApiJson<ChannelRequest>,
) -> Result<impl IntoResponse> {
    let name = require_text("name", &body.name, MAX_NAME_LENGTH)?;
    let slug = body.slug(&name)?;
    let channel = ForumRepository::new(state.pool())
        .create_channel(&name, slug.as_str(), body.description.trim())
        .await?;
    tracing::info!(channel = %channel.slug, "Channel created");
    Ok((StatusCode::CREATED, Json(channel)))
}

/// Posts in a channel, newest first.
///
/// # Errors
///
/// 404 for an unknown channel.
#[instrument(skip(state))]
pub async fn posts(
    State(state): State<AppState>,
    ApiPath(slug): ApiPath<String>,
    ApiQuery(query): ApiQuery<PageQuery>,
) -> Result<Json<Paged<PostSummary>>> {
    let repo = ForumRepository::new(state.pool());
    let channel = channel(&repo, &slug).await?;
    let posts = repo.list_posts(channel.id, query.request()).await?;
    Ok(Json(posts))
}

/// Start a thread in a channel.
///
/// # Errors
///
/// 400 for a blank title or body, 404 for an unknown channel.
#[instrument(skip(state, user, body), fields(user_id = %user.id))]
pub async fn create_post(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    ApiPath(slug): ApiPath<String>,
    ApiJson(body): ApiJson<PostRequest>,
) -> Result<impl IntoResponse> {
    let title = require_text("title", &body.title, MAX_TITLE_LENGTH)?;
    let text = require_text("body", &body.body, MAX_BODY_LENGTH)?;

    let repo = ForumRepository::new(state.pool());
    let channel = channel(&repo, &slug).await?;
    let id = repo.create_post(channel.id, user.id, &title, &text).await?;
    add_breadcrumb("forum", "post created", Some(&[("channel", channel.slug.as_str())]));

    let post = repo
        .get_post(id, Some(user.id))
        .await?
        .ok_or_else(|| AppError::Internal(format!("post {id} vanished after insert")))?;
    Ok((StatusCode::CREATED, Json(post)))
}

/// A post with its score, the caller's vote and the comment thread.
///
/// # Errors
///
/// 404 if the post does not exist.
#[instrument(skip(state, viewer), fields(post_id = %id))]
pub async fn show_post(
    State(state): State<AppState>,
    OptionalAuth(viewer): OptionalAuth,
    ApiPath(id): ApiPath<PostId>,
) -> Result<Json<PostDetail>> {
    ForumRepository::new(state.pool())
        .get_post(id, viewer.map(|u| u.id))
        .await?
        .map(Json)
        .ok_or_else(|| AppError::NotFound(format!("Post {id} not found")))
}

/// Delete a post with its comments and votes.
///
/// # Errors
///
/// 404 if missing, 403 unless the caller wrote it or is an administrator.
#[instrument(skip(state, user), fields(user_id = %user.id, post_id = %id))]
pub async fn delete_post(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    ApiPath(id): ApiPath<PostId>,
) -> Result<StatusCode> {
    let repo = ForumRepository::new(state.pool());
    let author = repo
        .post_author(id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Post {id} not found")))?;
    ensure_owner_or_admin(&user, author)?;

    repo.delete_post(id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Toggle the caller's vote on a post.
///
/// # Errors
///
/// 400 for a value other than 1 or -1, 404 if the post does not exist.
#[instrument(skip(state, user), fields(user_id = %user.id, post_id = %id))]
pub async fn vote_post(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    ApiPath(id): ApiPath<PostId>,
    ApiJson(body): ApiJson<VoteRequest>,
) -> Result<Json<VoteOutcome>> {
    let outcome = ForumRepository::new(state.pool())
        .vote(VoteTarget::Post(id), user.id, body.value)
        .await?;
    Ok(Json(outcome))
}

/// Comment on a post, or reply to one of its comments.
///
/// # Errors
///
/// 400 if the parent comment belongs to another post, 404 if the post does
/// not exist.
#[instrument(skip(state, user, body), fields(user_id = %user.id, post_id = %id))]
pub async fn create_comment(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    ApiPath(id): ApiPath<PostId>,
    ApiJson(body): ApiJson<CommentRequest>,
) -> Result<impl IntoResponse> {
    let text = require_text("body", &body.body, MAX_BODY_LENGTH)?;
    let comment = ForumRepository::new(state.pool())
        .create_comment(id, user.id, body.parent_comment_id, &text)
        .await?;
    Ok((StatusCode::CREATED, Json(comment)))
}

/// Delete a comment and its replies.
///
/// # Errors
///
/// 404 if missing, 403 unless the caller wrote it or is an administrator.
#[instrument(skip(state, user), fields(user_id = %user.id, comment_id = %id))]
pub async fn delete_comment(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    ApiPath(id): ApiPath<CommentId>,
) -> Result<StatusCode> {
    let repo = ForumRepository::new(state.pool());
    let author = repo
        .comment_author(id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Comment {id} not found")))?;
    ensure_owner_or_admin(&user, author)?;

    repo.delete_comment(id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Toggle the caller's vote on a comment.
///
/// # Errors
///
/// 400 for a value other than 1 or -1, 404 if the comment does not exist.
#[instrument(skip(state, user), fields(user_id = %user.id, comment_id = %id))]
pub async fn vote_comment(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    ApiPath(id): ApiPath<CommentId>,
    ApiJson(body): ApiJson<VoteRequest>,
) -> Result<Json<VoteOutcome>> {
    let outcome = ForumRepository::new(state.pool())
        .vote(VoteTarget::Comment(id), user.id, body.value)
        .await?;
    Ok(Json(outcome))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use axum::{body::Body, http::Request};
    use tower::ServiceExt;

    use super::*;
    use crate::routes::test_support;

    #[test]
    fn test_vote_value_must_be_unit() {
        assert!(serde_json::from_str::<VoteRequest>(r#"{"value":2}"#).is_err());
        assert!(serde_json::from_str::<VoteRequest>(r#"{"value":0}"#).is_err());
        let down: VoteRequest = serde_json::from_str(r#"{"value":-1}"#).unwrap();
        assert_eq!(down.value, VoteValue::Down);
    }

    #[test]
    fn test_channel_slug_defaults_to_name() {
        let request = ChannelRequest {
            name: "Sci-Fi Talk".to_string(),
            slug: None,
            description: String::new(),
        };
        assert_eq!(request.slug("Sci-Fi Talk").unwrap().as_str(), "sci-fi-talk");

        let explicit = ChannelRequest {
            slug: Some("Not A Slug".to_string()),
            ..request
        };
        assert!(explicit.slug("Sci-Fi Talk").is_err());
    }

    #[tokio::test]
    async fn test_vote_requires_session() {
        let response = test_support::app()
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/api/posts/1/vote")
                    .header("content-type", "application/json")
                    .body(Body::from(r#"{"value":1}"#))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }
}
