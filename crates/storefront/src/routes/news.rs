//! News route handlers.
//!
//! Metadata lives in the database and bodies in the markdown content
//! store, both keyed by the article slug. Writes update the database first
//! and then the store.

use axum::{
    Json, Router,
    extract::State,
    http::StatusCode,
    response::IntoResponse,
    routing::get,
};
use chrono::{DateTime, Utc};
use serde::Deserialize;
use tracing::instrument;

use discvault_core::{AuthorId, Paged, Slug};

use crate::content::ContentError;
use crate::db::NewsRepository;
use crate::db::news::NewsFilter;
use crate::error::{AppError, Result};
use crate::middleware::{OptionalAuth, RequireAdmin};
use crate::models::CurrentUser;
use crate::models::news::{Author, NewsArticle, NewsDraft, NewsSummary, TagCount, YearCount};
use crate::routes::{ApiJson, ApiPath, ApiQuery, require_text};
use crate::state::AppState;

const MAX_TITLE_LENGTH: usize = 200;
const MAX_SUMMARY_LENGTH: usize = 1_000;
const MAX_TAGS: usize = 20;

/// Build the news router.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/news", get(index).post(create))
        .route("/api/news/tags", get(tags))
        .route("/api/news/years", get(years))
        .route("/api/news/authors", get(authors).post(create_author))
        .route("/api/news/{slug}", get(show).put(update).delete(destroy))
}

/// Feed query string.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewsQuery {
    pub tag: Option<String>,
    pub year: Option<i32>,
    pub author: Option<String>,
    pub page: Option<u32>,
    pub page_size: Option<u32>,
}

/// Create / update article request body.
///
/// The slug defaults to one derived from the title. On update a missing
/// `markdown` keeps the current body.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewsRequest {
    pub author_id: AuthorId,
    pub title: String,
    pub slug: Option<String>,
    #[serde(default)]
    pub summary: String,
    pub image_url: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
    pub published_at: Option<DateTime<Utc>>,
    pub markdown: Option<String>,
}

impl NewsRequest {
    fn to_draft(&self) -> Result<NewsDraft> {
        let title = require_text("title", &self.title, MAX_TITLE_LENGTH)?;
        let slug = match self.slug.as_deref().map(str::trim) {
            Some(s) if !s.is_empty() => Slug::parse(s)?,
            _ => Slug::from_title(&title)?,
        };
        let summary = self.summary.trim();
        if summary.chars().count() > MAX_SUMMARY_LENGTH {
            return Err(AppError::BadRequest(format!(
                "summary must be at most {MAX_SUMMARY_LENGTH} characters"
            )));
        }
        if self.tags.len() > MAX_TAGS {
            return Err(AppError::BadRequest(format!(
                "at most {MAX_TAGS} tags are allowed"
            )));
        }

        Ok(NewsDraft {
            author_id: self.author_id,
            title,
            slug: slug.into_inner(),
            summary: summary.to_owned(),
            image_url: self.image_url.clone().filter(|u| !u.trim().is_empty()),
            tags: self.tags.clone(),
            published_at: self.published_at.unwrap_or_else(Utc::now),
        })
    }
}

#[derive(Debug, Deserialize)]
pub struct AuthorRequest {
    pub name: String,
    pub slug: Option<String>,
    #[serde(default)]
    pub bio: String,
}

/// Administrators may read scheduled articles before they go live.
fn can_preview(viewer: Option<&CurrentUser>) -> bool {
    viewer.is_some_and(CurrentUser::is_admin)
}

async fn load_article(
    state: &AppState,
    slug: &str,
    include_scheduled: bool,
) -> Result<Option<NewsArticle>> {
    let Some((meta, updated_at)) = NewsRepository::new(state.pool())
        .get_by_slug(slug, include_scheduled)
        .await?
    else {
        return Ok(None);
    };

    let body = state.news_content().get(slug);
    if body.is_none() {
        tracing::warn!(slug, "News article has no body in the content store");
    }
    let (markdown, html, reading_time_minutes) = body
        .map(|b| (b.markdown, b.html, b.reading_time_minutes))
        .unwrap_or_default();

    Ok(Some(NewsArticle {
        meta,
        markdown,
        html,
        reading_time_minutes,
        updated_at,
    }))
}

/// Published articles, newest first.
///
/// # Errors
///
/// 500 if the database is unavailable.
#[instrument(skip(state))]
pub async fn index(
    State(state): State<AppState>,
    ApiQuery(query): ApiQuery<NewsQuery>,
) -> Result<Json<Paged<NewsSummary>>> {
    let page = discvault_core::PageRequest::new(query.page, query.page_size);
    let filter = NewsFilter {
        tag: query.tag.filter(|t| !t.is_empty()),
        year: query.year,
        author: query.author.filter(|a| !a.is_empty()),
    };
    let news = NewsRepository::new(state.pool()).list(&filter, page).await?;
    Ok(Json(news))
}

/// Tags with article counts.
///
/// # Errors
///
/// 500 if the database is unavailable.
#[instrument(skip(state))]
pub async fn tags(State(state): State<AppState>) -> Result<Json<Vec<TagCount>>> {
    Ok(Json(NewsRepository::new(state.pool()).tag_counts().await?))
}

/// Years with article counts, newest first.
///
/// # Errors
///
/// 500 if the database is unavailable.
#[instrument(skip(state))]
pub async fn years(State(state): State<AppState>) -> Result<Json<Vec<YearCount>>> {
    Ok(Json(NewsRepository::new(state.pool()).year_counts().await?))
}

/// All authors.
///
/// # Errors
///
/// 500 if the database is unavailable.
#[instrument(skip(state))]
pub async fn authors(State(state): State<AppState>) -> Result<Json<Vec<Author>>> {
    Ok(Json(NewsRepository::new(state.pool()).authors().await?))
}

/// Create an author.
///
/// # Errors
///
/// 400 for a blank name, 409 if the slug is taken.
#[instrument(skip(state, admin, body), fields(admin_id = %admin.id))]
pub async fn create_author(
    State(state): State<AppState>,
    RequireAdmin(admin): RequireAdmin,
    ApiJson(body): ApiJson<AuthorRequest>,
) -> Result<impl IntoResponse> {
    let name = require_text("name", &body.name, MAX_TITLE_LENGTH)?;
    let slug = match body.slug.as_deref().map(str::trim) {
        Some(s) if !s.is_empty() => Slug::parse(s)?,
        _ => Slug::from_title(&name)?,
    };
    let author = NewsRepository::new(state.pool())
        .create_author(&name, &slug, body.bio.trim())
        .await?;
    Ok((StatusCode::CREATED, Json(author)))
}

/// An article with its markdown and rendered HTML.
///
/// # Errors
///
/// 404 if no article has this slug, or it is scheduled and the caller is
/// not an administrator.
#[instrument(skip(state, viewer))]
pub async fn show(
    State(state): State<AppState>,
    OptionalAuth(viewer): OptionalAuth,
    ApiPath(slug): ApiPath<String>,
) -> Result<Json<NewsArticle>> {
    load_article(&state, &slug, can_preview(viewer.as_ref()))
        .await?
        .map(Json)
        .ok_or_else(|| AppError::NotFound(format!("Article '{slug}' not found")))
}

/// Publish an article.
///
/// # Errors
///
/// 400 for invalid fields, 404 for an unknown author, 409 if the slug is
/// taken.
#[instrument(skip(state, admin, body), fields(admin_id = %admin.id))]
pub async fn create(
    State(state): State<AppState>,
    RequireAdmin(admin): RequireAdmin,
    ApiJson(body): ApiJson<NewsRequest>,
) -> Result<impl IntoResponse> {
    let draft = body.to_draft()?;
    let id = NewsRepository::new(state.pool()).create(&draft).await?;

    state
        .news_content()
        .write(
            &draft.slug,
            &draft.title,
            body.markdown.as_deref().unwrap_or_default(),
        )
        .await?;
    tracing::info!(news_id = %id, slug = %draft.slug, "News article published");

    let article = load_article(&state, &draft.slug, true)
        .await?
        .ok_or_else(|| AppError::Internal(format!("article {id} vanished after insert")))?;
    Ok((StatusCode::CREATED, Json(article)))
}

/// Replace an article. Changing the slug moves its body.
///
/// # Errors
///
/// 404 if no article has this slug, 409 if the new slug is taken.
#[instrument(skip(state, admin, body), fields(admin_id = %admin.id))]
pub async fn update(
    State(state): State<AppState>,
    RequireAdmin(admin): RequireAdmin,
    ApiPath(slug): ApiPath<String>,
    ApiJson(body): ApiJson<NewsRequest>,
) -> Result<Json<NewsArticle>> {
    let draft = body.to_draft()?;
    NewsRepository::new(state.pool()).update(&slug, &draft).await?;

    let content = state.news_content();
    if draft.slug != slug {
        match content.rename(&slug, &draft.slug).await {
            Ok(()) | Err(ContentError::NotFound) => {}
            Err(e) => return Err(e.into()),
        }
        tracing::info!(from = %slug, to = %draft.slug, "News article renamed");
    }

    let markdown = match body.markdown {
        Some(markdown) => markdown,
        None => content
            .get(&draft.slug)
            .map(|b| b.markdown)
            .unwrap_or_default(),
    };
    content.write(&draft.slug, &draft.title, &markdown).await?;

    load_article(&state, &draft.slug, true)
        .await?
        .map(Json)
        .ok_or_else(|| AppError::NotFound(format!("Article '{}' not found", draft.slug)))
}

/// Delete an article and its body.
///
/// # Errors
///
/// 404 if no article has this slug.
#[instrument(skip(state, admin), fields(admin_id = %admin.id))]
pub async fn destroy(
    State(state): State<AppState>,
    RequireAdmin(admin): RequireAdmin,
    ApiPath(slug): ApiPath<String>,
) -> Result<StatusCode> {
    NewsRepository::new(state.pool()).delete(&slug).await?;
    state.news_content().delete(&slug).await?;
    tracing::info!(slug = %slug, "News article deleted");
    Ok(StatusCode::NO_CONTENT)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use axum::{body::Body, http::Request};
    use tower::ServiceExt;

    use super::*;
    use crate::routes::test_support;

    fn request(json: &str) -> NewsRequest {
        serde_json::from_str(json).unwrap()
    }

    #[test]
    fn test_slug_derived_from_title() {
        let draft = request(r#"{"authorId":1,"title":"Criterion Spring Sale!","tags":["Sales"]}"#)
            .to_draft()
            .unwrap();
        assert_eq!(draft.slug, "criterion-spring-sale");
        assert_eq!(draft.tags, vec!["Sales".to_string()]);
        assert!(draft.published_at <= Utc::now());
    }

    #[test]
    fn test_explicit_slug_must_be_canonical() {
        let err = request(r#"{"authorId":1,"title":"Hello","slug":"Hello World"}"#)
            .to_draft()
            .unwrap_err();
        assert_eq!(err.status(), StatusCode::BAD_REQUEST);

        let draft = request(r#"{"authorId":1,"title":"Hello","slug":"hello-again"}"#)
            .to_draft()
            .unwrap();
        assert_eq!(draft.slug, "hello-again");
    }

    fn viewer(role: discvault_core::Role) -> CurrentUser {
        CurrentUser {
            id: discvault_core::UserId::generate(),
            username: discvault_core::Username::parse("reader").unwrap(),
            email: discvault_core::Email::parse("reader@example.com").unwrap(),
            role,
        }
    }

    #[test]
    fn test_only_admins_preview_scheduled_articles() {
        assert!(!can_preview(None));
        assert!(!can_preview(Some(&viewer(discvault_core::Role::User))));
        assert!(can_preview(Some(&viewer(discvault_core::Role::Admin))));
    }

    #[test]
    fn test_blank_title_is_rejected() {
        assert!(request(r#"{"authorId":1,"title":"   "}"#).to_draft().is_err());
    }

    #[tokio::test]
    async fn test_publish_requires_session() {
        let response = test_support::app()
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/api/news")
                    .header("content-type", "application/json")
                    .body(Body::from(r#"{"authorId":1,"title":"Hello"}"#))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_year_must_be_numeric() {
        let response = test_support::app()
            .oneshot(
                Request::builder()
                    .uri("/api/news?year=last")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }
}
