//! News DTOs.

use chrono::{DateTime, Utc};
use serde::Serialize;

use discvault_core::{AuthorId, NewsId, TagId};

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Author {
    pub id: AuthorId,
    pub name: String,
    pub slug: String,
    pub bio: String,
    pub article_count: i64,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthorRef {
    pub id: AuthorId,
    pub name: String,
    pub slug: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Tag {
    pub id: TagId,
    pub name: String,
    pub slug: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TagCount {
    pub name: String,
    pub slug: String,
    pub count: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct YearCount {
    pub year: i32,
    pub count: i64,
}

/// Article metadata as listed in the feed.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NewsSummary {
    pub id: NewsId,
    pub title: String,
    pub slug: String,
    pub summary: String,
    pub image_url: Option<String>,
    pub author: AuthorRef,
    pub tags: Vec<Tag>,
    pub published_at: DateTime<Utc>,
}

/// Article metadata plus its body.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NewsArticle {
    #[serde(flatten)]
    pub meta: NewsSummary,
    pub markdown: String,
    pub html: String,
    pub reading_time_minutes: u32,
    pub updated_at: DateTime<Utc>,
}

/// Validated article fields for create and update.
#[derive(Debug, Clone)]
pub struct NewsDraft {
    pub author_id: AuthorId,
    pub title: String,
    pub slug: String,
    pub summary: String,
    pub image_url: Option<String>,
    pub tags: Vec<String>,
    pub published_at: DateTime<Utc>,
}
