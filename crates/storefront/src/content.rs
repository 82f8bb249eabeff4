//! Markdown content store for news article bodies.
//!
//! Article metadata (title, author, tags, publish date) lives in the
//! database; bodies live in `<content_dir>/<slug>.md`. Every file is loaded
//! and rendered at startup, and writes go to disk before the in-memory copy
//! is replaced.
//!
//! Files may start with a YAML frontmatter block. The store writes a
//! `title` entry so a content directory stays readable on its own.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, PoisonError, RwLock};

use comrak::{Options, markdown_to_html};
use gray_matter::{Matter, ParsedEntity, engine::YAML};
use serde::Deserialize;

use discvault_core::Slug;

/// Average reading speed used for the reading-time estimate.
const WORDS_PER_MINUTE: usize = 200;

/// Frontmatter accepted at the top of a news body file.
#[derive(Debug, Clone, Default, Deserialize)]
struct NewsFrontMatter {
    #[serde(default)]
    title: Option<String>,
}

/// A rendered article body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewsBody {
    pub slug: String,
    pub title: Option<String>,
    pub markdown: String,
    pub html: String,
    pub reading_time_minutes: u32,
}

impl NewsBody {
    fn render(slug: &str, title: Option<String>, markdown: String) -> Self {
        let html = render_markdown(&markdown);
        let reading_time_minutes = reading_time(&markdown);
        Self {
            slug: slug.to_owned(),
            title,
            markdown,
            html,
            reading_time_minutes,
        }
    }
}

/// Content store that holds all news bodies in memory.
#[derive(Debug, Clone)]
pub struct NewsContentStore {
    dir: PathBuf,
    bodies: Arc<RwLock<HashMap<String, NewsBody>>>,
}

impl NewsContentStore {
    /// Load all bodies from `dir`. A missing directory yields an empty store.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory exists but cannot be read.
    pub fn load(dir: &Path) -> Result<Self, ContentError> {
        let mut bodies = HashMap::new();

        if dir.exists() {
            let entries = std::fs::read_dir(dir).map_err(|e| ContentError::Io(e.to_string()))?;

            for entry in entries.flatten() {
                let path = entry.path();
                if path.extension().is_some_and(|ext| ext == "md") {
                    match Self::load_body(&path) {
                        Ok(body) => {
                            tracing::debug!(slug = %body.slug, "Loaded news body");
                            bodies.insert(body.slug.clone(), body);
                        }
                        Err(e) => {
                            tracing::error!("Failed to load news body {:?}: {}", path, e);
                        }
                    }
                }
            }
        } else {
            tracing::warn!("News content directory does not exist yet: {:?}", dir);
        }

        tracing::info!(count = bodies.len(), "News content loaded");

        Ok(Self {
            dir: dir.to_path_buf(),
            bodies: Arc::new(RwLock::new(bodies)),
        })
    }

    fn load_body(path: &Path) -> Result<NewsBody, ContentError> {
        let content = std::fs::read_to_string(path).map_err(|e| ContentError::Io(e.to_string()))?;

        let slug = path
            .file_stem()
            .and_then(|s| s.to_str())
            .ok_or_else(|| ContentError::Parse("Invalid filename".to_string()))?;
        let slug = validate_slug(slug)?;

        let matter = Matter::<YAML>::new();
        let parsed: ParsedEntity<NewsFrontMatter> = matter
            .parse(&content)
            .map_err(|e| ContentError::Parse(format!("Failed to parse frontmatter: {e}")))?;
        let title = parsed.data.and_then(|meta| meta.title);

        Ok(NewsBody::render(&slug, title, parsed.content))
    }

    /// Get a rendered body by slug.
    #[must_use]
    pub fn get(&self, slug: &str) -> Option<NewsBody> {
        self.bodies
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(slug)
            .cloned()
    }

    /// Number of loaded bodies.
    #[must_use]
    pub fn len(&self) -> usize {
        self.bodies
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Write a body to disk and replace the in-memory copy.
    ///
    /// # Errors
    ///
    /// Returns `ContentError::InvalidSlug` for slugs that are not safe file
    /// names, or `ContentError::Io` if the file cannot be written.
    pub async fn write(
        &self,
        slug: &str,
        title: &str,
        markdown: &str,
    ) -> Result<NewsBody, ContentError> {
        let slug = validate_slug(slug)?;

        tokio::fs::create_dir_all(&self.dir)
            .await
            .map_err(|e| ContentError::Io(e.to_string()))?;

        // JSON strings are valid YAML scalars
        let title_yaml =
            serde_json::to_string(title).map_err(|e| ContentError::Parse(e.to_string()))?;
        let file = format!("---\ntitle: {title_yaml}\n---\n{markdown}");
        tokio::fs::write(self.path_for(&slug), file)
            .await
            .map_err(|e| ContentError::Io(e.to_string()))?;

        let body = NewsBody::render(&slug, Some(title.to_owned()), markdown.to_owned());
        self.bodies
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(slug, body.clone());

        Ok(body)
    }

    /// Move a body to a new slug (after an article rename).
    ///
    /// # Errors
    ///
    /// Returns `ContentError::NotFound` if no body exists under `from`.
    pub async fn rename(&self, from: &str, to: &str) -> Result<(), ContentError> {
        let from = validate_slug(from)?;
        let to = validate_slug(to)?;
        if from == to {
            return Ok(());
        }

        let existing = self.get(&from).ok_or(ContentError::NotFound)?;
        let title = existing.title.clone().unwrap_or_default();
        self.write(&to, &title, &existing.markdown).await?;
        self.delete(&from).await
    }

    /// Delete a body from disk and memory. Deleting a missing body is a no-op.
    ///
    /// # Errors
    ///
    /// Returns `ContentError::Io` if the file exists but cannot be removed.
    pub async fn delete(&self, slug: &str) -> Result<(), ContentError> {
        let slug = validate_slug(slug)?;

        match tokio::fs::remove_file(self.path_for(&slug)).await {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => return Err(ContentError::Io(e.to_string())),
        }

        self.bodies
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&slug);

        Ok(())
    }

    fn path_for(&self, slug: &str) -> PathBuf {
        self.dir.join(format!("{slug}.md"))
    }
}

/// Only canonical slugs may name a file; this keeps writes inside the
/// content directory.
fn validate_slug(slug: &str) -> Result<String, ContentError> {
    Slug::parse(slug)
        .map(Slug::into_inner)
        .map_err(|_| ContentError::InvalidSlug(slug.to_owned()))
}

/// Render markdown to HTML with GitHub Flavored Markdown support.
#[must_use]
pub fn render_markdown(content: &str) -> String {
    let mut options = Options::default();

    options.extension.strikethrough = true;
    options.extension.table = true;
    options.extension.autolink = true;
    options.extension.tasklist = true;
    options.extension.header_ids = Some(String::new());
    options.extension.footnotes = true;

    markdown_to_html(content, &options)
}

/// Estimated reading time in whole minutes, at least one.
fn reading_time(markdown: &str) -> u32 {
    let words = markdown.split_whitespace().count();
    u32::try_from(words.div_ceil(WORDS_PER_MINUTE))
        .unwrap_or(u32::MAX)
        .max(1)
}

/// Content loading errors
#[derive(Debug, thiserror::Error)]
pub enum ContentError {
    #[error("IO error: {0}")]
    Io(String),
    #[error("Parse error: {0}")]
    Parse(String),
    #[error("invalid content slug: {0}")]
    InvalidSlug(String),
    #[error("content not found")]
    NotFound,
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn temp_dir() -> PathBuf {
        std::env::temp_dir().join(format!("discvault-news-{}", uuid::Uuid::new_v4()))
    }

    #[test]
    fn test_render_markdown_gfm() {
        let html = render_markdown("# Hello\n\n~~old~~ news\n\n| a | b |\n|---|---|\n| 1 | 2 |\n");
        assert!(html.contains("<h1>"));
        assert!(html.contains("<del>old</del>"));
        assert!(html.contains("<table>"));
    }

    #[test]
    fn test_render_markdown_escapes_raw_html() {
        let html = render_markdown("<script>alert(1)</script>");
        assert!(!html.contains("<script>"));
    }

    #[test]
    fn test_reading_time() {
        assert_eq!(reading_time(""), 1);
        assert_eq!(reading_time(&"word ".repeat(200)), 1);
        assert_eq!(reading_time(&"word ".repeat(201)), 2);
    }

    #[test]
    fn test_load_missing_dir_is_empty() {
        let store = NewsContentStore::load(&temp_dir()).unwrap();
        assert!(store.is_empty());
    }

    #[test]
    fn test_load_strips_frontmatter() {
        let dir = temp_dir();
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(
            dir.join("restock-friday.md"),
            "---\ntitle: Restock Friday\n---\nNew **vinyl** pressings.\n",
        )
        .unwrap();
        std::fs::write(dir.join("notes.txt"), "ignored").unwrap();

        let store = NewsContentStore::load(&dir).unwrap();
        assert_eq!(store.len(), 1);

        let body = store.get("restock-friday").unwrap();
        assert_eq!(body.title.as_deref(), Some("Restock Friday"));
        assert!(!body.markdown.contains("title:"));
        assert!(body.html.contains("<strong>vinyl</strong>"));

        std::fs::remove_dir_all(&dir).unwrap();
    }

    #[tokio::test]
    async fn test_write_rename_delete() {
        let dir = temp_dir();
        let store = NewsContentStore::load(&dir).unwrap();

        store
            .write("summer-sale", "Summer \"Sale\"", "Up to *half* off.")
            .await
            .unwrap();
        assert!(dir.join("summer-sale.md").exists());

        // A fresh load sees the same body
        let reloaded = NewsContentStore::load(&dir).unwrap();
        let body = reloaded.get("summer-sale").unwrap();
        assert_eq!(body.title.as_deref(), Some("Summer \"Sale\""));
        assert!(body.html.contains("<em>half</em>"));

        store.rename("summer-sale", "summer-sale-2026").await.unwrap();
        assert!(store.get("summer-sale").is_none());
        assert!(store.get("summer-sale-2026").is_some());
        assert!(!dir.join("summer-sale.md").exists());

        store.delete("summer-sale-2026").await.unwrap();
        assert!(store.is_empty());
        store.delete("summer-sale-2026").await.unwrap();

        std::fs::remove_dir_all(&dir).unwrap();
    }

    #[tokio::test]
    async fn test_write_rejects_path_traversal() {
        let store = NewsContentStore::load(&temp_dir()).unwrap();
        let err = store.write("../etc/passwd", "x", "x").await.unwrap_err();
        assert!(matches!(err, ContentError::InvalidSlug(_)));
    }
}
