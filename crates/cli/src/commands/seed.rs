//! Seed the catalog, forum channels and news authors from a YAML file.
//!
//! Seeding is additive and can be re-run: categories are upserted by slug,
//! and genres, creators, products, channels and authors that already exist
//! (by name, title or slug) are skipped.
//!
//! ```yaml
//! categories:
//!   - name: Music
//!     slug: music
//!     kind: music
//!     genres: [Jazz, Rock]
//! creators:
//!   - name: Miles Davis
//!     kind: artist
//! products:
//!   - title: Kind of Blue
//!     category: music
//!     creator: Miles Davis
//!     genres: [Jazz]
//!     price: "19.99"
//!     stock: 12
//!     releaseYear: 1959
//! channels:
//!   - name: General
//! authors:
//!   - name: Disc Vault Staff
//! ```

use std::collections::{HashMap, HashSet};
use std::path::Path;

use rust_decimal::Decimal;
use serde::Deserialize;
use tracing::{error, info, warn};

use discvault_core::pricing::is_valid_price;
use discvault_core::{CategoryKind, CreatorKind, Slug};
use discvault_storefront::db::{CatalogRepository, ForumRepository, NewsRepository};
use discvault_storefront::models::catalog::ProductDraft;

use super::connect;

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SeedFile {
    #[serde(default)]
    pub categories: Vec<CategorySeed>,
    #[serde(default)]
    pub creators: Vec<CreatorSeed>,
    #[serde(default)]
    pub products: Vec<ProductSeed>,
    #[serde(default)]
    pub channels: Vec<ChannelSeed>,
    #[serde(default)]
    pub authors: Vec<AuthorSeed>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CategorySeed {
    pub name: String,
    pub slug: Option<String>,
    pub kind: CategoryKind,
    #[serde(default)]
    pub genres: Vec<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct CreatorSeed {
    pub name: String,
    pub kind: CreatorKind,
    pub bio: Option<String>,
    pub image_url: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct ProductSeed {
    pub title: String,
    /// Category slug.
    pub category: String,
    /// Creator name; the creator kind follows from the category.
    pub creator: Option<String>,
    #[serde(default)]
    pub genres: Vec<String>,
    #[serde(default)]
    pub description: String,
    pub price: Decimal,
    #[serde(default)]
    pub stock: i32,
    pub release_year: Option<i16>,
    pub image_url: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ChannelSeed {
    pub name: String,
    pub slug: Option<String>,
    #[serde(default)]
    pub description: String,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AuthorSeed {
    pub name: String,
    pub slug: Option<String>,
    #[serde(default)]
    pub bio: String,
}

fn slug_for(explicit: Option<&str>, name: &str) -> Option<Slug> {
    match explicit {
        Some(s) => Slug::parse(s).ok(),
        None => Slug::from_title(name).ok(),
    }
}

/// Check cross references and values before touching the database.
///
/// Returns one message per problem; an empty list means the file is valid.
#[must_use]
pub fn validate(seed: &SeedFile) -> Vec<String> {
    let mut errors = Vec::new();
    let mut category_genres: HashMap<String, (CategoryKind, HashSet<String>)> = HashMap::new();

    for category in &seed.categories {
        let Some(slug) = slug_for(category.slug.as_deref(), &category.name) else {
            errors.push(format!("category '{}': invalid slug", category.name));
            continue;
        };
        let genres = category.genres.iter().map(|g| g.to_lowercase()).collect();
        if category_genres
            .insert(slug.into_inner(), (category.kind, genres))
            .is_some()
        {
            errors.push(format!("category '{}': duplicate slug", category.name));
        }
    }

    let creators: HashSet<(CreatorKind, String)> = seed
        .creators
        .iter()
        .map(|c| (c.kind, c.name.to_lowercase()))
        .collect();

    for product in &seed.products {
        let label = format!("product '{}'", product.title);
        if product.title.trim().is_empty() {
            errors.push(format!("{label}: empty title"));
        }
        if !is_valid_price(product.price) {
            errors.push(format!("{label}: invalid price {}", product.price));
        }
        if product.stock < 0 {
            errors.push(format!("{label}: negative stock"));
        }

        let Some((kind, genres)) = category_genres.get(&product.category) else {
            errors.push(format!("{label}: unknown category '{}'", product.category));
            continue;
        };
        for genre in &product.genres {
            if !genres.contains(&genre.to_lowercase()) {
                errors.push(format!(
                    "{label}: genre '{genre}' is not listed under '{}'",
                    product.category
                ));
            }
        }
        if let Some(creator) = &product.creator {
            let creator_kind = kind.creator_kind();
            if !creators.contains(&(creator_kind, creator.to_lowercase())) {
                errors.push(format!("{label}: unknown {creator_kind:?} '{creator}'"));
            }
        }
    }

    for channel in &seed.channels {
        if slug_for(channel.slug.as_deref(), &channel.name).is_none() {
            errors.push(format!("channel '{}': invalid slug", channel.name));
        }
    }
    for author in &seed.authors {
        if slug_for(author.slug.as_deref(), &author.name).is_none() {
            errors.push(format!("author '{}': invalid slug", author.name));
        }
    }

    errors
}

/// Counts reported at the end of a seeding run.
#[derive(Debug, Default)]
struct SeedReport {
    inserted: usize,
    skipped: usize,
}

impl SeedReport {
    fn record(&mut self, inserted: bool) {
        if inserted {
            self.inserted += 1;
        } else {
            self.skipped += 1;
        }
    }
}

/// Seed from a YAML file.
///
/// # Errors
///
/// Returns an error if the file cannot be read or parsed, fails
/// validation, or a database operation fails.
#[allow(clippy::too_many_lines)]
pub async fn run(file_path: &str) -> Result<(), Box<dyn std::error::Error>> {
    let path = Path::new(file_path);
    if !path.exists() {
        return Err(format!("File not found: {file_path}").into());
    }

    info!(path = %file_path, "Loading seed file");
    let content = tokio::fs::read_to_string(path).await?;
    let seed: SeedFile = serde_yaml::from_str(&content)?;

    let errors = validate(&seed);
    if !errors.is_empty() {
        error!("Seed file validation failed:");
        for err in &errors {
            error!("  - {err}");
        }
        return Err(format!("{} validation errors found", errors.len()).into());
    }

    let pool = connect().await?;
    let catalog = CatalogRepository::new(&pool);
    let mut report = SeedReport::default();

    let mut categories = HashMap::new();
    let mut genres = HashMap::new();
    for entry in &seed.categories {
        let slug = slug_for(entry.slug.as_deref(), &entry.name)
            .ok_or_else(|| format!("category '{}': invalid slug", entry.name))?;
        let category = catalog.upsert_category(&entry.name, &slug, entry.kind).await?;

        let existing = catalog.list_genres(Some(category.id)).await?;
        for name in &entry.genres {
            let found = existing.iter().find(|g| g.name.eq_ignore_ascii_case(name));
            let genre = match found {
                Some(genre) => genre.clone(),
                None => catalog.create_genre(category.id, name).await?,
            };
            report.record(found.is_none());
            genres.insert((category.id, name.to_lowercase()), genre.id);
        }
        info!(category = %category.slug, "Category ready");
        categories.insert(category.slug.clone(), category);
    }

    let existing = catalog.list_creators(None).await?;
    let mut creators = HashMap::new();
    for entry in &seed.creators {
        let found = existing
            .iter()
            .find(|c| c.kind == entry.kind && c.name.eq_ignore_ascii_case(&entry.name));
        let creator = match found {
            Some(creator) => creator.clone(),
            None => {
                catalog
                    .create_creator(
                        &entry.name,
                        entry.kind,
                        entry.bio.as_deref(),
                        entry.image_url.as_deref(),
                    )
                    .await?
            }
        };
        report.record(found.is_none());
        creators.insert((creator.kind, creator.name.to_lowercase()), creator.id);
    }

    for entry in &seed.products {
        let category = categories
            .get(&entry.category)
            .ok_or_else(|| format!("unknown category '{}'", entry.category))?;

        if catalog
            .find_product_by_title(category.id, &entry.title)
            .await?
            .is_some()
        {
            report.record(false);
            continue;
        }

        let creator_id = entry.creator.as_ref().and_then(|name| {
            creators
                .get(&(category.creator_kind, name.to_lowercase()))
                .copied()
        });
        let genre_ids = entry
            .genres
            .iter()
            .filter_map(|g| genres.get(&(category.id, g.to_lowercase())).copied())
            .collect();

        let draft = ProductDraft {
            category_id: category.id,
            creator_id,
            title: entry.title.trim().to_owned(),
            description: entry.description.trim().to_owned(),
            price: entry.price,
            stock: entry.stock,
            release_year: entry.release_year,
            image_url: entry.image_url.clone(),
            genre_ids,
        };
        let id = catalog.create_product(&draft).await?;
        info!(product_id = %id, title = %draft.title, "Product created");
        report.record(true);
    }

    let forum = ForumRepository::new(&pool);
    let existing = forum.list_channels().await?;
    for entry in &seed.channels {
        let slug = slug_for(entry.slug.as_deref(), &entry.name)
            .ok_or_else(|| format!("channel '{}': invalid slug", entry.name))?;
        let found = existing.iter().any(|c| c.slug == slug.as_str());
        if !found {
            forum
                .create_channel(&entry.name, slug.as_str(), &entry.description)
                .await?;
        }
        report.record(!found);
    }

    let news = NewsRepository::new(&pool);
    let existing = news.authors().await?;
    for entry in &seed.authors {
        let slug = slug_for(entry.slug.as_deref(), &entry.name)
            .ok_or_else(|| format!("author '{}': invalid slug", entry.name))?;
        let found = existing.iter().any(|a| a.slug == slug.as_str());
        if !found {
            news.create_author(&entry.name, &slug, &entry.bio).await?;
        }
        report.record(!found);
    }

    info!("Seeding complete!");
    info!("  Records inserted: {}", report.inserted);
    if report.skipped > 0 {
        warn!("  Records skipped (already exist): {}", report.skipped);
    }

    Ok(())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    const SAMPLE: &str = include_str!("../../seed/catalog.yaml");

    #[test]
    fn test_sample_file_is_valid() {
        let seed: SeedFile = serde_yaml::from_str(SAMPLE).unwrap();
        assert!(!seed.categories.is_empty());
        assert!(!seed.products.is_empty());
        assert_eq!(validate(&seed), Vec::<String>::new());
    }

    #[test]
    fn test_unknown_references_are_reported() {
        let seed: SeedFile = serde_yaml::from_str(
            r#"
categories:
  - name: Games
    kind: game
    genres: [RPG]
creators:
  - name: Someone
    kind: artist
products:
  - title: Quest
    category: games
    creator: Someone
    genres: [Shooter]
    price: "59.99"
  - title: Lost
    category: books
    price: "1.00"
"#,
        )
        .unwrap();

        let errors = validate(&seed);
        assert_eq!(errors.len(), 3, "{errors:?}");
        assert!(errors.iter().any(|e| e.contains("genre 'Shooter'")));
        assert!(errors.iter().any(|e| e.contains("unknown Studio 'Someone'")));
        assert!(errors.iter().any(|e| e.contains("unknown category 'books'")));
    }

    #[test]
    fn test_invalid_price_is_reported() {
        let seed: SeedFile = serde_yaml::from_str(
            r#"
categories:
  - name: Movies
    kind: movie
products:
  - title: Heat
    category: movies
    price: "9.999"
"#,
        )
        .unwrap();
        let errors = validate(&seed);
        assert_eq!(errors.len(), 1);
        assert!(errors[0].contains("invalid price"));
    }

    #[test]
    fn test_unknown_fields_are_rejected() {
        assert!(serde_yaml::from_str::<SeedFile>("albums: []").is_err());
    }
}
