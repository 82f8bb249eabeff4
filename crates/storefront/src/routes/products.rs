//! Product route handlers.

use axum::{
    Json, Router,
    extract::State,
    http::StatusCode,
    response::IntoResponse,
    routing::get,
};
use rust_decimal::Decimal;
use serde::Deserialize;
use tracing::instrument;

use discvault_core::pricing::is_valid_price;
use discvault_core::{
    CategoryId, CreatorId, GenreId, PageRequest, Paged, ProductFilter, ProductId, ProductSort,
};

use crate::db::CatalogRepository;
use crate::error::{AppError, Result};
use crate::middleware::RequireAdmin;
use crate::models::catalog::{ProductDetail, ProductDraft, ProductSummary};
use crate::routes::{ApiJson, ApiPath, ApiQuery, require_text};
use crate::state::AppState;

const MAX_TITLE_LENGTH: usize = 200;
const MAX_DESCRIPTION_LENGTH: usize = 10_000;

/// Build the product router.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/products", get(index).post(create))
        .route(
            "/api/products/{id}",
            get(show).put(update).delete(destroy),
        )
}

/// Product listing query string.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductQuery {
    pub category_id: Option<CategoryId>,
    pub creator_id: Option<CreatorId>,
    pub genre_id: Option<GenreId>,
    pub price_min: Option<Decimal>,
    pub price_max: Option<Decimal>,
    pub min_rating: Option<i16>,
    pub in_stock: Option<bool>,
    pub q: Option<String>,
    pub sort: Option<ProductSort>,
    pub page: Option<u32>,
    pub page_size: Option<u32>,
}

impl ProductQuery {
    fn into_parts(self) -> (ProductFilter, PageRequest) {
        let page = PageRequest::new(self.page, self.page_size);
        let filter = ProductFilter {
            category_id: self.category_id,
            creator_id: self.creator_id,
            genre_id: self.genre_id,
            price_min: self.price_min,
            price_max: self.price_max,
            min_rating: self.min_rating,
            in_stock: self.in_stock,
            search: self.q,
            sort: self.sort.unwrap_or_default(),
        };
        (filter, page)
    }
}

/// Create / update product request body.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductRequest {
    pub category_id: CategoryId,
    pub creator_id: Option<CreatorId>,
    pub title: String,
    #[serde(default)]
    pub description: String,
    pub price: Decimal,
    #[serde(default)]
    pub stock: i32,
    pub release_year: Option<i16>,
    pub image_url: Option<String>,
    #[serde(default)]
    pub genre_ids: Vec<GenreId>,
}

impl ProductRequest {
    fn into_draft(self) -> Result<ProductDraft> {
        let title = require_text("title", &self.title, MAX_TITLE_LENGTH)?;
        if self.description.chars().count() > MAX_DESCRIPTION_LENGTH {
            return Err(AppError::BadRequest(format!(
                "description must be at most {MAX_DESCRIPTION_LENGTH} characters"
            )));
        }
        if !is_valid_price(self.price) {
            return Err(AppError::BadRequest(
                "price must be between 0 and 99999999.99 with at most two decimal places"
                    .to_string(),
            ));
        }
        if self.stock < 0 {
            return Err(AppError::BadRequest("stock cannot be negative".to_string()));
        }
        if self.release_year.is_some_and(|y| !(1900..=2100).contains(&y)) {
            return Err(AppError::BadRequest(
                "releaseYear must be between 1900 and 2100".to_string(),
            ));
        }

        Ok(ProductDraft {
            category_id: self.category_id,
            creator_id: self.creator_id,
            title,
            description: self.description.trim().to_owned(),
            price: self.price,
            stock: self.stock,
            release_year: self.release_year,
            image_url: self.image_url.filter(|u| !u.trim().is_empty()),
            genre_ids: self.genre_ids,
        })
    }
}

/// List products.
///
/// # Errors
///
/// 400 for contradictory or out-of-range filters.
#[instrument(skip(state))]
pub async fn index(
    State(state): State<AppState>,
    ApiQuery(query): ApiQuery<ProductQuery>,
) -> Result<Json<Paged<ProductSummary>>> {
    let (filter, page) = query.into_parts();
    let filter = filter.validate()?;

    let products = CatalogRepository::new(state.pool())
        .list_products(&filter, page)
        .await?;
    Ok(Json(products))
}

/// Product detail.
///
/// # Errors
///
/// 404 if the product does not exist.
#[instrument(skip(state), fields(product_id = %id))]
pub async fn show(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<ProductId>,
) -> Result<Json<ProductDetail>> {
    CatalogRepository::new(state.pool())
        .get_product(id)
        .await?
        .map(Json)
        .ok_or_else(|| AppError::NotFound(format!("Product {id} not found")))
}

/// Create a product.
///
/// # Errors
///
/// 400 for invalid fields, 404 for unknown category, creator or genre.
#[instrument(skip(state, admin, body), fields(admin_id = %admin.id))]
pub async fn create(
    State(state): State<AppState>,
    RequireAdmin(admin): RequireAdmin,
    ApiJson(body): ApiJson<ProductRequest>,
) -> Result<impl IntoResponse> {
    let draft = body.into_draft()?;
    let repo = CatalogRepository::new(state.pool());
    let id = repo.create_product(&draft).await?;
    tracing::info!(product_id = %id, "Product created");

    let product = repo
        .get_product(id)
        .await?
        .ok_or_else(|| AppError::Internal(format!("product {id} vanished after insert")))?;
    Ok((StatusCode::CREATED, Json(product)))
}

/// Replace a product, including its genres.
///
/// # Errors
///
/// 400 for invalid fields, 404 if the product or a reference is missing.
#[instrument(skip(state, admin, body), fields(admin_id = %admin.id, product_id = %id))]
pub async fn update(
    State(state): State<AppState>,
    RequireAdmin(admin): RequireAdmin,
    ApiPath(id): ApiPath<ProductId>,
    ApiJson(body): ApiJson<ProductRequest>,
) -> Result<Json<ProductDetail>> {
    let draft = body.into_draft()?;
    let repo = CatalogRepository::new(state.pool());
    repo.update_product(id, &draft).await?;

    repo.get_product(id)
        .await?
        .map(Json)
        .ok_or_else(|| AppError::NotFound(format!("Product {id} not found")))
}

/// Delete a product.
///
/// # Errors
///
/// 404 if missing, 409 if the product appears on orders.
#[instrument(skip(state, admin), fields(admin_id = %admin.id, product_id = %id))]
pub async fn destroy(
    State(state): State<AppState>,
    RequireAdmin(admin): RequireAdmin,
    ApiPath(id): ApiPath<ProductId>,
) -> Result<StatusCode> {
    CatalogRepository::new(state.pool()).delete_product(id).await?;
    tracing::info!("Product deleted");
    Ok(StatusCode::NO_CONTENT)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use axum::{body::Body, http::Request};
    use tower::ServiceExt;

    use super::*;
    use crate::routes::test_support;

    async fn get(uri: &str) -> (StatusCode, serde_json::Value) {
        let response = test_support::app()
            .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
            .await
            .unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        (status, serde_json::from_slice(&bytes).unwrap_or_default())
    }

    #[test]
    fn test_query_maps_to_filter() {
        let query: ProductQuery = parse_query(
            "categoryId=1&priceMin=100&priceMax=500&inStock=true&sort=price_asc&page=2",
        );
        let (filter, page) = query.into_parts();
        assert_eq!(filter.category_id, Some(CategoryId::new(1)));
        assert_eq!(filter.price_min, Some(Decimal::from(100)));
        assert_eq!(filter.price_max, Some(Decimal::from(500)));
        assert_eq!(filter.in_stock, Some(true));
        assert_eq!(filter.sort, ProductSort::PriceAsc);
        assert_eq!(page.page(), 2);
    }

    fn parse_query(qs: &str) -> ProductQuery {
        let uri: axum::http::Uri = format!("/?{qs}").parse().unwrap();
        axum::extract::Query::<ProductQuery>::try_from_uri(&uri)
            .unwrap()
            .0
    }

    #[tokio::test]
    async fn test_inverted_price_range_is_rejected() {
        let (status, body) = get("/api/products?priceMin=500&priceMax=100").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "bad_request");
    }

    #[tokio::test]
    async fn test_out_of_range_rating_is_rejected() {
        let (status, _) = get("/api/products?minRating=9").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_malformed_query_is_rejected() {
        let (status, body) = get("/api/products?categoryId=abc").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "bad_request");
    }

    #[tokio::test]
    async fn test_create_requires_session() {
        let response = test_support::app()
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/api/products")
                    .header("content-type", "application/json")
                    .body(Body::from(r#"{"categoryId":1,"title":"Heat","price":"9.99"}"#))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[test]
    fn test_product_request_validation() {
        let request = |price: &str, stock: i32| ProductRequest {
            category_id: CategoryId::new(1),
            creator_id: None,
            title: " Heat ".to_string(),
            description: String::new(),
            price: price.parse().unwrap(),
            stock,
            release_year: Some(1995),
            image_url: Some("  ".to_string()),
            genre_ids: Vec::new(),
        };

        let draft = request("9.99", 3).into_draft().unwrap();
        assert_eq!(draft.title, "Heat");
        assert_eq!(draft.image_url, None);

        assert!(request("-1", 3).into_draft().is_err());
        assert!(request("9.999", 3).into_draft().is_err());
        assert!(request("9.99", -1).into_draft().is_err());
        assert!(request("99999999.99", 1).into_draft().is_ok());
        let err = request("100000000", 1).into_draft().unwrap_err();
        assert_eq!(err.status(), StatusCode::BAD_REQUEST);
    }
}
