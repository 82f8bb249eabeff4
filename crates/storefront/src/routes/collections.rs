//! Collection route handlers.
//!
//! Collections are addressed by name, case-insensitively, within the
//! caller's account. The built-in collections accept items but cannot be
//! renamed or deleted.

use axum::{
    Json, Router,
    extract::State,
    http::StatusCode,
    response::IntoResponse,
    routing::{delete, get},
};
use serde::Deserialize;
use tracing::instrument;

use discvault_core::collection::ensure_mutable;
use discvault_core::{CollectionName, ProductId, UserId};

use crate::db::CollectionRepository;
use crate::error::{AppError, Result};
use crate::middleware::RequireAuth;
use crate::models::community::{CollectionItem, CollectionSummary};
use crate::routes::{ApiJson, ApiPath};
use crate::state::AppState;

/// Build the collection router.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/collections", get(index).post(create))
        .route("/api/collections/{name}", get(show).put(rename).delete(destroy))
        .route("/api/collections/{name}/items", get(items).post(add_item))
        .route(
            "/api/collections/{name}/items/{product_id}",
            delete(remove_item),
        )
}

/// Create / rename request body.
#[derive(Debug, Deserialize)]
pub struct CollectionRequest {
    pub name: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AddItemRequest {
    pub product_id: ProductId,
}

async fn find(
    repo: &CollectionRepository<'_>,
    user_id: UserId,
    name: &str,
) -> Result<CollectionSummary> {
    repo.find(user_id, name)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Collection '{name}' not found")))
}

/// The caller's collections with item counts.
///
/// # Errors
///
/// 401 without a session.
#[instrument(skip(state, user), fields(user_id = %user.id))]
pub async fn index(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
) -> Result<Json<Vec<CollectionSummary>>> {
    let collections = CollectionRepository::new(state.pool()).list(user.id).await?;
    Ok(Json(collections))
}

/// One collection.
///
/// # Errors
///
/// 404 if the caller has no collection with this name.
#[instrument(skip(state, user), fields(user_id = %user.id))]
pub async fn show(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    ApiPath(name): ApiPath<String>,
) -> Result<Json<CollectionSummary>> {
    let repo = CollectionRepository::new(state.pool());
    Ok(Json(find(&repo, user.id, &name).await?))
}

/// Create a collection.
///
/// # Errors
///
/// 400 for an empty or long name, 409 if the name is taken or built in.
#[instrument(skip(state, user, body), fields(user_id = %user.id))]
pub async fn create(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    ApiJson(body): ApiJson<CollectionRequest>,
) -> Result<impl IntoResponse> {
    let name = CollectionName::parse(&body.name)?;
    let collection = CollectionRepository::new(state.pool())
        .create(user.id, &name)
        .await?;
    tracing::info!(collection_id = %collection.id, "Collection created");
    Ok((StatusCode::CREATED, Json(collection)))
}

/// Rename a collection.
///
/// # Errors
///
/// 403 for built-in collections, 404 if missing, 409 if the new name is
/// taken.
#[instrument(skip(state, user, body), fields(user_id = %user.id))]
pub async fn rename(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    ApiPath(name): ApiPath<String>,
    ApiJson(body): ApiJson<CollectionRequest>,
) -> Result<Json<CollectionSummary>> {
    let repo = CollectionRepository::new(state.pool());
    let existing = find(&repo, user.id, &name).await?;
    ensure_mutable(&existing.name)?;

    let new_name = CollectionName::parse(&body.name)?;
    repo.rename(existing.id, &new_name).await?;
    Ok(Json(CollectionSummary {
        name: new_name.to_string(),
        ..existing
    }))
}

/// Delete a collection and its items.
///
/// # Errors
///
/// 403 for built-in collections, 404 if missing.
#[instrument(skip(state, user), fields(user_id = %user.id))]
pub async fn destroy(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    ApiPath(name): ApiPath<String>,
) -> Result<StatusCode> {
    let repo = CollectionRepository::new(state.pool());
    let existing = find(&repo, user.id, &name).await?;
    ensure_mutable(&existing.name)?;

    repo.delete(existing.id).await?;
    tracing::info!(collection_id = %existing.id, "Collection deleted");
    Ok(StatusCode::NO_CONTENT)
}

/// Items in a collection.
///
/// # Errors
///
/// 404 if the caller has no collection with this name.
#[instrument(skip(state, user), fields(user_id = %user.id))]
pub async fn items(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    ApiPath(name): ApiPath<String>,
) -> Result<Json<Vec<CollectionItem>>> {
    let repo = CollectionRepository::new(state.pool());
    let collection = find(&repo, user.id, &name).await?;
    Ok(Json(repo.items(collection.id).await?))
}

/// Add a product to a collection.
///
/// # Errors
///
/// 404 if the collection or product does not exist.
#[instrument(skip(state, user), fields(user_id = %user.id, product_id = %body.product_id))]
pub async fn add_item(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    ApiPath(name): ApiPath<String>,
    ApiJson(body): ApiJson<AddItemRequest>,
) -> Result<impl IntoResponse> {
    let repo = CollectionRepository::new(state.pool());
    let collection = find(&repo, user.id, &name).await?;
    repo.add_item(collection.id, body.product_id).await?;
    Ok((StatusCode::CREATED, Json(repo.items(collection.id).await?)))
}

/// Remove a product from a collection.
///
/// # Errors
///
/// 404 if the collection does not exist or does not hold the product.
#[instrument(skip(state, user), fields(user_id = %user.id, product_id = %product_id))]
pub async fn remove_item(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    ApiPath((name, product_id)): ApiPath<(String, ProductId)>,
) -> Result<StatusCode> {
    let repo = CollectionRepository::new(state.pool());
    let collection = find(&repo, user.id, &name).await?;
    repo.remove_item(collection.id, product_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use axum::{body::Body, http::Request};
    use tower::ServiceExt;

    use super::*;
    use crate::routes::test_support;

    #[tokio::test]
    async fn test_collections_require_session() {
        let response = test_support::app()
            .oneshot(
                Request::builder()
                    .method("DELETE")
                    .uri("/api/collections/Favorites")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[test]
    fn test_request_name_is_parsed_with_collection_rules() {
        let body: CollectionRequest = serde_json::from_str(r#"{"name":"Favorites"}"#).unwrap();
        let err: AppError = CollectionName::parse(&body.name).unwrap_err().into();
        assert_eq!(err.status(), StatusCode::CONFLICT);
    }
}
