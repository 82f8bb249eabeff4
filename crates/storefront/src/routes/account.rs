//! Account route handlers.
//!
//! These routes require authentication.

use axum::{
    Json, Router,
    extract::State,
    http::StatusCode,
    routing::{get, post},
};
use serde::Deserialize;
use tracing::instrument;

use crate::db::UserRepository;
use crate::error::{AppError, Result};
use crate::middleware::RequireAuth;
use crate::models::{Profile, User};
use crate::routes::ApiJson;
use crate::services::AuthService;
use crate::state::AppState;

/// Build the account router.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/account/profile", get(profile).put(update_profile))
        .route("/api/account/password", post(change_password))
}

/// Password change request body.
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PasswordChangeRequest {
    pub current_password: String,
    pub new_password: String,
}

/// Get the caller's profile.
///
/// # Errors
///
/// 401 without a session.
#[instrument(skip(state, user), fields(user_id = %user.id))]
pub async fn profile(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
) -> Result<Json<User>> {
    let user = AuthService::new(state.pool()).get_user(user.id).await?;
    Ok(Json(user))
}

/// Replace the caller's profile fields. Blank fields are cleared.
///
/// # Errors
///
/// 400 if a field is longer than [`Profile::MAX_FIELD_LENGTH`].
#[instrument(skip(state, user, profile), fields(user_id = %user.id))]
pub async fn update_profile(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    ApiJson(profile): ApiJson<Profile>,
) -> Result<Json<User>> {
    let profile = profile.normalized();
    if let Some(field) = profile.oversized_field() {
        return Err(AppError::BadRequest(format!(
            "{field} must be at most {} characters",
            Profile::MAX_FIELD_LENGTH
        )));
    }

    let updated = UserRepository::new(state.pool())
        .update_profile(user.id, &profile)
        .await?;
    Ok(Json(updated))
}

/// Change the caller's password.
///
/// # Errors
///
/// 401 if the current password is wrong, 400 if the new one is too weak.
#[instrument(skip(state, user, body), fields(user_id = %user.id))]
pub async fn change_password(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    ApiJson(body): ApiJson<PasswordChangeRequest>,
) -> Result<StatusCode> {
    AuthService::new(state.pool())
        .change_password(user.id, &body.current_password, &body.new_password)
        .await?;
    tracing::info!("Password changed");
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
    async fn test_profile_update_requires_session() {
        let response = test_support::app()
            .oneshot(
                Request::builder()
                    .method("PUT")
                    .uri("/api/account/profile")
                    .header("content-type", "application/json")
                    .body(Body::from(r#"{"city":"Lyon"}"#))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }
}
