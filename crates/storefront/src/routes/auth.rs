//! Registration, login and logout.
//!
//! A successful register or login stores a [`CurrentUser`] in the session
//! (rotating the session id) and returns the full account.

use axum::{
    Json, Router,
    extract::State,
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
};
use serde::Deserialize;
use tower_sessions::Session;
use tracing::instrument;

use crate::error::{AppError, Result, add_breadcrumb, clear_sentry_user, set_sentry_user};
use crate::middleware::{RequireAuth, clear_current_user, set_current_user};
use crate::models::{CurrentUser, User};
use crate::routes::ApiJson;
use crate::services::auth::{AuthService, Registration};
use crate::services::EmailMessage;
use crate::state::AppState;

/// Build the identity router.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/register", post(register))
        .route("/auth", get(me).post(login))
        .route("/auth/logout", post(logout))
}

/// Registration request body.
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterRequest {
    pub username: String,
    pub email: String,
    pub password: String,
    pub display_name: Option<String>,
}

/// Login request body. `login` is a username or an email address.
#[derive(Deserialize)]
pub struct LoginRequest {
    pub login: String,
    pub password: String,
}

async fn start_session(session: &Session, user: &User) -> Result<()> {
    let current = CurrentUser::from(user);
    set_current_user(session, &current).await.map_err(|e| {
        tracing::error!("Failed to set session: {e}");
        AppError::Internal(format!("session: {e}"))
    })?;
    set_sentry_user(&user.id, Some(user.username.as_str()));
    Ok(())
}

/// Create an account and log it in.
///
/// # Errors
///
/// 400 for invalid input, 409 when the username or email is taken.
#[instrument(skip(state, session, body), fields(username = %body.username))]
pub async fn register(
    State(state): State<AppState>,
    session: Session,
    ApiJson(body): ApiJson<RegisterRequest>,
) -> Result<impl IntoResponse> {
    let user = AuthService::new(state.pool())
        .register(Registration {
            username: &body.username,
            email: &body.email,
            password: &body.password,
            display_name: body.display_name.as_deref(),
        })
        .await
        .inspect_err(|e| tracing::warn!("Registration failed: {e}"))?;

    start_session(&session, &user).await?;
    add_breadcrumb("auth", "registered", None);

    state.email().enqueue(EmailMessage::Welcome {
        to: user.email.to_string(),
        username: user.public_name().to_owned(),
    });

    tracing::info!(user_id = %user.id, "User registered");
    Ok((StatusCode::CREATED, Json(user)))
}

/// Log in with a username or email and password.
///
/// # Errors
///
/// 401 for unknown accounts and wrong passwords alike.
#[instrument(skip(state, session, body))]
pub async fn login(
    State(state): State<AppState>,
    session: Session,
    ApiJson(body): ApiJson<LoginRequest>,
) -> Result<Json<User>> {
    let user = AuthService::new(state.pool())
        .login(&body.login, &body.password)
        .await
        .inspect_err(|e| tracing::warn!("Login failed: {e}"))?;

    start_session(&session, &user).await?;
    add_breadcrumb("auth", "logged in", None);

    Ok(Json(user))
}

/// The account behind the current session.
///
/// # Errors
///
/// 401 without a session.
#[instrument(skip(state, current), fields(user_id = %current.id))]
pub async fn me(
    State(state): State<AppState>,
    RequireAuth(current): RequireAuth,
) -> Result<Json<User>> {
    let user = AuthService::new(state.pool()).get_user(current.id).await?;
    Ok(Json(user))
}

/// End the session.
///
/// # Errors
///
/// 500 if the session store cannot be updated.
#[instrument(skip(session))]
pub async fn logout(session: Session) -> Result<StatusCode> {
    clear_current_user(&session).await.map_err(|e| {
        tracing::error!("Failed to clear session: {e}");
        AppError::Internal(format!("session: {e}"))
    })?;
    clear_sentry_user();
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
    async fn test_me_requires_session() {
        let response = test_support::app()
            .oneshot(Request::builder().uri("/auth").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let body: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(body["error"], "unauthorized");
    }
}
