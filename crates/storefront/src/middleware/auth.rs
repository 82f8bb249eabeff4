//! Authentication extractors.
//!
//! The session layer puts a `Session` in request extensions; these
//! extractors read the `CurrentUser` stored under `session_keys::CURRENT_USER`.
//! Without a session (or without a user in it) protected handlers answer 401.

use axum::{
    extract::FromRequestParts,
    http::request::Parts,
    response::{IntoResponse, Response},
};
use tower_sessions::Session;

use crate::error::AppError;
use crate::models::{CurrentUser, session_keys};

/// Extractor that requires a logged-in user.
///
/// # Example
///
/// ```rust,ignore
/// async fn protected_handler(
///     RequireAuth(user): RequireAuth,
/// ) -> impl IntoResponse {
///     format!("Hello, {}!", user.username)
/// }
/// ```
pub struct RequireAuth(pub CurrentUser);

/// Extractor that requires a logged-in admin.
pub struct RequireAdmin(pub CurrentUser);

/// Rejection for the auth extractors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthRejection {
    /// No user in the session.
    Unauthorized,
    /// User present but lacks the admin role.
    Forbidden,
}

impl IntoResponse for AuthRejection {
    fn into_response(self) -> Response {
        match self {
            Self::Unauthorized => {
                AppError::Unauthorized("Authentication required".to_string()).into_response()
            }
            Self::Forbidden => {
                AppError::Forbidden("Administrator role required".to_string()).into_response()
            }
        }
    }
}

async fn session_user(parts: &Parts) -> Option<CurrentUser> {
    let session = parts.extensions.get::<Session>()?;
    session
        .get::<CurrentUser>(session_keys::CURRENT_USER)
        .await
        .ok()
        .flatten()
}

impl<S> FromRequestParts<S> for RequireAuth
where
    S: Send + Sync,
{
    type Rejection = AuthRejection;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        session_user(parts)
            .await
            .map(Self)
            .ok_or(AuthRejection::Unauthorized)
    }
}

impl<S> FromRequestParts<S> for RequireAdmin
where
    S: Send + Sync,
{
    type Rejection = AuthRejection;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let user = session_user(parts)
            .await
            .ok_or(AuthRejection::Unauthorized)?;

        if !user.is_admin() {
            tracing::warn!(user_id = %user.id, path = %parts.uri.path(), "Non-admin attempted admin action");
            return Err(AuthRejection::Forbidden);
        }

        Ok(Self(user))
    }
}

/// Extractor that optionally gets the current user.
///
/// Unlike `RequireAuth`, this does not reject the request if nobody is logged in.
pub struct OptionalAuth(pub Option<CurrentUser>);

impl<S> FromRequestParts<S> for OptionalAuth
where
    S: Send + Sync,
{
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(Self(session_user(parts).await))
    }
}

/// Store the current user in the session, rotating the session id.
///
/// # Errors
///
/// Returns an error if the session cannot be modified.
pub async fn set_current_user(
    session: &Session,
    user: &CurrentUser,
) -> Result<(), tower_sessions::session::Error> {
    session.cycle_id().await?;
    session.insert(session_keys::CURRENT_USER, user).await
}

/// Clear the session (logout).
///
/// # Errors
///
/// Returns an error if the session cannot be modified.
pub async fn clear_current_user(session: &Session) -> Result<(), tower_sessions::session::Error> {
    session.flush().await
}
