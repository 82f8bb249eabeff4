//! Unified error handling with Sentry integration.
//!
//! Provides a unified `AppError` type that captures errors to Sentry before
//! responding to the client. All route handlers should return `Result<T, AppError>`.
//!
//! Every error response has the body `{"error": "<kind>", "message": "<text>"}`.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use thiserror::Error;

use discvault_core::{CollectionNameError, FilterError, RatingError, SlugError, VoteError};

use crate::content::ContentError;
use crate::db::RepositoryError;
use crate::db::forum::ForumError;
use crate::db::orders::OrderError;
use crate::services::auth::AuthError;

/// Application-level error type for the storefront.
#[derive(Debug, Error)]
pub enum AppError {
    /// Database operation failed.
    #[error("Database error: {0}")]
    Database(#[from] RepositoryError),

    /// Authentication operation failed.
    #[error("Auth error: {0}")]
    Auth(#[from] AuthError),

    /// News content store operation failed.
    #[error("Content error: {0}")]
    Content(#[from] ContentError),

    /// Resource not found.
    #[error("Not found: {0}")]
    NotFound(String),

    /// User is not authenticated.
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// User is authenticated but not allowed to do this.
    #[error("Forbidden: {0}")]
    Forbidden(String),

    /// Bad request from client.
    #[error("Bad request: {0}")]
    BadRequest(String),

    /// Request conflicts with existing state.
    #[error("Conflict: {0}")]
    Conflict(String),

    /// Rate limited.
    #[error("Rate limited")]
    RateLimited,

    /// Internal server error.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl AppError {
    /// HTTP status for this error.
    #[must_use]
    pub fn status(&self) -> StatusCode {
        match self {
            Self::Database(err) => match err {
                RepositoryError::NotFound => StatusCode::NOT_FOUND,
                RepositoryError::Conflict(_) => StatusCode::CONFLICT,
                RepositoryError::Database(_) | RepositoryError::DataCorruption(_) => {
                    StatusCode::INTERNAL_SERVER_ERROR
                }
            },
            Self::Auth(err) => match err {
                AuthError::InvalidCredentials => StatusCode::UNAUTHORIZED,
                AuthError::UserNotFound => StatusCode::NOT_FOUND,
                AuthError::UserAlreadyExists(_) => StatusCode::CONFLICT,
                AuthError::WeakPassword(_)
                | AuthError::InvalidEmail(_)
                | AuthError::InvalidUsername(_) => StatusCode::BAD_REQUEST,
                AuthError::Repository(_) | AuthError::PasswordHash => {
                    StatusCode::INTERNAL_SERVER_ERROR
                }
            },
            Self::Content(err) => match err {
                ContentError::InvalidSlug(_) => StatusCode::BAD_REQUEST,
                ContentError::NotFound => StatusCode::NOT_FOUND,
                ContentError::Io(_) | ContentError::Parse(_) => StatusCode::INTERNAL_SERVER_ERROR,
            },
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            Self::Forbidden(_) => StatusCode::FORBIDDEN,
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::Conflict(_) => StatusCode::CONFLICT,
            Self::RateLimited => StatusCode::TOO_MANY_REQUESTS,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Client-safe message. Server errors never expose their details.
    fn public_message(&self) -> String {
        match self {
            Self::Database(RepositoryError::NotFound) => "Not found".to_string(),
            Self::Database(RepositoryError::Conflict(msg)) | Self::Conflict(msg) => msg.clone(),
            Self::Auth(err) => match err {
                AuthError::InvalidCredentials => "Invalid credentials".to_string(),
                AuthError::UserNotFound => "User not found".to_string(),
                AuthError::UserAlreadyExists(field) => {
                    format!("An account with this {field} already exists")
                }
                AuthError::WeakPassword(msg) => msg.clone(),
                AuthError::InvalidEmail(e) => e.to_string(),
                AuthError::InvalidUsername(e) => e.to_string(),
                AuthError::Repository(_) | AuthError::PasswordHash => {
                    "Internal server error".to_string()
                }
            },
            Self::Content(ContentError::InvalidSlug(slug)) => format!("Invalid slug: {slug}"),
            Self::Content(ContentError::NotFound) => "Not found".to_string(),
            Self::NotFound(msg)
            | Self::Unauthorized(msg)
            | Self::Forbidden(msg)
            | Self::BadRequest(msg) => msg.clone(),
            Self::RateLimited => "Too many requests".to_string(),
            Self::Database(_) | Self::Content(_) | Self::Internal(_) => {
                "Internal server error".to_string()
            }
        }
    }

    fn kind(status: StatusCode) -> &'static str {
        match status.as_u16() {
            400 => "bad_request",
            401 => "unauthorized",
            403 => "forbidden",
            404 => "not_found",
            409 => "conflict",
            429 => "rate_limited",
            _ => "internal",
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();

        // Capture server errors to Sentry
        if status.is_server_error() {
            let event_id = sentry::capture_error(&self);
            tracing::error!(
                error = %self,
                sentry_event_id = %event_id,
                "Request error"
            );
        } else {
            tracing::debug!(error = %self, status = status.as_u16(), "Request rejected");
        }

        let body = json!({
            "error": Self::kind(status),
            "message": self.public_message(),
        });

        (status, Json(body)).into_response()
    }
}

impl From<FilterError> for AppError {
    fn from(err: FilterError) -> Self {
        Self::BadRequest(err.to_string())
    }
}

impl From<RatingError> for AppError {
    fn from(err: RatingError) -> Self {
        Self::BadRequest(err.to_string())
    }
}

impl From<VoteError> for AppError {
    fn from(err: VoteError) -> Self {
        Self::BadRequest(err.to_string())
    }
}

impl From<SlugError> for AppError {
    fn from(err: SlugError) -> Self {
        Self::BadRequest(err.to_string())
    }
}

impl From<CollectionNameError> for AppError {
    fn from(err: CollectionNameError) -> Self {
        match err {
            CollectionNameError::BuiltIn(_) => Self::Forbidden(err.to_string()),
            CollectionNameError::Reserved(_) => Self::Conflict(err.to_string()),
            CollectionNameError::Empty | CollectionNameError::TooLong { .. } => {
                Self::BadRequest(err.to_string())
            }
        }
    }
}

impl From<OrderError> for AppError {
    fn from(err: OrderError) -> Self {
        match err {
            OrderError::Empty => Self::BadRequest(err.to_string()),
            OrderError::UnknownProduct(_) => Self::NotFound(err.to_string()),
            OrderError::InsufficientStock(_) | OrderError::InvalidTransition { .. } => {
                Self::Conflict(err.to_string())
            }
            OrderError::Repository(e) => Self::Database(e),
        }
    }
}

impl From<ForumError> for AppError {
    fn from(err: ForumError) -> Self {
        match err {
            ForumError::ForeignParent => Self::BadRequest(err.to_string()),
            ForumError::Repository(e) => Self::Database(e),
        }
    }
}

/// Result type alias for `AppError`.
pub type Result<T> = std::result::Result<T, AppError>;

/// Set the Sentry user context.
///
/// Call this after successful authentication to associate errors with users.
pub fn set_sentry_user(user_id: &impl ToString, username: Option<&str>) {
    sentry::configure_scope(|scope| {
        scope.set_user(Some(sentry::User {
            id: Some(user_id.to_string()),
            username: username.map(String::from),
            ..Default::default()
        }));
    });
}

/// Clear the Sentry user context.
///
/// Call this on logout to stop associating errors with the user.
pub fn clear_sentry_user() {
    sentry::configure_scope(|scope| {
        scope.set_user(None);
    });
}

/// Add a breadcrumb for user actions.
///
/// Breadcrumbs appear in Sentry error reports to show the trail of user actions
/// leading up to an error.
pub fn add_breadcrumb(category: &str, message: &str, data: Option<&[(&str, &str)]>) {
    let mut breadcrumb = sentry::Breadcrumb {
        category: Some(category.to_string()),
        message: Some(message.to_string()),
        level: sentry::Level::Info,
        ..Default::default()
    };

    if let Some(pairs) = data {
        for (key, value) in pairs {
            breadcrumb.data.insert(
                (*key).to_string(),
                serde_json::Value::String((*value).to_string()),
            );
        }
    }

    sentry::add_breadcrumb(breadcrumb);
}
