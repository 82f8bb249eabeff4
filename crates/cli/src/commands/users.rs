//! User account commands.
//!
//! # Usage
//!
//! ```bash
//! dv-cli user create -u alice -e alice@example.com -p 'correct horse' --admin
//! dv-cli user promote alice --role admin
//! ```

use thiserror::Error;

use discvault_core::{Role, Username, UsernameError};
use discvault_storefront::db::{RepositoryError, UserRepository};
use discvault_storefront::services::auth::{AuthError, AuthService, Registration};

use super::connect;

#[derive(Debug, Error)]
pub enum UserCommandError {
    #[error("Failed to connect: {0}")]
    Connect(String),

    #[error(transparent)]
    Auth(#[from] AuthError),

    #[error("Invalid username: {0}")]
    InvalidUsername(#[from] UsernameError),

    #[error("No user named '{0}'")]
    UnknownUser(String),

    #[error("Database error: {0}")]
    Repository(RepositoryError),
}

impl From<RepositoryError> for UserCommandError {
    fn from(err: RepositoryError) -> Self {
        Self::Repository(err)
    }
}

/// Register an account the same way the storefront does, built-in
/// collections included, and optionally make it an administrator.
///
/// # Errors
///
/// Returns an error for invalid input, a taken username or email, or a
/// database failure.
pub async fn create(
    username: &str,
    email: &str,
    password: &str,
    display_name: Option<&str>,
    admin: bool,
) -> Result<(), UserCommandError> {
    let pool = connect()
        .await
        .map_err(|e| UserCommandError::Connect(e.to_string()))?;

    let mut user = AuthService::new(&pool)
        .register(Registration {
            username,
            email,
            password,
            display_name,
        })
        .await?;

    if admin {
        user = UserRepository::new(&pool)
            .set_role(&user.username, Role::Admin)
            .await?;
    }

    tracing::info!(
        user_id = %user.id,
        username = %user.username,
        role = %user.role,
        "User created"
    );
    Ok(())
}

/// Change the role of an existing account.
///
/// # Errors
///
/// Returns an error if the username is malformed, no such account exists,
/// or the database fails.
pub async fn promote(username: &str, role: Role) -> Result<(), UserCommandError> {
    let username = Username::parse(username)?;
    let pool = connect()
        .await
        .map_err(|e| UserCommandError::Connect(e.to_string()))?;

    let user = UserRepository::new(&pool)
        .set_role(&username, role)
        .await
        .map_err(|e| match e {
            RepositoryError::NotFound => UserCommandError::UnknownUser(username.to_string()),
            other => other.into(),
        })?;

    tracing::info!(username = %user.username, role = %user.role, "Role updated");
    Ok(())
}
