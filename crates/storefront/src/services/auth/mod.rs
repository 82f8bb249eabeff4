//! Authentication service.
//!
//! Password registration, login and password change. Passwords are hashed
//! with Argon2id.

mod error;

pub use error::AuthError;

use argon2::{
    Argon2,
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString, rand_core::OsRng},
};
use sqlx::PgPool;

use discvault_core::{Email, UserId, Username};

use crate::db::RepositoryError;
use crate::db::users::{NewUser, UserRepository};
use crate::models::User;

/// Minimum password length.
pub const MIN_PASSWORD_LENGTH: usize = 8;

/// Maximum password length (bounds hashing cost).
pub const MAX_PASSWORD_LENGTH: usize = 128;

/// Registration input as submitted by the client.
#[derive(Debug, Clone)]
pub struct Registration<'a> {
    pub username: &'a str,
    pub email: &'a str,
    pub password: &'a str,
    pub display_name: Option<&'a str>,
}

/// Authentication service.
pub struct AuthService<'a> {
    users: UserRepository<'a>,
}

impl<'a> AuthService<'a> {
    /// Create a new authentication service.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self {
            users: UserRepository::new(pool),
        }
    }

    /// Register a new account.
    ///
    /// Input is validated first, then existing accounts are checked so a
    /// duplicate is reported before anything is written.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::InvalidUsername` / `AuthError::InvalidEmail` /
    /// `AuthError::WeakPassword` for bad input, and
    /// `AuthError::UserAlreadyExists` when the username or email is taken.
    pub async fn register(&self, input: Registration<'_>) -> Result<User, AuthError> {
        let username = Username::parse(input.username)?;
        let email = Email::parse(input.email)?;
        validate_password(input.password)?;

        if let Some(taken) = self.users.find_taken(&username, &email).await? {
            return Err(AuthError::UserAlreadyExists(taken.as_str()));
        }

        let password_hash = hash_password(input.password)?;
        let display_name = input
            .display_name
            .map(str::trim)
            .filter(|name| !name.is_empty());

        self.users
            .create(NewUser {
                username: &username,
                email: &email,
                password_hash: &password_hash,
                display_name,
            })
            .await
            .map_err(|e| match e {
                // Lost a race with a concurrent registration
                RepositoryError::Conflict(_) => AuthError::UserAlreadyExists("username or email"),
                other => AuthError::Repository(other),
            })
    }

    /// Login with a username or email and a password.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::InvalidCredentials` if the login or password is wrong.
    pub async fn login(&self, login: &str, password: &str) -> Result<User, AuthError> {
        if login.trim().is_empty() || password.is_empty() {
            return Err(AuthError::InvalidCredentials);
        }

        let (user, password_hash) = self
            .users
            .get_with_hash_by_login(login)
            .await?
            .ok_or(AuthError::InvalidCredentials)?;

        verify_password(password, &password_hash)?;

        Ok(user)
    }

    /// Change a password after verifying the current one.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::InvalidCredentials` if `current` is wrong and
    /// `AuthError::WeakPassword` if `new` fails validation.
    pub async fn change_password(
        &self,
        user_id: UserId,
        current: &str,
        new: &str,
    ) -> Result<(), AuthError> {
        let existing = self
            .users
            .get_password_hash(user_id)
            .await?
            .ok_or(AuthError::UserNotFound)?;

        verify_password(current, &existing)?;
        validate_password(new)?;
        if current == new {
            return Err(AuthError::WeakPassword(
                "new password must differ from the current one".to_string(),
            ));
        }

        let password_hash = hash_password(new)?;
        self.users.update_password(user_id, &password_hash).await?;
        Ok(())
    }

    /// Get a user by ID.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::UserNotFound` if the user doesn't exist.
    pub async fn get_user(&self, user_id: UserId) -> Result<User, AuthError> {
        self.users
            .get_by_id(user_id)
            .await?
            .ok_or(AuthError::UserNotFound)
    }
}

/// Validate password meets requirements.
fn validate_password(password: &str) -> Result<(), AuthError> {
    let length = password.chars().count();
    if length < MIN_PASSWORD_LENGTH {
        return Err(AuthError::WeakPassword(format!(
            "password must be at least {MIN_PASSWORD_LENGTH} characters"
        )));
    }
    if length > MAX_PASSWORD_LENGTH {
        return Err(AuthError::WeakPassword(format!(
            "password must be at most {MAX_PASSWORD_LENGTH} characters"
        )));
    }
    Ok(())
}

/// Hash a password using Argon2id.
///
/// # Errors
///
/// Returns `AuthError::PasswordHash` if hashing fails.
pub fn hash_password(password: &str) -> Result<String, AuthError> {
    let salt = SaltString::generate(&mut OsRng);
    let argon2 = Argon2::default();

    argon2
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|_| AuthError::PasswordHash)
}

/// Verify a password against a hash.
fn verify_password(password: &str, hash: &str) -> Result<(), AuthError> {
    let parsed_hash = PasswordHash::new(hash).map_err(|_| AuthError::InvalidCredentials)?;
    let argon2 = Argon2::default();

    argon2
        .verify_password(password.as_bytes(), &parsed_hash)
        .map_err(|_| AuthError::InvalidCredentials)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_password_length() {
        assert!(matches!(
            validate_password("short"),
            Err(AuthError::WeakPassword(_))
        ));
        assert!(validate_password("longenough").is_ok());
        assert!(validate_password(&"x".repeat(MAX_PASSWORD_LENGTH + 1)).is_err());
    }

    #[test]
    fn test_hash_and_verify() {
        let hash = hash_password("correct horse battery").unwrap();
        assert!(hash.starts_with("$argon2id$"));
        assert!(verify_password("correct horse battery", &hash).is_ok());
        assert!(matches!(
            verify_password("wrong horse battery", &hash),
            Err(AuthError::InvalidCredentials)
        ));
    }

    #[test]
    fn test_verify_rejects_malformed_hash() {
        assert!(matches!(
            verify_password("anything", "not-a-phc-string"),
            Err(AuthError::InvalidCredentials)
        ));
    }
}
