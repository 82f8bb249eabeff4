//! User repository for database operations.
//!
//! Registration creates the account and its built-in collections in one
//! transaction.

use chrono::{DateTime, Utc};
use sqlx::PgPool;

use discvault_core::collection::BUILT_IN;
use discvault_core::{Email, Role, UserId, Username};

use super::RepositoryError;
use crate::models::{Profile, User};

/// Fields needed to create an account.
#[derive(Debug, Clone)]
pub struct NewUser<'a> {
    pub username: &'a Username,
    pub email: &'a Email,
    pub password_hash: &'a str,
    pub display_name: Option<&'a str>,
}

/// Which unique field an existing account already holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TakenField {
    Username,
    Email,
}

impl TakenField {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Username => "username",
            Self::Email => "email",
        }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct UserRow {
    id: UserId,
    username: String,
    email: String,
    role: Role,
    display_name: Option<String>,
    first_name: Option<String>,
    last_name: Option<String>,
    phone: Option<String>,
    address: Option<String>,
    city: Option<String>,
    country: Option<String>,
    postal_code: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<UserRow> for User {
    type Error = RepositoryError;

    fn try_from(row: UserRow) -> Result<Self, Self::Error> {
        let email = Email::parse(&row.email).map_err(|e| {
            RepositoryError::DataCorruption(format!("invalid email in database: {e}"))
        })?;
        let username = Username::parse(&row.username).map_err(|e| {
            RepositoryError::DataCorruption(format!("invalid username in database: {e}"))
        })?;

        Ok(Self {
            id: row.id,
            username,
            email,
            role: row.role,
            profile: Profile {
                display_name: row.display_name,
                first_name: row.first_name,
                last_name: row.last_name,
                phone: row.phone,
                address: row.address,
                city: row.city,
                country: row.country,
                postal_code: row.postal_code,
            },
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

#[derive(Debug, sqlx::FromRow)]
struct UserWithHashRow {
    #[sqlx(flatten)]
    user: UserRow,
    password_hash: String,
}

/// Repository for user database operations.
pub struct UserRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> UserRepository<'a> {
    /// Create a new user repository.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Report whether the username or email is already registered
    /// (case-insensitive). Username is checked first.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn find_taken(
        &self,
        username: &Username,
        email: &Email,
    ) -> Result<Option<TakenField>, RepositoryError> {
        let row: Option<(bool, bool)> = sqlx::query_as(
            r"
            SELECT LOWER(username) = LOWER($1), LOWER(email) = LOWER($2)
            FROM store.user
            WHERE LOWER(username) = LOWER($1) OR LOWER(email) = LOWER($2)
            ORDER BY 1 DESC
            LIMIT 1
            ",
        )
        .bind(username.as_str())
        .bind(email.as_str())
        .fetch_optional(self.pool)
        .await?;

        Ok(row.map(|(username_taken, _)| {
            if username_taken {
                TakenField::Username
            } else {
                TakenField::Email
            }
        }))
    }

    /// Create an account with its built-in collections.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Conflict` if the username or email already exists.
    /// Returns `RepositoryError::Database` for other database errors.
    pub async fn create(&self, new_user: NewUser<'_>) -> Result<User, RepositoryError> {
        let mut tx = self.pool.begin().await?;

        let row: UserRow = sqlx::query_as(
            r"
            INSERT INTO store.user (id, username, email, password_hash, display_name)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING id, username, email, role, display_name, first_name, last_name,
                      phone, address, city, country, postal_code, created_at, updated_at
            ",
        )
        .bind(UserId::generate())
        .bind(new_user.username.as_str())
        .bind(new_user.email.as_str())
        .bind(new_user.password_hash)
        .bind(new_user.display_name)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| RepositoryError::conflict_on_unique(e, "username or email already exists"))?;

        for name in BUILT_IN {
            sqlx::query(
                r"
                INSERT INTO store.collection (user_id, name, is_default)
                VALUES ($1, $2, TRUE)
                ",
            )
            .bind(row.id)
            .bind(name)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;

        User::try_from(row)
    }

    /// Get a user by their ID.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    /// Returns `RepositoryError::DataCorruption` if stored identity fields are invalid.
    pub async fn get_by_id(&self, id: UserId) -> Result<Option<User>, RepositoryError> {
        let row: Option<UserRow> = sqlx::query_as(
            r"
            SELECT id, username, email, role, display_name, first_name, last_name,
                   phone, address, city, country, postal_code, created_at, updated_at
            FROM store.user
            WHERE id = $1
            ",
        )
        .bind(id)
        .fetch_optional(self.pool)
        .await?;

        row.map(User::try_from).transpose()
    }

    /// Look up an account by username or email, returning it with its
    /// password hash.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get_with_hash_by_login(
        &self,
        login: &str,
    ) -> Result<Option<(User, String)>, RepositoryError> {
        let row: Option<UserWithHashRow> = sqlx::query_as(
            r"
            SELECT id, username, email, role, display_name, first_name, last_name,
                   phone, address, city, country, postal_code, created_at, updated_at,
                   password_hash
            FROM store.user
            WHERE LOWER(username) = LOWER($1) OR LOWER(email) = LOWER($1)
            LIMIT 1
            ",
        )
        .bind(login.trim())
        .fetch_optional(self.pool)
        .await?;

        row.map(|r| Ok((User::try_from(r.user)?, r.password_hash)))
            .transpose()
    }

    /// Get the password hash for a user.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get_password_hash(&self, id: UserId) -> Result<Option<String>, RepositoryError> {
        let hash: Option<(String,)> =
            sqlx::query_as("SELECT password_hash FROM store.user WHERE id = $1")
                .bind(id)
                .fetch_optional(self.pool)
                .await?;

        Ok(hash.map(|(h,)| h))
    }

    /// Replace the profile fields of a user.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the user does not exist.
    pub async fn update_profile(
        &self,
        id: UserId,
        profile: &Profile,
    ) -> Result<User, RepositoryError> {
        let row: Option<UserRow> = sqlx::query_as(
            r"
            UPDATE store.user
            SET display_name = $2, first_name = $3, last_name = $4, phone = $5,
                address = $6, city = $7, country = $8, postal_code = $9,
                updated_at = NOW()
            WHERE id = $1
            RETURNING id, username, email, role, display_name, first_name, last_name,
                      phone, address, city, country, postal_code, created_at, updated_at
            ",
        )
        .bind(id)
        .bind(profile.display_name.as_deref())
        .bind(profile.first_name.as_deref())
        .bind(profile.last_name.as_deref())
        .bind(profile.phone.as_deref())
        .bind(profile.address.as_deref())
        .bind(profile.city.as_deref())
        .bind(profile.country.as_deref())
        .bind(profile.postal_code.as_deref())
        .fetch_optional(self.pool)
        .await?;

        row.ok_or(RepositoryError::NotFound).and_then(User::try_from)
    }

    /// Store a new password hash.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the user does not exist.
    pub async fn update_password(
        &self,
        id: UserId,
        password_hash: &str,
    ) -> Result<(), RepositoryError> {
        let result = sqlx::query(
            "UPDATE store.user SET password_hash = $2, updated_at = NOW() WHERE id = $1",
        )
        .bind(id)
        .bind(password_hash)
        .execute(self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }
        Ok(())
    }

    /// Change the role of the account with this username.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if no account has the username.
    pub async fn set_role(&self, username: &Username, role: Role) -> Result<User, RepositoryError> {
        let row: Option<UserRow> = sqlx::query_as(
            r"
            UPDATE store.user SET role = $2, updated_at = NOW()
            WHERE LOWER(username) = LOWER($1)
            RETURNING id, username, email, role, display_name, first_name, last_name,
                      phone, address, city, country, postal_code, created_at, updated_at
            ",
        )
        .bind(username.as_str())
        .bind(role)
        .fetch_optional(self.pool)
        .await?;

        row.ok_or(RepositoryError::NotFound).and_then(User::try_from)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_taken_field_names() {
        assert_eq!(TakenField::Username.as_str(), "username");
        assert_eq!(TakenField::Email.as_str(), "email");
    }
}
