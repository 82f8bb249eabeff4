//! Storefront configuration loaded from environment variables.
//!
//! # Environment Variables
//!
//! ## Required
//! - `DISCVAULT_DATABASE_URL` - `PostgreSQL` connection string (falls back to `DATABASE_URL`)
//! - `DISCVAULT_BASE_URL` - Public URL of the storefront
//!
//! ## Optional
//! - `DISCVAULT_HOST` - Bind address (default: 127.0.0.1)
//! - `DISCVAULT_PORT` - Listen port (default: 3000)
//! - `DISCVAULT_CONTENT_DIR` - News markdown directory (default: content/news)
//! - `DISCVAULT_IMAGES_DIR` - Static image directory served under `/images` (default: static/images)
//! - `DISCVAULT_CORS_ORIGINS` - Comma-separated origins allowed to call the API
//! - `SMTP_HOST` - SMTP relay host; email is disabled when unset
//! - `SMTP_PORT` - SMTP relay port (default: 25)
//! - `SMTP_USERNAME` / `SMTP_PASSWORD` - SMTP credentials
//! - `SMTP_FROM` - Sender mailbox (default: `Disc Vault <noreply@discvault.local>`)
//! - `SENTRY_DSN` - Sentry error tracking DSN
//! - `SENTRY_ENVIRONMENT` - Sentry environment name
//! - `SENTRY_SAMPLE_RATE` - Error sample rate (default: 1.0)
//! - `SENTRY_TRACES_SAMPLE_RATE` - Performance sample rate (default: 0.1)

use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;

use secrecy::SecretString;
use thiserror::Error;
use url::Url;

const DEFAULT_SMTP_FROM: &str = "Disc Vault <noreply@discvault.local>";

/// Configuration errors that can occur during loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing environment variable: {0}")]
    MissingEnvVar(String),
    #[error("Invalid environment variable {0}: {1}")]
    InvalidEnvVar(String, String),
}

/// Storefront application configuration.
#[derive(Debug, Clone)]
pub struct StorefrontConfig {
    /// `PostgreSQL` database connection URL (contains password)
    pub database_url: SecretString,
    /// IP address to bind the server to
    pub host: IpAddr,
    /// Port to listen on
    pub port: u16,
    /// Public base URL for the storefront
    pub base_url: Url,
    /// Directory holding `<slug>.md` news bodies
    pub content_dir: PathBuf,
    /// Directory served under `/images`
    pub images_dir: PathBuf,
    /// Origins allowed by the CORS layer; empty means same-origin only
    pub cors_origins: Vec<String>,
    /// Outgoing mail relay; `None` disables delivery
    pub email: Option<EmailConfig>,
    /// Sentry error tracking configuration
    pub sentry: SentryConfig,
}

/// SMTP relay configuration.
///
/// Implements `Debug` manually to redact the password.
#[derive(Clone)]
pub struct EmailConfig {
    pub smtp_host: String,
    pub smtp_port: u16,
    pub smtp_username: Option<String>,
    pub smtp_password: Option<SecretString>,
    pub from_address: String,
}

impl std::fmt::Debug for EmailConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EmailConfig")
            .field("smtp_host", &self.smtp_host)
            .field("smtp_port", &self.smtp_port)
            .field("smtp_username", &self.smtp_username)
            .field(
                "smtp_password",
                &self.smtp_password.as_ref().map(|_| "[REDACTED]"),
            )
            .field("from_address", &self.from_address)
            .finish()
    }
}

/// Sentry settings.
#[derive(Debug, Clone)]
pub struct SentryConfig {
    pub dsn: Option<String>,
    pub environment: Option<String>,
    pub sample_rate: f32,
    pub traces_sample_rate: f32,
}

impl Default for SentryConfig {
    fn default() -> Self {
        Self {
            dsn: None,
            environment: None,
            sample_rate: 1.0,
            traces_sample_rate: 0.1,
        }
    }
}

impl StorefrontConfig {
    /// Load configuration from environment variables.
    ///
    /// Calls `dotenvy::dotenv()` to load from `.env` file if present.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if required variables are missing or invalid.
    pub fn from_env() -> Result<Self, ConfigError> {
        // Load .env file if present (ignore errors if not found)
        let _ = dotenvy::dotenv();

        let database_url = get_database_url("DISCVAULT_DATABASE_URL")?;
        let host = parse_env("DISCVAULT_HOST", "127.0.0.1")?;
        let port = parse_env("DISCVAULT_PORT", "3000")?;
        let base_url = Url::parse(&get_required_env("DISCVAULT_BASE_URL")?).map_err(|e| {
            ConfigError::InvalidEnvVar("DISCVAULT_BASE_URL".to_string(), e.to_string())
        })?;
        let content_dir = PathBuf::from(get_env_or_default("DISCVAULT_CONTENT_DIR", "content/news"));
        let images_dir = PathBuf::from(get_env_or_default("DISCVAULT_IMAGES_DIR", "static/images"));
        let cors_origins = get_optional_env("DISCVAULT_CORS_ORIGINS")
            .map(|v| split_list(&v))
            .unwrap_or_default();

        let email = EmailConfig::from_env()?;
        let sentry = SentryConfig::from_env()?;

        Ok(Self {
            database_url,
            host,
            port,
            base_url,
            content_dir,
            images_dir,
            cors_origins,
            email,
            sentry,
        })
    }

    /// Returns the socket address for binding the server.
    #[must_use]
    pub const fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }

    /// Whether the storefront is served over HTTPS (secure cookies).
    #[must_use]
    pub fn is_secure(&self) -> bool {
        self.base_url.scheme() == "https"
    }
}

impl EmailConfig {
    fn from_env() -> Result<Option<Self>, ConfigError> {
        let Some(smtp_host) = get_optional_env("SMTP_HOST") else {
            return Ok(None);
        };

        Ok(Some(Self {
            smtp_host,
            smtp_port: parse_env("SMTP_PORT", "25")?,
            smtp_username: get_optional_env("SMTP_USERNAME"),
            smtp_password: get_optional_env("SMTP_PASSWORD").map(SecretString::from),
            from_address: get_env_or_default("SMTP_FROM", DEFAULT_SMTP_FROM),
        }))
    }
}

impl SentryConfig {
    fn from_env() -> Result<Self, ConfigError> {
        let defaults = Self::default();
        Ok(Self {
            dsn: get_optional_env("SENTRY_DSN"),
            environment: get_optional_env("SENTRY_ENVIRONMENT"),
            sample_rate: parse_env("SENTRY_SAMPLE_RATE", &defaults.sample_rate.to_string())?,
            traces_sample_rate: parse_env(
                "SENTRY_TRACES_SAMPLE_RATE",
                &defaults.traces_sample_rate.to_string(),
            )?,
        })
    }
}

// =============================================================================
// Helper Functions
// =============================================================================

/// Get a required environment variable.
fn get_required_env(key: &str) -> Result<String, ConfigError> {
    std::env::var(key).map_err(|_| ConfigError::MissingEnvVar(key.to_string()))
}

/// Get database URL with fallback to generic `DATABASE_URL`.
fn get_database_url(primary_key: &str) -> Result<SecretString, ConfigError> {
    if let Ok(value) = std::env::var(primary_key) {
        return Ok(SecretString::from(value));
    }
    if let Ok(value) = std::env::var("DATABASE_URL") {
        return Ok(SecretString::from(value));
    }
    Err(ConfigError::MissingEnvVar(primary_key.to_string()))
}

/// Get an optional environment variable. Blank values count as unset.
fn get_optional_env(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

/// Get an environment variable with a default value.
fn get_env_or_default(key: &str, default: &str) -> String {
    get_optional_env(key).unwrap_or_else(|| default.to_string())
}

/// Parse an environment variable, falling back to `default` when unset.
fn parse_env<T>(key: &str, default: &str) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    parse_value(key, &get_env_or_default(key, default))
}

fn parse_value<T>(key: &str, raw: &str) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    raw.trim()
        .parse::<T>()
        .map_err(|e| ConfigError::InvalidEnvVar(key.to_string(), e.to_string()))
}

/// Split a comma-separated list, dropping blanks.
fn split_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(String::from)
        .collect()
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn test_config() -> StorefrontConfig {
        StorefrontConfig {
            database_url: SecretString::from("postgres://localhost/test"),
            host: "127.0.0.1".parse().unwrap(),
            port: 3000,
            base_url: Url::parse("http://localhost:3000").unwrap(),
            content_dir: PathBuf::from("content/news"),
            images_dir: PathBuf::from("static/images"),
            cors_origins: Vec::new(),
            email: None,
            sentry: SentryConfig::default(),
        }
    }

    #[test]
    fn test_socket_addr() {
        let addr = test_config().socket_addr();
        assert_eq!(addr.ip().to_string(), "127.0.0.1");
        assert_eq!(addr.port(), 3000);
    }

    #[test]
    fn test_is_secure_follows_scheme() {
        let mut config = test_config();
        assert!(!config.is_secure());
        config.base_url = Url::parse("https://shop.discvault.example").unwrap();
        assert!(config.is_secure());
    }

    #[test]
    fn test_parse_value() {
        let port: u16 = parse_value("PORT", " 8080 ").unwrap();
        assert_eq!(port, 8080);

        let err = parse_value::<u16>("PORT", "eighty").unwrap_err();
        assert!(matches!(err, ConfigError::InvalidEnvVar(key, _) if key == "PORT"));

        let rate: f32 = parse_value("RATE", "0.25").unwrap();
        assert!((rate - 0.25).abs() < f32::EPSILON);
    }

    #[test]
    fn test_split_list() {
        assert_eq!(
            split_list("http://a.test, ,http://b.test ,"),
            vec!["http://a.test".to_string(), "http://b.test".to_string()]
        );
        assert!(split_list("").is_empty());
    }

    #[test]
    fn test_email_config_debug_redacts_password() {
        let config = EmailConfig {
            smtp_host: "mail.internal".to_string(),
            smtp_port: 25,
            smtp_username: Some("mailer".to_string()),
            smtp_password: Some(SecretString::from("hunter2-but-longer")),
            from_address: DEFAULT_SMTP_FROM.to_string(),
        };

        let debug_output = format!("{config:?}");
        assert!(debug_output.contains("mail.internal"));
        assert!(debug_output.contains("[REDACTED]"));
        assert!(!debug_output.contains("hunter2-but-longer"));
    }
}
