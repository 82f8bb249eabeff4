//! Business logic services for storefront.
//!
//! # Services
//!
//! - `auth` - Registration, password login and password change
//! - `email` - Background transactional email queue

pub mod auth;
pub mod email;

pub use auth::{AuthError, AuthService};
pub use email::{EmailMessage, EmailQueue};
