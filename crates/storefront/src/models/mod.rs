//! Domain models for the storefront API.
//!
//! These are the JSON shapes returned to the frontend. Repositories load
//! rows and convert them into these types.

pub mod catalog;
pub mod commerce;
pub mod community;
pub mod news;
pub mod session;
pub mod user;

pub use session::{CurrentUser, keys as session_keys};
pub use user::{Profile, User};
