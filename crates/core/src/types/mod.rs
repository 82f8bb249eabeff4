//! Core types for Disc Vault.
//!
//! This module provides type-safe wrappers for common domain concepts.

pub mod email;
pub mod id;
pub mod slug;
pub mod status;
pub mod username;

pub use email::{Email, EmailError};
pub use id::*;
pub use slug::{Slug, SlugError};
pub use status::*;
pub use username::{Username, UsernameError};
