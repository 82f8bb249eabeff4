//! Disc Vault Core - Domain types and rules.
//!
//! This crate provides the types and business rules shared by every Disc Vault
//! component:
//! - `storefront` - JSON API for the single-page storefront
//! - `cli` - Command-line tools for migrations, seeding and user management
//!
//! # Architecture
//!
//! The core crate contains only types and pure functions - no I/O, no database
//! access, no HTTP. Repositories in the storefront load rows and hand them to
//! the rules defined here (vote toggling, comment threading, order totals,
//! rating aggregates, collection naming).
//!
//! # Modules
//!
//! - [`types`] - Newtype ids, identity value types, statuses and slugs
//! - [`catalog`] - Product filter validation and sort orders
//! - [`collection`] - Collection naming and the built-in collections
//! - [`pagination`] - Page requests and paged responses
//! - [`pricing`] - Decimal price arithmetic for carts, orders and promotions
//! - [`rating`] - Review ratings and their aggregate summary
//! - [`thread`] - Comment reply tree assembly
//! - [`vote`] - Up/down vote toggle resolution

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod catalog;
pub mod collection;
pub mod pagination;
pub mod pricing;
pub mod rating;
pub mod thread;
pub mod types;
pub mod vote;

pub use catalog::{FilterError, ProductFilter, ProductSort};
pub use collection::{CollectionName, CollectionNameError};
pub use pagination::{PageRequest, Paged};
pub use rating::{Rating, RatingError, RatingSummary};
pub use thread::{CommentNode, CommentRecord, build_thread};
pub use types::*;
pub use vote::{VoteAction, VoteError, VoteTally, VoteValue};
