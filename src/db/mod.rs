//! Database module: row models and SQL repositories.
//!
//! This module is split into two submodules:
//! - `model`: row structs returned by queries.
//! - `repo`: SQL-only functions that map rows into domain types.
//!
//! Callers import from `insta_watchbot::db`; the repository API is re-exported
//! here.

pub mod model;
pub mod repo;

pub use repo::*;

pub use model::SubscriptionRow;
