//! Database module for the health service.
//!
//! Provides SQLite storage for health check records with embedded migrations.

mod models;
mod store;

pub use models::*;
pub use store::*;
