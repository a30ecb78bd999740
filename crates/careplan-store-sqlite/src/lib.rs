//! SQLite backend for the care-plan store.
//!
//! Wraps [`tokio_rusqlite`] so all database access runs on a dedicated thread
//! without blocking the async runtime. Every version ever written is kept;
//! reads resolve the current version of each entity from those rows.

mod encode;
mod revision;
mod schema;
mod store;
mod versions;

pub mod config;
pub mod error;

pub use config::StoreConfig;
pub use error::{Error, Result};
pub use store::SqliteStore;

#[cfg(test)]
mod tests;
