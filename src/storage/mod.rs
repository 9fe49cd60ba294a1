//! Storage Layer - SQLite-backed persistence
//!
//! System of record is SQLite with one table:
//! - datapoints(id, value, asset, timestamp)
//!
//! Every operation opens its own connection through [`Database::connect`]
//! and closes it when done.

pub mod schema;
pub mod sqlite;

pub use sqlite::{Database, SqliteStore};
