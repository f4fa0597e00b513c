//! Shared storage types and utilities.
//!
//! Provides `StorageError` and `unix_timestamp()` used by the engine's
//! storage layer and its in-memory test double. The error variants mirror
//! how failures surface to callers: connectivity, plain query failures,
//! unique-constraint collisions, and inserts that did not yield a usable
//! generated identifier.

use std::time::{SystemTime, UNIX_EPOCH};

/// Storage errors shared across store implementations.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("Connection error: {0}")]
    Connection(String),

    #[error("Query error: {0}")]
    Query(String),

    #[error("Constraint violation: {0}")]
    Constraint(String),

    #[error("Insert did not yield a generated identifier: {0}")]
    Insert(String),
}

impl From<sqlx::Error> for StorageError {
    fn from(e: sqlx::Error) -> Self {
        if let sqlx::Error::Database(db_err) = &e {
            if db_err.is_unique_violation() {
                return Self::Constraint(db_err.to_string());
            }
        }
        Self::Query(e.to_string())
    }
}

/// Returns the current time as a Unix timestamp (seconds since epoch).
#[allow(clippy::cast_possible_wrap)]
pub fn unix_timestamp() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs() as i64
}
