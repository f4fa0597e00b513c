//! `provost` Core Library
//!
//! Shared functionality for provost components:
//! - Configuration payload resolution (JSON object / JSON string / typed record)
//! - Engine, MySQL, and advertised-server configuration types
//! - Storage error type and timestamp helper shared by storage layers
//! - Tracing initialization

pub mod config;
pub mod db;
pub mod error;
pub mod tracing_init;

pub use config::{ConfigPayload, EngineConfig, MysqlConfig, ServerInfo};
pub use db::{StorageError, unix_timestamp};
pub use error::{Error, Result};
