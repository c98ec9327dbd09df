//! Error types for liore-core

use thiserror::Error;

use crate::models::OwnerId;

/// Result type alias using liore-core's Error
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in liore-core operations
#[derive(Error, Debug)]
pub enum Error {
    /// Remote store unreachable or misconfigured
    #[error("Connection error: {0}")]
    Connection(String),

    /// Remote mutation rejected or failed. The local copy was still updated.
    #[error("Write error for owner {id}: {reason}")]
    Write { id: OwnerId, reason: String },

    /// Imported data is not a sequence of owners
    #[error("Format error: {0}")]
    Format(String),

    /// Change feed reported an error out-of-band
    #[error("Listener error: {0}")]
    Listener(String),

    /// Invalid configuration
    #[error("Configuration error: {0}")]
    Config(String),

    /// Local cache failure
    #[error("Cache error: {0}")]
    Cache(String),

    /// SQLite error
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}
