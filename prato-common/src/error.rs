//! Error type shared by the Prato crates
//!
//! Store, config and path failures all land here. The service crate wraps it
//! as the "write" side of a sync failure.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug)]
pub enum Error {
    /// SQLite query, connection or transaction failure
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Root folder or config file access
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Unreadable TOML or a setting that fails validation
    #[error("Configuration error: {0}")]
    Config(String),

    /// No record at the given key; a status write never creates one
    #[error("Not found: {0}")]
    NotFound(String),

    /// Duplicate record id or malformed document path
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Stored data that cannot be decoded (e.g. a bad timestamp column)
    #[error("Internal error: {0}")]
    Internal(String),
}
