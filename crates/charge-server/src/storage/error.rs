//! Storage error types.
//!
//! Defines errors that can occur during storage operations:
//! - `WorldNotFound`: Requested world doesn't exist
//! - `WorldExists`: World id already taken
//! - `Serialization`: Failed to encode/decode a record
//! - `Io`: Underlying storage system errors

use charge_core::WorldId;
use thiserror::Error;

/// Errors that can occur during storage operations
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StorageError {
    /// World not found
    #[error("world not found: {0}")]
    WorldNotFound(WorldId),

    /// World already exists
    #[error("world already exists: {0}")]
    WorldExists(WorldId),

    /// Serialization or deserialization failed
    #[error("serialization error: {0}")]
    Serialization(String),

    /// I/O error (file system, database, injected fault, etc.)
    #[error("I/O error: {0}")]
    Io(String),
}

impl From<std::io::Error> for StorageError {
    fn from(err: std::io::Error) -> Self {
        StorageError::Io(err.to_string())
    }
}
