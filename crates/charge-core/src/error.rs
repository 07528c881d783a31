//! Error types for identifier parsing.

use thiserror::Error;

/// Maximum length of a world id in bytes.
pub const MAX_WORLD_ID_LEN: usize = 128;

/// Errors raised when constructing or parsing identifiers.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum IdError {
    /// World id was empty
    #[error("world id is empty")]
    EmptyWorldId,

    /// World id exceeded [`MAX_WORLD_ID_LEN`]
    #[error("world id is {len} bytes, limit is {MAX_WORLD_ID_LEN}")]
    WorldIdTooLong {
        /// Actual length in bytes
        len: usize,
    },

    /// World id contained a character outside `[A-Za-z0-9_-]`
    #[error("world id contains invalid character {found:?}")]
    InvalidWorldIdChar {
        /// Offending character
        found: char,
    },

    /// Room id did not start with the `world:` prefix
    #[error("room id {0:?} is missing the world: prefix")]
    MissingRoomPrefix(String),

    /// Snapshot id was not 32 hex digits
    #[error("snapshot id {0:?} is not a 128-bit hex value")]
    InvalidSnapshotId(String),
}
