//! Service error types.

use std::fmt;

use crate::{
    archiver::ArchiveError, authorizer::AuthorizeError, provisioner::ProvisionError,
    room_service::UpstreamError, storage::StorageError,
};

/// Errors surfaced by the `charge-worlds` binary.
#[derive(Debug)]
pub enum ServerError {
    /// Configuration error (missing secret, invalid id, etc.).
    ///
    /// Fatal at startup. Fix configuration and restart.
    Config(String),

    /// Local storage failed.
    ///
    /// May be transient (I/O) or fatal (corrupt record).
    Storage(StorageError),

    /// Room service could not be reached or rejected a request.
    Upstream(UpstreamError),

    /// Room provisioning failed.
    Provision(ProvisionError),

    /// Snapshot archiving failed.
    Archive(ArchiveError),

    /// Room authorization was denied.
    Authorize(AuthorizeError),
}

impl fmt::Display for ServerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Config(msg) => write!(f, "configuration error: {msg}"),
            Self::Storage(err) => write!(f, "storage error: {err}"),
            Self::Upstream(err) => write!(f, "room service error: {err}"),
            Self::Provision(err) => write!(f, "provisioning error: {err}"),
            Self::Archive(err) => write!(f, "archive error: {err}"),
            Self::Authorize(err) => write!(f, "authorization error: {err}"),
        }
    }
}

impl std::error::Error for ServerError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Config(_) => None,
            Self::Storage(err) => Some(err),
            Self::Upstream(err) => Some(err),
            Self::Provision(err) => Some(err),
            Self::Archive(err) => Some(err),
            Self::Authorize(err) => Some(err),
        }
    }
}

impl From<StorageError> for ServerError {
    fn from(err: StorageError) -> Self {
        Self::Storage(err)
    }
}

impl From<UpstreamError> for ServerError {
    fn from(err: UpstreamError) -> Self {
        Self::Upstream(err)
    }
}

impl From<ProvisionError> for ServerError {
    fn from(err: ProvisionError) -> Self {
        Self::Provision(err)
    }
}

impl From<ArchiveError> for ServerError {
    fn from(err: ArchiveError) -> Self {
        Self::Archive(err)
    }
}

impl From<AuthorizeError> for ServerError {
    fn from(err: AuthorizeError) -> Self {
        Self::Authorize(err)
    }
}

impl From<charge_core::IdError> for ServerError {
    fn from(err: charge_core::IdError) -> Self {
        Self::Config(err.to_string())
    }
}
