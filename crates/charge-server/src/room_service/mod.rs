//! Room-storage service abstraction.
//!
//! The [`RoomService`] trait is the seam between the provisioning/archiving
//! logic and the external real-time room service. [`LiveblocksClient`] talks
//! to the real HTTP API; [`MemoryRoomService`] keeps rooms in process and
//! records every call for tests.
//!
//! "Not found" is part of the return type (`Option`), not an error: both the
//! provisioner (404 → create) and the archiver (404 → skip) branch on it.

mod liveblocks;
mod memory;

use std::collections::BTreeMap;

use async_trait::async_trait;
use charge_core::{RoomAccessConfig, RoomId};
pub use liveblocks::{DEFAULT_BASE_URL, DEFAULT_REQUEST_TIMEOUT, LiveblocksClient};
pub use memory::{MemoryRoomService, RoomCall, RoomOp};
use serde::Deserialize;
use thiserror::Error;

/// Remote room metadata returned by a room lookup.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RoomInfo {
    /// Room id as known to the service
    pub id: String,
    /// Current default permissions
    pub default_accesses: Vec<String>,
    /// Current group permissions
    pub groups_accesses: BTreeMap<String, Vec<String>>,
}

/// Failure talking to the room-storage service.
///
/// Never retried automatically. Callers on the authorization path surface it
/// to end users as a generic failure; the detail is only logged.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum UpstreamError {
    /// Service answered with a non-success status other than an expected 404
    #[error("room service returned {status} {status_text}: {body}")]
    Status {
        /// HTTP status code
        status: u16,
        /// Canonical reason phrase
        status_text: String,
        /// Best-effort error message from the response body
        body: String,
    },

    /// Request never produced a response (connect, timeout, TLS)
    #[error("room service request failed: {0}")]
    Transport(String),

    /// Success response whose body could not be decoded
    #[error("room service response could not be decoded: {0}")]
    Decode(String),
}

impl UpstreamError {
    /// HTTP status carried by the error, if the service responded.
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Status { status, .. } => Some(*status),
            Self::Transport(_) | Self::Decode(_) => None,
        }
    }
}

/// Operations the room service exposes to this crate.
#[async_trait]
pub trait RoomService: Send + Sync {
    /// Look up a room. `None` when the service reports 404.
    async fn get_room(&self, room_id: &RoomId) -> Result<Option<RoomInfo>, UpstreamError>;

    /// Replace an existing room's access settings.
    async fn update_room(
        &self,
        room_id: &RoomId,
        config: &RoomAccessConfig,
    ) -> Result<(), UpstreamError>;

    /// Create a room with the given id and access settings.
    async fn create_room(
        &self,
        room_id: &RoomId,
        config: &RoomAccessConfig,
    ) -> Result<(), UpstreamError>;

    /// Raw text of the room's storage document. `None` when the service
    /// reports 404 (room never opened).
    async fn fetch_storage(&self, room_id: &RoomId) -> Result<Option<String>, UpstreamError>;

    /// Mint an ID token for `user_id` carrying `group_ids`.
    async fn identify_user(
        &self,
        user_id: &str,
        group_ids: &[String],
    ) -> Result<String, UpstreamError>;
}
