//! Room authorization
//!
//! Entry point a web handler calls before a client connects to a world room:
//! validate the requested room, check the user belongs to the world, make sure
//! the room is provisioned, then mint a room-service ID token whose groups
//! match the user's role.
//!
//! End users only ever learn that access was denied. [`AuthorizeError::status`]
//! gives the HTTP status to answer with; the detail stays in the server log.

use charge_core::{IdError, RoomId, WorldId};
use thiserror::Error;

use crate::{
    provisioner::{ProvisionError, RoomProvisioner},
    room_service::{RoomService, UpstreamError},
    storage::{Storage, StorageError},
};

/// ID token for the room service, returned to the client verbatim.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoomToken(pub String);

/// Errors from [`RoomAuthorizer`]
#[derive(Debug, Error)]
pub enum AuthorizeError {
    /// Requested room id is malformed
    #[error("invalid room: {0}")]
    InvalidRoom(#[from] IdError),

    /// Room names a world that doesn't exist
    #[error("unknown world: {0}")]
    UnknownWorld(WorldId),

    /// User is not a member of the world
    #[error("user {user_id} is not a member of world {world_id}")]
    NotAMember {
        /// Requesting user
        user_id: String,
        /// World they asked for
        world_id: WorldId,
    },

    /// Room could not be provisioned
    #[error("provisioning failed: {0}")]
    Provisioning(#[from] ProvisionError),

    /// Token request failed
    #[error("token request failed: {0}")]
    Token(#[from] UpstreamError),

    /// Local storage failed
    #[error("storage error: {0}")]
    Storage(#[from] StorageError),
}

impl AuthorizeError {
    /// HTTP status a handler should respond with.
    pub fn status(&self) -> u16 {
        match self {
            Self::InvalidRoom(_) => 400,
            Self::NotAMember { .. } => 403,
            Self::UnknownWorld(_) => 404,
            Self::Provisioning(_) | Self::Token(_) | Self::Storage(_) => 500,
        }
    }

    /// Message safe to show the end user.
    pub fn public_message(&self) -> &'static str {
        "access denied"
    }
}

/// Authorizes users to connect to world rooms.
pub struct RoomAuthorizer<S, R> {
    storage: S,
    rooms: R,
    provisioner: RoomProvisioner<S, R>,
}

impl<S: Storage, R: RoomService> RoomAuthorizer<S, R> {
    /// Create an authorizer that provisions rooms through `provisioner`.
    pub fn new(storage: S, rooms: R, provisioner: RoomProvisioner<S, R>) -> Self {
        Self { storage, rooms, provisioner }
    }

    /// Authorize `user_id` for the room named `room`.
    pub async fn authorize(&self, user_id: &str, room: &str) -> Result<RoomToken, AuthorizeError> {
        let result = self.authorize_inner(user_id, room).await;

        if let Err(e) = &result {
            tracing::warn!(user_id, room, status = e.status(), error = %e, "room authorization denied");
        }

        result
    }

    async fn authorize_inner(&self, user_id: &str, room: &str) -> Result<RoomToken, AuthorizeError> {
        let room_id = RoomId::parse(room)?;
        let world_id = room_id.world_id();

        if self.storage.load_world(world_id)?.is_none() {
            return Err(AuthorizeError::UnknownWorld(world_id.clone()));
        }

        let membership = self.storage.load_membership(world_id, user_id)?.ok_or_else(|| {
            AuthorizeError::NotAMember { user_id: user_id.to_string(), world_id: world_id.clone() }
        })?;

        self.provisioner.ensure_room_provisioned(world_id, &room_id).await?;

        let token = self.rooms.identify_user(user_id, &membership.role.group_ids()).await?;

        tracing::debug!(user_id, %room_id, role = ?membership.role, "room authorization granted");

        Ok(RoomToken(token))
    }
}
