//! Room provisioning
//!
//! Guarantees a world's remote room exists and carries the current access
//! policy before any client is authorized to connect. The world's
//! `room_version` records the policy version last applied, so the common path
//! (already provisioned) makes no remote calls.
//!
//! The remote write and the local version bump are not transactional. A crash
//! between them leaves the version stale and the next call re-applies the same
//! settings, which the room service treats idempotently. Concurrent callers for
//! the same world may both provision; no lock is taken. When both see the room
//! missing, the loser's create returns 409 and it falls back to an update.

use charge_core::{RoomId, RoomPolicy, WorldId};
use thiserror::Error;

use crate::{
    room_service::{RoomService, UpstreamError},
    storage::{Storage, StorageError},
};

/// What provisioning did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProvisionOutcome {
    /// Room was already at the policy version; nothing sent
    Current,
    /// Existing room's access settings were replaced
    Updated,
    /// Room did not exist and was created
    Created,
}

/// Errors from [`RoomProvisioner`]
#[derive(Debug, Error)]
pub enum ProvisionError {
    /// Room id names a different world
    #[error("room {room_id} does not belong to world {world_id}")]
    RoomMismatch {
        /// World being provisioned
        world_id: WorldId,
        /// Room that was passed in
        room_id: RoomId,
    },

    /// World does not exist locally
    #[error("world not found: {0}")]
    WorldNotFound(WorldId),

    /// Room service rejected a request
    #[error("upstream error: {0}")]
    Upstream(#[from] UpstreamError),

    /// Local storage failed
    #[error("storage error: {0}")]
    Storage(#[from] StorageError),
}

/// Ensures world rooms carry the configured [`RoomPolicy`].
pub struct RoomProvisioner<S, R> {
    storage: S,
    rooms: R,
    policy: RoomPolicy,
}

impl<S: Storage, R: RoomService> RoomProvisioner<S, R> {
    /// Create a provisioner enforcing `policy`.
    pub fn new(storage: S, rooms: R, policy: RoomPolicy) -> Self {
        Self { storage, rooms, policy }
    }

    /// Policy this provisioner enforces.
    pub fn policy(&self) -> &RoomPolicy {
        &self.policy
    }

    /// Make sure `room_id` exists remotely with the current policy.
    ///
    /// Loads the world to read its recorded room version; when that version
    /// already satisfies the policy no remote call is made. Otherwise looks the
    /// room up, updates it if found or creates it on 404, then records the
    /// policy version on the world. A 409 on create means another caller won
    /// the race; the room is then updated with the same settings. Any other
    /// upstream failure is logged and returned without retry, leaving the
    /// recorded version untouched.
    pub async fn ensure_room_provisioned(
        &self,
        world_id: &WorldId,
        room_id: &RoomId,
    ) -> Result<ProvisionOutcome, ProvisionError> {
        if !room_id.belongs_to(world_id) {
            return Err(ProvisionError::RoomMismatch {
                world_id: world_id.clone(),
                room_id: room_id.clone(),
            });
        }

        let world = self
            .storage
            .load_world(world_id)?
            .ok_or_else(|| ProvisionError::WorldNotFound(world_id.clone()))?;

        if self.policy.is_satisfied_by(world.room_version) {
            tracing::debug!(
                %world_id,
                room_version = world.room_version,
                "room already provisioned"
            );
            return Ok(ProvisionOutcome::Current);
        }

        let config = self.policy.access_config();

        let outcome = match self.rooms.get_room(room_id).await {
            Ok(Some(existing)) => {
                tracing::debug!(
                    %room_id,
                    current = ?existing.default_accesses,
                    "room exists, updating access settings"
                );
                self.rooms.update_room(room_id, &config).await.inspect_err(|e| {
                    log_upstream_failure(room_id, "update room", e);
                })?;
                ProvisionOutcome::Updated
            },
            Ok(None) => {
                tracing::debug!(%room_id, "room missing, creating");
                match self.rooms.create_room(room_id, &config).await {
                    Ok(()) => ProvisionOutcome::Created,
                    // Another caller created it after our lookup
                    Err(UpstreamError::Status { status: 409, .. }) => {
                        tracing::debug!(%room_id, "room created concurrently, updating instead");
                        self.rooms.update_room(room_id, &config).await.inspect_err(|e| {
                            log_upstream_failure(room_id, "update room", e);
                        })?;
                        ProvisionOutcome::Updated
                    },
                    Err(e) => {
                        log_upstream_failure(room_id, "create room", &e);
                        return Err(e.into());
                    },
                }
            },
            Err(e) => {
                log_upstream_failure(room_id, "get room", &e);
                return Err(e.into());
            },
        };

        self.storage.set_room_version(world_id, self.policy.version())?;

        tracing::info!(
            %world_id,
            %room_id,
            ?outcome,
            version = self.policy.version(),
            "room provisioned"
        );

        Ok(outcome)
    }
}

fn log_upstream_failure(room_id: &RoomId, operation: &str, err: &UpstreamError) {
    match err {
        UpstreamError::Status { status, status_text, body } => tracing::error!(
            %room_id,
            operation,
            status,
            status_text = %status_text,
            body = %body,
            "room service request failed"
        ),
        other => tracing::error!(%room_id, operation, error = %other, "room service request failed"),
    }
}
