//! World snapshot archiving
//!
//! Captures a world room's live storage document as an immutable
//! [`WorldSnapshot`] and bounds history per world.
//!
//! Flow: fetch storage → (404: skip) → parse JSON → insert snapshot →
//! enforce retention. Insert and prune are separate storage operations; if the
//! prune fails after a successful insert the world temporarily holds more than
//! the retention count, and the next successful run removes the excess.

use charge_core::{Environment, SnapshotId, World, WorldId, WorldSnapshot};
use thiserror::Error;

use crate::{
    room_service::{RoomService, UpstreamError},
    storage::{Storage, StorageError},
};

/// Result of one archive run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArchiveOutcome {
    /// A snapshot was stored
    Archived {
        /// Id of the new snapshot
        snapshot_id: SnapshotId,
        /// Byte length of the storage document as received
        size: usize,
        /// Old snapshots removed by retention
        pruned: usize,
    },
    /// The room has no storage yet; nothing was stored
    Skipped,
}

/// Errors from [`SnapshotArchiver`]
#[derive(Debug, Error)]
pub enum ArchiveError {
    /// Storage fetch failed with something other than 404
    #[error("upstream error: {0}")]
    Upstream(#[from] UpstreamError),

    /// Storage document was not valid JSON
    #[error("malformed storage payload: {0}")]
    MalformedPayload(#[from] serde_json::Error),

    /// Local storage failed (insert or retention)
    #[error("storage error: {0}")]
    Storage(#[from] StorageError),
}

/// Fetches room storage documents and keeps a bounded snapshot history.
pub struct SnapshotArchiver<S, R, E> {
    storage: S,
    rooms: R,
    env: E,
    retention: usize,
}

impl<S: Storage, R: RoomService, E: Environment> SnapshotArchiver<S, R, E> {
    /// Create an archiver keeping `retention` snapshots per world.
    pub fn new(storage: S, rooms: R, env: E, retention: usize) -> Self {
        Self { storage, rooms, env, retention }
    }

    /// Snapshots kept per world.
    pub fn retention(&self) -> usize {
        self.retention
    }

    /// Capture the current storage document of `world`'s room.
    ///
    /// Returns [`ArchiveOutcome::Skipped`] when the room has no storage (404).
    /// Any other failure aborts this world's run without writing anything,
    /// except a retention failure, which happens after the insert.
    pub async fn archive_world_snapshot(
        &self,
        world: &World,
    ) -> Result<ArchiveOutcome, ArchiveError> {
        let room_id = world.room_id();

        let Some(document) = self.rooms.fetch_storage(&room_id).await.inspect_err(|e| {
            tracing::error!(world_id = %world.id, %room_id, error = %e, "storage fetch failed");
        })?
        else {
            tracing::info!(world_id = %world.id, "room has no storage, skipping snapshot");
            return Ok(ArchiveOutcome::Skipped);
        };

        let size = document.len();
        let data: serde_json::Value = serde_json::from_str(&document)?;

        let snapshot = WorldSnapshot {
            id: SnapshotId::from_u128(self.env.random_u128()),
            world_id: world.id.clone(),
            name: world.name.clone(),
            data,
            created_at_ms: self.env.wall_clock_millis(),
        };
        self.storage.insert_snapshot(&snapshot)?;

        let pruned = enforce_retention(&self.storage, &world.id, self.retention).inspect_err(|e| {
            tracing::warn!(
                world_id = %world.id,
                error = %e,
                "retention failed, excess snapshots remain until next run"
            );
        })?;

        tracing::info!(
            world_id = %world.id,
            snapshot_id = %snapshot.id,
            size,
            pruned,
            "world snapshot archived"
        );

        Ok(ArchiveOutcome::Archived { snapshot_id: snapshot.id, size, pruned })
    }
}

/// Delete all but the `keep` most recent snapshots of a world.
///
/// Counts first, then removes the `count - keep` oldest in one batch. Returns
/// the number of snapshots removed.
pub fn enforce_retention<S: Storage>(
    storage: &S,
    world_id: &WorldId,
    keep: usize,
) -> Result<usize, StorageError> {
    let count = storage.count_snapshots(world_id)?;
    if count <= keep {
        return Ok(0);
    }

    let excess = storage.oldest_snapshot_ids(world_id, count - keep)?;
    let removed = storage.delete_snapshots(world_id, &excess)?;

    tracing::debug!(%world_id, count, removed, "pruned old snapshots");

    Ok(removed)
}
