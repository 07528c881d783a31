//! Storage abstraction for worlds, memberships and snapshots
//!
//! Trait-based abstraction over the local persistence layer. The trait is
//! synchronous (no async) to keep backends simple; each call completes before
//! the async caller reaches its next await point.

mod chaotic;
mod error;
mod memory;
mod redb;

pub use chaotic::{ChaoticStorage, StorageOp};
use charge_core::{Membership, SnapshotId, World, WorldId, WorldSnapshot};
pub use error::StorageError;
pub use memory::MemoryStorage;

pub use self::redb::RedbStorage;

/// Storage abstraction for the world room service
///
/// Must be Clone (shared by the provisioner, archiver and authorizer), Send +
/// Sync (thread-safe), and synchronous. Implementations share internal state
/// via Arc, so clones access the same underlying storage.
///
/// Snapshot ordering is by `created_at_ms`; ties keep insertion order where the
/// backend can observe it.
pub trait Storage: Clone + Send + Sync + 'static {
    /// Insert a new world.
    ///
    /// Fails with [`StorageError::WorldExists`] if the id is taken.
    fn create_world(&self, world: &World) -> Result<(), StorageError>;

    /// Load a world by id. `None` if it doesn't exist.
    fn load_world(&self, world_id: &WorldId) -> Result<Option<World>, StorageError>;

    /// All worlds, ordered by id.
    fn list_worlds(&self) -> Result<Vec<World>, StorageError>;

    /// Record the policy version a world's room was provisioned with.
    ///
    /// Fails with [`StorageError::WorldNotFound`] if the world doesn't exist.
    fn set_room_version(&self, world_id: &WorldId, version: u32) -> Result<(), StorageError>;

    /// Insert or replace a membership.
    fn store_membership(&self, membership: &Membership) -> Result<(), StorageError>;

    /// Load a user's membership in a world.
    fn load_membership(
        &self,
        world_id: &WorldId,
        user_id: &str,
    ) -> Result<Option<Membership>, StorageError>;

    /// Append a snapshot. Snapshots are never updated.
    fn insert_snapshot(&self, snapshot: &WorldSnapshot) -> Result<(), StorageError>;

    /// Number of snapshots stored for a world.
    fn count_snapshots(&self, world_id: &WorldId) -> Result<usize, StorageError>;

    /// All snapshots for a world, newest first.
    fn load_snapshots(&self, world_id: &WorldId) -> Result<Vec<WorldSnapshot>, StorageError>;

    /// Ids of the `limit` oldest snapshots for a world, oldest first.
    fn oldest_snapshot_ids(
        &self,
        world_id: &WorldId,
        limit: usize,
    ) -> Result<Vec<SnapshotId>, StorageError>;

    /// Delete snapshots by id in a single batch.
    ///
    /// Unknown ids are ignored. Returns the number of rows removed.
    fn delete_snapshots(&self, world_id: &WorldId, ids: &[SnapshotId])
    -> Result<usize, StorageError>;
}
