#![allow(clippy::disallowed_types, reason = "Synchronous in-memory operations only")]

use std::{
    collections::{BTreeMap, HashMap},
    sync::{Arc, Mutex},
};

use charge_core::{Membership, SnapshotId, World, WorldId, WorldSnapshot};

use super::{Storage, StorageError};

/// In-memory storage implementation for testing and simulation
///
/// All state is wrapped in Arc<Mutex<>> to allow Clone and concurrent access.
/// Thread-safe through Mutex, but uses `lock().expect()` which will panic if
/// the mutex is poisoned - acceptable for test code. Snapshots are kept per
/// world in ascending `created_at_ms` order, so retention queries are a slice
/// of the front.
#[derive(Clone)]
pub struct MemoryStorage {
    inner: Arc<Mutex<MemoryStorageInner>>,
}

struct MemoryStorageInner {
    /// Worlds by id
    worlds: BTreeMap<WorldId, World>,

    /// Memberships keyed by (world, user)
    memberships: HashMap<(WorldId, String), Membership>,

    /// Snapshots per world, oldest first
    snapshots: HashMap<WorldId, Vec<WorldSnapshot>>,
}

impl MemoryStorage {
    /// Create a new empty `MemoryStorage`
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Mutex::new(MemoryStorageInner {
                worlds: BTreeMap::new(),
                memberships: HashMap::new(),
                snapshots: HashMap::new(),
            })),
        }
    }

    /// Total number of snapshots across all worlds.
    ///
    /// Useful for debugging and testing.
    ///
    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned.
    #[allow(clippy::expect_used)]
    pub fn total_snapshot_count(&self) -> usize {
        let inner = self.inner.lock().expect("Mutex poisoned");
        inner.snapshots.values().map(Vec::len).sum()
    }

    #[allow(clippy::expect_used)]
    fn lock(&self) -> std::sync::MutexGuard<'_, MemoryStorageInner> {
        self.inner.lock().expect("Mutex poisoned")
    }
}

impl Default for MemoryStorage {
    fn default() -> Self {
        Self::new()
    }
}

impl Storage for MemoryStorage {
    fn create_world(&self, world: &World) -> Result<(), StorageError> {
        let mut inner = self.lock();

        if inner.worlds.contains_key(&world.id) {
            return Err(StorageError::WorldExists(world.id.clone()));
        }
        inner.worlds.insert(world.id.clone(), world.clone());

        Ok(())
    }

    fn load_world(&self, world_id: &WorldId) -> Result<Option<World>, StorageError> {
        Ok(self.lock().worlds.get(world_id).cloned())
    }

    fn list_worlds(&self) -> Result<Vec<World>, StorageError> {
        Ok(self.lock().worlds.values().cloned().collect())
    }

    fn set_room_version(&self, world_id: &WorldId, version: u32) -> Result<(), StorageError> {
        let mut inner = self.lock();

        let world = inner
            .worlds
            .get_mut(world_id)
            .ok_or_else(|| StorageError::WorldNotFound(world_id.clone()))?;
        world.room_version = version;

        Ok(())
    }

    fn store_membership(&self, membership: &Membership) -> Result<(), StorageError> {
        self.lock().memberships.insert(
            (membership.world_id.clone(), membership.user_id.clone()),
            membership.clone(),
        );

        Ok(())
    }

    fn load_membership(
        &self,
        world_id: &WorldId,
        user_id: &str,
    ) -> Result<Option<Membership>, StorageError> {
        let inner = self.lock();

        Ok(inner.memberships.get(&(world_id.clone(), user_id.to_string())).cloned())
    }

    fn insert_snapshot(&self, snapshot: &WorldSnapshot) -> Result<(), StorageError> {
        let mut inner = self.lock();

        let snapshots = inner.snapshots.entry(snapshot.world_id.clone()).or_default();

        // Insert after any snapshot with the same timestamp to keep insertion
        // order among ties.
        let at = snapshots.partition_point(|s| s.created_at_ms <= snapshot.created_at_ms);
        snapshots.insert(at, snapshot.clone());

        debug_assert!(snapshots.windows(2).all(|w| w[0].created_at_ms <= w[1].created_at_ms));

        Ok(())
    }

    fn count_snapshots(&self, world_id: &WorldId) -> Result<usize, StorageError> {
        Ok(self.lock().snapshots.get(world_id).map_or(0, Vec::len))
    }

    fn load_snapshots(&self, world_id: &WorldId) -> Result<Vec<WorldSnapshot>, StorageError> {
        let inner = self.lock();

        Ok(inner
            .snapshots
            .get(world_id)
            .map(|snapshots| snapshots.iter().rev().cloned().collect())
            .unwrap_or_default())
    }

    fn oldest_snapshot_ids(
        &self,
        world_id: &WorldId,
        limit: usize,
    ) -> Result<Vec<SnapshotId>, StorageError> {
        let inner = self.lock();

        Ok(inner
            .snapshots
            .get(world_id)
            .map(|snapshots| snapshots.iter().take(limit).map(|s| s.id).collect())
            .unwrap_or_default())
    }

    fn delete_snapshots(
        &self,
        world_id: &WorldId,
        ids: &[SnapshotId],
    ) -> Result<usize, StorageError> {
        let mut inner = self.lock();

        let Some(snapshots) = inner.snapshots.get_mut(world_id) else {
            return Ok(0);
        };

        let before = snapshots.len();
        snapshots.retain(|s| !ids.contains(&s.id));

        Ok(before - snapshots.len())
    }
}
