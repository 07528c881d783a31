//! Redb-backed durable storage implementation.
//!
//! Uses Redb's ACID transactions with Copy-on-Write for crash safety.
//! All state survives server restarts.

use std::{path::Path, sync::Arc};

use charge_core::{MemberRole, Membership, SnapshotId, World, WorldId, WorldSnapshot};
use redb::{Database, ReadableTable, TableDefinition};
use serde::{Deserialize, Serialize};

use super::{Storage, StorageError};

/// Table: worlds
/// Key: world id
/// Value: CBOR-encoded StoredWorld
const WORLDS: TableDefinition<&str, &[u8]> = TableDefinition::new("worlds");

/// Table: memberships
/// Key: [world id][0x00][user id]
/// Value: CBOR-encoded MemberRole
const MEMBERSHIPS: TableDefinition<&[u8], &[u8]> = TableDefinition::new("memberships");

/// Table: snapshots
/// Key: [world id][0x00][created_at_ms: 8 bytes BE][snapshot id: 16 bytes BE]
/// Value: CBOR-encoded StoredSnapshot
const SNAPSHOTS: TableDefinition<&[u8], &[u8]> = TableDefinition::new("snapshots");

/// Length of the snapshot key suffix after the world prefix.
const SNAPSHOT_SUFFIX_LEN: usize = 8 + 16;

#[derive(Serialize, Deserialize)]
struct StoredWorld {
    name: String,
    room_version: u32,
}

/// Snapshot payload kept as JSON text so the document is stored exactly as
/// parsed, independent of CBOR's number model.
#[derive(Serialize, Deserialize)]
struct StoredSnapshot {
    name: String,
    data_json: String,
}

/// Durable storage backed by Redb.
///
/// Thread-safe through Redb's internal locking. Clone is cheap (Arc).
#[derive(Clone)]
pub struct RedbStorage {
    db: Arc<Database>,
}

impl RedbStorage {
    /// Open or create a Redb database at the given path.
    ///
    /// Creates tables if they don't exist (WORLDS, MEMBERSHIPS, SNAPSHOTS).
    ///
    /// # Errors
    ///
    /// Returns `StorageError::Io` if the database cannot be opened or created.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StorageError> {
        let db = Database::create(path.as_ref()).map_err(io_err)?;

        let txn = db.begin_write().map_err(io_err)?;
        {
            let _ = txn.open_table(WORLDS).map_err(io_err)?;
            let _ = txn.open_table(MEMBERSHIPS).map_err(io_err)?;
            let _ = txn.open_table(SNAPSHOTS).map_err(io_err)?;
        }
        txn.commit().map_err(io_err)?;

        Ok(Self { db: Arc::new(db) })
    }

    /// Snapshot keys and values for a world, oldest first.
    fn scan_snapshots<T: ReadableTable<&'static [u8], &'static [u8]>>(
        table: &T,
        world_id: &WorldId,
    ) -> Result<Vec<(Vec<u8>, Vec<u8>)>, StorageError> {
        let (start, end) = world_prefix_range(world_id);

        let results = table.range(start.as_slice()..end.as_slice()).map_err(io_err)?;

        let mut rows = Vec::new();
        for result in results {
            let (key, value) = result.map_err(io_err)?;
            rows.push((key.value().to_vec(), value.value().to_vec()));
        }

        Ok(rows)
    }

}

impl Storage for RedbStorage {
    fn create_world(&self, world: &World) -> Result<(), StorageError> {
        let bytes =
            encode(&StoredWorld { name: world.name.clone(), room_version: world.room_version })?;

        let txn = self.db.begin_write().map_err(io_err)?;
        {
            let mut table = txn.open_table(WORLDS).map_err(io_err)?;

            if table.get(world.id.as_str()).map_err(io_err)?.is_some() {
                return Err(StorageError::WorldExists(world.id.clone()));
            }

            table.insert(world.id.as_str(), bytes.as_slice()).map_err(io_err)?;
        }
        txn.commit().map_err(io_err)?;

        Ok(())
    }

    fn load_world(&self, world_id: &WorldId) -> Result<Option<World>, StorageError> {
        let txn = self.db.begin_read().map_err(io_err)?;
        let table = txn.open_table(WORLDS).map_err(io_err)?;

        match table.get(world_id.as_str()).map_err(io_err)? {
            Some(value) => {
                let stored: StoredWorld = decode(value.value())?;
                Ok(Some(World {
                    id: world_id.clone(),
                    name: stored.name,
                    room_version: stored.room_version,
                }))
            },
            None => Ok(None),
        }
    }

    fn list_worlds(&self) -> Result<Vec<World>, StorageError> {
        let txn = self.db.begin_read().map_err(io_err)?;
        let table = txn.open_table(WORLDS).map_err(io_err)?;

        let mut worlds = Vec::new();
        for result in table.iter().map_err(io_err)? {
            let (key, value) = result.map_err(io_err)?;
            let id = WorldId::new(key.value())
                .map_err(|e| StorageError::Serialization(e.to_string()))?;
            let stored: StoredWorld = decode(value.value())?;
            worlds.push(World { id, name: stored.name, room_version: stored.room_version });
        }

        Ok(worlds)
    }

    fn set_room_version(&self, world_id: &WorldId, version: u32) -> Result<(), StorageError> {
        let txn = self.db.begin_write().map_err(io_err)?;
        {
            let mut table = txn.open_table(WORLDS).map_err(io_err)?;

            let mut stored: StoredWorld = match table.get(world_id.as_str()).map_err(io_err)? {
                Some(value) => decode(value.value())?,
                None => return Err(StorageError::WorldNotFound(world_id.clone())),
            };
            stored.room_version = version;

            let bytes = encode(&stored)?;
            table.insert(world_id.as_str(), bytes.as_slice()).map_err(io_err)?;
        }
        txn.commit().map_err(io_err)?;

        Ok(())
    }

    fn store_membership(&self, membership: &Membership) -> Result<(), StorageError> {
        let bytes = encode(&membership.role)?;
        let key = membership_key(&membership.world_id, &membership.user_id);

        let txn = self.db.begin_write().map_err(io_err)?;
        {
            let mut table = txn.open_table(MEMBERSHIPS).map_err(io_err)?;
            table.insert(key.as_slice(), bytes.as_slice()).map_err(io_err)?;
        }
        txn.commit().map_err(io_err)?;

        Ok(())
    }

    fn load_membership(
        &self,
        world_id: &WorldId,
        user_id: &str,
    ) -> Result<Option<Membership>, StorageError> {
        let txn = self.db.begin_read().map_err(io_err)?;
        let table = txn.open_table(MEMBERSHIPS).map_err(io_err)?;

        let key = membership_key(world_id, user_id);

        match table.get(key.as_slice()).map_err(io_err)? {
            Some(value) => {
                let role: MemberRole = decode(value.value())?;
                Ok(Some(Membership {
                    world_id: world_id.clone(),
                    user_id: user_id.to_string(),
                    role,
                }))
            },
            None => Ok(None),
        }
    }

    fn insert_snapshot(&self, snapshot: &WorldSnapshot) -> Result<(), StorageError> {
        let data_json = serde_json::to_string(&snapshot.data)
            .map_err(|e| StorageError::Serialization(e.to_string()))?;
        let bytes = encode(&StoredSnapshot { name: snapshot.name.clone(), data_json })?;
        let key = snapshot_key(&snapshot.world_id, snapshot.created_at_ms, snapshot.id);

        let txn = self.db.begin_write().map_err(io_err)?;
        {
            let mut table = txn.open_table(SNAPSHOTS).map_err(io_err)?;
            table.insert(key.as_slice(), bytes.as_slice()).map_err(io_err)?;
        }
        txn.commit().map_err(io_err)?;

        Ok(())
    }

    fn count_snapshots(&self, world_id: &WorldId) -> Result<usize, StorageError> {
        let txn = self.db.begin_read().map_err(io_err)?;
        let table = txn.open_table(SNAPSHOTS).map_err(io_err)?;

        let (start, end) = world_prefix_range(world_id);

        let mut count = 0;
        for result in table.range(start.as_slice()..end.as_slice()).map_err(io_err)? {
            result.map_err(io_err)?;
            count += 1;
        }

        Ok(count)
    }

    fn load_snapshots(&self, world_id: &WorldId) -> Result<Vec<WorldSnapshot>, StorageError> {
        let txn = self.db.begin_read().map_err(io_err)?;
        let table = txn.open_table(SNAPSHOTS).map_err(io_err)?;

        let mut snapshots = Vec::new();
        for (key, value) in Self::scan_snapshots(&table, world_id)?.into_iter().rev() {
            let (created_at_ms, id) = decode_snapshot_suffix(&key)?;
            let stored: StoredSnapshot = decode(&value)?;
            let data = serde_json::from_str(&stored.data_json)
                .map_err(|e| StorageError::Serialization(e.to_string()))?;

            snapshots.push(WorldSnapshot {
                id,
                world_id: world_id.clone(),
                name: stored.name,
                data,
                created_at_ms,
            });
        }

        Ok(snapshots)
    }

    fn oldest_snapshot_ids(
        &self,
        world_id: &WorldId,
        limit: usize,
    ) -> Result<Vec<SnapshotId>, StorageError> {
        let txn = self.db.begin_read().map_err(io_err)?;
        let table = txn.open_table(SNAPSHOTS).map_err(io_err)?;

        let (start, end) = world_prefix_range(world_id);

        let mut ids = Vec::with_capacity(limit);
        for result in table.range(start.as_slice()..end.as_slice()).map_err(io_err)? {
            if ids.len() >= limit {
                break;
            }
            let (key, _) = result.map_err(io_err)?;
            let (_, id) = decode_snapshot_suffix(key.value())?;
            ids.push(id);
        }

        Ok(ids)
    }

    fn delete_snapshots(
        &self,
        world_id: &WorldId,
        ids: &[SnapshotId],
    ) -> Result<usize, StorageError> {
        if ids.is_empty() {
            return Ok(0);
        }

        let txn = self.db.begin_write().map_err(io_err)?;
        let removed = {
            let mut table = txn.open_table(SNAPSHOTS).map_err(io_err)?;

            let mut doomed = Vec::new();
            for (key, _) in Self::scan_snapshots(&table, world_id)? {
                let (_, id) = decode_snapshot_suffix(&key)?;
                if ids.contains(&id) {
                    doomed.push(key);
                }
            }

            for key in &doomed {
                table.remove(key.as_slice()).map_err(io_err)?;
            }

            doomed.len()
        };
        txn.commit().map_err(io_err)?;

        Ok(removed)
    }
}

fn io_err(err: impl std::fmt::Display) -> StorageError {
    StorageError::Io(err.to_string())
}

fn encode<T: Serialize>(value: &T) -> Result<Vec<u8>, StorageError> {
    let mut bytes = Vec::new();
    ciborium::into_writer(value, &mut bytes)
        .map_err(|e| StorageError::Serialization(e.to_string()))?;
    Ok(bytes)
}

fn decode<T: for<'de> Deserialize<'de>>(bytes: &[u8]) -> Result<T, StorageError> {
    ciborium::from_reader(bytes).map_err(|e| StorageError::Serialization(e.to_string()))
}

/// Encode (world_id, user_id) as `[world][0x00][user]`.
fn membership_key(world_id: &WorldId, user_id: &str) -> Vec<u8> {
    let mut key = Vec::with_capacity(world_id.as_str().len() + 1 + user_id.len());
    key.extend_from_slice(world_id.as_str().as_bytes());
    key.push(0);
    key.extend_from_slice(user_id.as_bytes());
    key
}

/// Encode a snapshot key.
///
/// Layout: [world id][0x00][created_at_ms: 8 bytes BE][id: 16 bytes BE]. World
/// ids never contain 0x00, so the prefix is unambiguous and lexicographic
/// ordering within a world matches creation order.
fn snapshot_key(world_id: &WorldId, created_at_ms: u64, id: SnapshotId) -> Vec<u8> {
    let mut key = Vec::with_capacity(world_id.as_str().len() + 1 + SNAPSHOT_SUFFIX_LEN);
    key.extend_from_slice(world_id.as_str().as_bytes());
    key.push(0);
    key.extend_from_slice(&created_at_ms.to_be_bytes());
    key.extend_from_slice(&id.as_u128().to_be_bytes());
    key
}

/// Half-open key range covering every snapshot of a world.
fn world_prefix_range(world_id: &WorldId) -> (Vec<u8>, Vec<u8>) {
    let mut start = world_id.as_str().as_bytes().to_vec();
    let mut end = start.clone();
    start.push(0);
    end.push(1);
    (start, end)
}

/// Decode (created_at_ms, id) from the tail of a snapshot key.
fn decode_snapshot_suffix(key: &[u8]) -> Result<(u64, SnapshotId), StorageError> {
    let Some(suffix_start) = key.len().checked_sub(SNAPSHOT_SUFFIX_LEN) else {
        return Err(StorageError::Serialization("snapshot key too short".to_string()));
    };
    let suffix = &key[suffix_start..];

    let mut created_at = [0u8; 8];
    created_at.copy_from_slice(&suffix[..8]);
    let mut id = [0u8; 16];
    id.copy_from_slice(&suffix[8..]);

    Ok((u64::from_be_bytes(created_at), SnapshotId::from_u128(u128::from_be_bytes(id))))
}
