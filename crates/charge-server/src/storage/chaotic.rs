//! Chaotic storage wrapper for fault injection testing
//!
//! Storage wrapper that randomly fails operations to test error handling and
//! recovery. Used for chaos testing to ensure archive retention heals itself
//! after storage failures.

#![allow(clippy::disallowed_types, reason = "Locking simple RNG state")]

use std::sync::{Arc, Mutex};

use charge_core::{Membership, SnapshotId, World, WorldId, WorldSnapshot};

use super::{Storage, StorageError};

/// Storage operation, for restricting fault injection to one call site.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageOp {
    /// [`Storage::create_world`]
    CreateWorld,
    /// [`Storage::load_world`]
    LoadWorld,
    /// [`Storage::list_worlds`]
    ListWorlds,
    /// [`Storage::set_room_version`]
    SetRoomVersion,
    /// [`Storage::store_membership`]
    StoreMembership,
    /// [`Storage::load_membership`]
    LoadMembership,
    /// [`Storage::insert_snapshot`]
    InsertSnapshot,
    /// [`Storage::count_snapshots`]
    CountSnapshots,
    /// [`Storage::load_snapshots`]
    LoadSnapshots,
    /// [`Storage::oldest_snapshot_ids`]
    OldestSnapshotIds,
    /// [`Storage::delete_snapshots`]
    DeleteSnapshots,
}

/// Chaotic storage wrapper that randomly injects failures
///
/// Delegates to an underlying storage implementation but randomly fails
/// operations based on a configured failure rate. Uses Arc<Mutex<>> for the
/// RNG state, making it Clone and thread-safe.
#[derive(Clone)]
pub struct ChaoticStorage<S: Storage> {
    inner: S,
    /// Failure rate (0.0 = never fail, 1.0 = always fail)
    failure_rate: f64,
    /// Only inject into this operation when set
    target: Option<StorageOp>,
    /// RNG state for deterministic chaos
    rng: Arc<Mutex<ChaoticRng>>,
    /// Operation counter
    operation_count: Arc<Mutex<usize>>,
}

/// Simple deterministic RNG for chaos injection
///
/// Uses linear congruential generator (LCG) for fast, deterministic randomness.
/// This ensures chaos tests are reproducible with the same seed.
struct ChaoticRng {
    state: u64,
}

impl ChaoticRng {
    fn new(seed: u64) -> Self {
        Self { state: seed }
    }

    /// Generate next random value [0.0, 1.0)
    fn next(&mut self) -> f64 {
        // LCG constants from Numerical Recipes
        const A: u64 = 1_664_525;
        const C: u64 = 1_013_904_223;
        const M: u64 = 1u64 << 32;

        self.state = (A.wrapping_mul(self.state).wrapping_add(C)) % M;
        (self.state as f64) / (M as f64)
    }

    fn should_fail(&mut self, failure_rate: f64) -> bool {
        self.next() < failure_rate
    }
}

impl<S: Storage> ChaoticStorage<S> {
    /// Create a new chaotic storage wrapper
    ///
    /// # Panics
    ///
    /// Panics if `failure_rate` is not in [0.0, 1.0]
    pub fn new(inner: S, failure_rate: f64) -> Self {
        Self::with_seed(inner, failure_rate, 0x1234_5678_9ABC_DEF0)
    }

    /// Create with explicit seed for reproducible chaos
    ///
    /// # Panics
    ///
    /// Panics if `failure_rate` is not in [0.0, 1.0]
    #[allow(clippy::panic)]
    pub fn with_seed(inner: S, failure_rate: f64, seed: u64) -> Self {
        assert!(
            (0.0..=1.0).contains(&failure_rate),
            "failure_rate must be between 0.0 and 1.0, got {failure_rate}"
        );

        Self {
            inner,
            failure_rate,
            target: None,
            rng: Arc::new(Mutex::new(ChaoticRng::new(seed))),
            operation_count: Arc::new(Mutex::new(0)),
        }
    }

    /// Restrict failure injection to a single operation.
    #[must_use]
    pub fn targeting(mut self, op: StorageOp) -> Self {
        self.target = Some(op);
        self
    }

    /// Underlying storage (for checking invariants after chaos).
    pub fn inner(&self) -> &S {
        &self.inner
    }

    /// Total number of storage operations attempted.
    pub fn operation_count(&self) -> usize {
        #[allow(clippy::expect_used)]
        *self.operation_count.lock().expect("operation_count mutex poisoned")
    }

    /// Count the operation and decide whether it fails.
    fn inject(&self, op: StorageOp) -> Result<(), StorageError> {
        #[allow(clippy::expect_used)]
        {
            *self.operation_count.lock().expect("operation_count mutex poisoned") += 1;
        }

        if self.target.is_some_and(|target| target != op) {
            return Ok(());
        }

        #[allow(clippy::expect_used)]
        let fail =
            self.rng.lock().expect("ChaoticRng mutex poisoned").should_fail(self.failure_rate);

        if fail {
            return Err(StorageError::Io(format!("chaotic failure injection in {op:?}")));
        }
        Ok(())
    }
}

impl<S: Storage> Storage for ChaoticStorage<S> {
    fn create_world(&self, world: &World) -> Result<(), StorageError> {
        self.inject(StorageOp::CreateWorld)?;
        self.inner.create_world(world)
    }

    fn load_world(&self, world_id: &WorldId) -> Result<Option<World>, StorageError> {
        self.inject(StorageOp::LoadWorld)?;
        self.inner.load_world(world_id)
    }

    fn list_worlds(&self) -> Result<Vec<World>, StorageError> {
        self.inject(StorageOp::ListWorlds)?;
        self.inner.list_worlds()
    }

    fn set_room_version(&self, world_id: &WorldId, version: u32) -> Result<(), StorageError> {
        self.inject(StorageOp::SetRoomVersion)?;
        self.inner.set_room_version(world_id, version)
    }

    fn store_membership(&self, membership: &Membership) -> Result<(), StorageError> {
        self.inject(StorageOp::StoreMembership)?;
        self.inner.store_membership(membership)
    }

    fn load_membership(
        &self,
        world_id: &WorldId,
        user_id: &str,
    ) -> Result<Option<Membership>, StorageError> {
        self.inject(StorageOp::LoadMembership)?;
        self.inner.load_membership(world_id, user_id)
    }

    fn insert_snapshot(&self, snapshot: &WorldSnapshot) -> Result<(), StorageError> {
        self.inject(StorageOp::InsertSnapshot)?;
        self.inner.insert_snapshot(snapshot)
    }

    fn count_snapshots(&self, world_id: &WorldId) -> Result<usize, StorageError> {
        self.inject(StorageOp::CountSnapshots)?;
        self.inner.count_snapshots(world_id)
    }

    fn load_snapshots(&self, world_id: &WorldId) -> Result<Vec<WorldSnapshot>, StorageError> {
        self.inject(StorageOp::LoadSnapshots)?;
        self.inner.load_snapshots(world_id)
    }

    fn oldest_snapshot_ids(
        &self,
        world_id: &WorldId,
        limit: usize,
    ) -> Result<Vec<SnapshotId>, StorageError> {
        self.inject(StorageOp::OldestSnapshotIds)?;
        self.inner.oldest_snapshot_ids(world_id, limit)
    }

    fn delete_snapshots(
        &self,
        world_id: &WorldId,
        ids: &[SnapshotId],
    ) -> Result<usize, StorageError> {
        self.inject(StorageOp::DeleteSnapshots)?;
        self.inner.delete_snapshots(world_id, ids)
    }
}
