//! Fuzz target for snapshot retention under storage failures
//!
//! Interleaves snapshot inserts and retention passes over a `ChaoticStorage`
//! wrapping `MemoryStorage`.
//!
//! # Strategy
//!
//! - Variable failure rates (0% to 90%)
//! - Arbitrary timestamps, including duplicates and out-of-order inserts
//! - Retention counts from 0 to 15
//!
//! # Invariants
//!
//! - Storage errors propagate as Result::Err, never panics
//! - A successful retention pass leaves at most `keep` snapshots
//! - Retention only ever removes the oldest snapshots
//! - A failed pass never removes anything

#![no_main]

use arbitrary::Arbitrary;
use charge_core::{SnapshotId, WorldId, WorldSnapshot};
use charge_server::{ChaoticStorage, MemoryStorage, Storage, enforce_retention};
use libfuzzer_sys::fuzz_target;

#[derive(Debug, Clone, Arbitrary)]
struct RetentionScenario {
    /// Seed for ChaoticStorage RNG (deterministic failures)
    chaos_seed: u64,
    /// Failure rate 0-9 maps to 0%-90%
    failure_rate_tenth: u8,
    /// Snapshots kept per pass (mod 16)
    keep: u8,
    operations: Vec<RetentionOperation>,
}

#[derive(Debug, Clone, Arbitrary)]
enum RetentionOperation {
    /// Insert a snapshot created at the given time
    Insert { created_at_ms: u16 },
    /// Run a retention pass
    Prune,
}

fuzz_target!(|scenario: RetentionScenario| {
    let failure_rate = (scenario.failure_rate_tenth % 10) as f64 / 10.0;
    let keep = (scenario.keep % 16) as usize;

    let inner = MemoryStorage::new();
    let storage = ChaoticStorage::with_seed(inner.clone(), failure_rate, scenario.chaos_seed);
    let world_id = WorldId::new("fuzz").unwrap();

    for (i, op) in scenario.operations.iter().take(256).enumerate() {
        match op {
            RetentionOperation::Insert { created_at_ms } => {
                let snapshot = WorldSnapshot {
                    id: SnapshotId::from_u128(i as u128),
                    world_id: world_id.clone(),
                    name: "fuzz".to_string(),
                    data: serde_json::Value::Null,
                    created_at_ms: u64::from(*created_at_ms),
                };
                let _ = storage.insert_snapshot(&snapshot);
            },
            RetentionOperation::Prune => {
                let before = inner.load_snapshots(&world_id).unwrap();

                match enforce_retention(&storage, &world_id, keep) {
                    Ok(removed) => {
                        let after = inner.load_snapshots(&world_id).unwrap();
                        assert!(after.len() <= keep, "{} snapshots kept, limit {keep}", after.len());
                        assert_eq!(before.len() - after.len(), removed);

                        // Survivors are a newest-first prefix of what was there
                        let survivors: Vec<_> = after.iter().map(|s| s.id).collect();
                        let newest: Vec<_> = before.iter().take(after.len()).map(|s| s.id).collect();
                        assert_eq!(survivors, newest, "Retention removed a newer snapshot");
                    },
                    Err(_) => {
                        let after = inner.count_snapshots(&world_id).unwrap();
                        assert_eq!(after, before.len(), "Failed pass removed snapshots");
                    },
                }
            },
        }
    }
});
