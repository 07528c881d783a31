//! Simulated environment with a virtual clock.
//!
//! Time only moves when a test advances it, when code sleeps, or by one
//! millisecond on every wall-clock read. The last rule gives every snapshot a
//! distinct, strictly increasing timestamp without tests having to interleave
//! manual clock advances.

#![allow(clippy::disallowed_types, reason = "Locking simple clock and RNG state")]

use std::{
    ops::Sub,
    sync::{Arc, Mutex},
    time::Duration,
};

use charge_core::Environment;
use rand::{RngCore, SeedableRng};
use rand_chacha::ChaCha8Rng;

/// Default wall-clock origin: 2024-01-01T00:00:00Z.
const DEFAULT_EPOCH_MS: u64 = 1_704_067_200_000;

/// Virtual monotonic instant, measured from the start of the simulation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SimInstant(Duration);

impl Sub for SimInstant {
    type Output = Duration;

    fn sub(self, rhs: Self) -> Duration {
        self.0.saturating_sub(rhs.0)
    }
}

struct SimState {
    elapsed: Duration,
    rng: ChaCha8Rng,
}

/// Deterministic environment for tests.
///
/// Clones share the same clock and RNG.
#[derive(Clone)]
pub struct SimEnv {
    epoch_ms: u64,
    state: Arc<Mutex<SimState>>,
}

impl SimEnv {
    /// Environment seeded with `seed`, starting at the default wall-clock
    /// origin.
    pub fn with_seed(seed: u64) -> Self {
        Self::with_seed_at(seed, DEFAULT_EPOCH_MS)
    }

    /// Environment seeded with `seed`, starting at `epoch_ms` wall-clock.
    pub fn with_seed_at(seed: u64, epoch_ms: u64) -> Self {
        Self {
            epoch_ms,
            state: Arc::new(Mutex::new(SimState {
                elapsed: Duration::ZERO,
                rng: ChaCha8Rng::seed_from_u64(seed),
            })),
        }
    }

    /// Move the virtual clock forward.
    pub fn advance(&self, by: Duration) {
        self.with_state(|state| state.elapsed += by);
    }

    /// Total virtual time elapsed since creation.
    pub fn elapsed(&self) -> Duration {
        self.with_state(|state| state.elapsed)
    }

    #[allow(clippy::expect_used)]
    fn with_state<T>(&self, f: impl FnOnce(&mut SimState) -> T) -> T {
        let mut state = self.state.lock().expect("SimEnv mutex poisoned");
        f(&mut state)
    }
}

impl Default for SimEnv {
    fn default() -> Self {
        Self::with_seed(0)
    }
}

impl Environment for SimEnv {
    type Instant = SimInstant;

    fn now(&self) -> Self::Instant {
        SimInstant(self.elapsed())
    }

    fn sleep(&self, duration: Duration) -> impl std::future::Future<Output = ()> + Send {
        self.advance(duration);
        std::future::ready(())
    }

    fn random_bytes(&self, buffer: &mut [u8]) {
        self.with_state(|state| state.rng.fill_bytes(buffer));
    }

    fn wall_clock_millis(&self) -> u64 {
        self.with_state(|state| {
            state.elapsed += Duration::from_millis(1);
            self.epoch_ms + state.elapsed.as_millis() as u64
        })
    }
}
