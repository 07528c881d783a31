//! Deterministic simulation harness for Charge Worlds testing.
//!
//! Provides [`SimEnv`], an [`Environment`](charge_core::Environment) with a
//! virtual clock and a seeded RNG, so archive ordering, snapshot ids and
//! scheduler cadence are reproducible.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod sim_env;

pub use sim_env::{SimEnv, SimInstant};
