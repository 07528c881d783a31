//! Charge Worlds domain core.
//!
//! Pure types shared by the room service: validated identifiers, the room
//! access policy, and the world/snapshot/membership records. Nothing in this
//! crate performs I/O; the server crate wires these types to storage and to
//! the external room-storage service.
//!
//! # Components
//!
//! - [`ids`]: [`WorldId`], [`RoomId`] (`world:<id>`) and [`SnapshotId`]
//! - [`policy`]: [`AccessLevel`], [`RoomPolicy`] and the computed
//!   [`RoomAccessConfig`] sent to the room service
//! - [`world`]: [`World`], [`WorldSnapshot`], [`Membership`]
//! - [`env`]: [`Environment`] abstraction over time and randomness

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod env;
pub mod error;
pub mod ids;
pub mod policy;
pub mod world;

pub use env::Environment;
pub use error::IdError;
pub use ids::{RoomId, SnapshotId, WorldId};
pub use policy::{AccessLevel, RoomAccessConfig, RoomPolicy};
pub use world::{MemberRole, Membership, World, WorldSnapshot};
