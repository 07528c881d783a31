//! Charge Worlds room service.
//!
//! Production glue between [`charge_core`]'s domain types, local storage, and
//! the external real-time room service (Liveblocks).
//!
//! # Components
//!
//! - [`RoomProvisioner`]: creates or updates a world's room with the current
//!   access policy, gated by the world's recorded policy version
//! - [`SnapshotArchiver`]: stores a world room's storage document as a
//!   snapshot and keeps the most recent ones
//! - [`RoomAuthorizer`]: membership check, provisioning and token minting for
//!   clients joining a room
//! - [`ArchiveScheduler`]: weekly archive pass over every world
//! - [`Storage`]: persistence trait with [`MemoryStorage`], [`RedbStorage`]
//!   and [`ChaoticStorage`] backends
//! - [`RoomService`]: room service trait with [`LiveblocksClient`] and
//!   [`MemoryRoomService`]
//! - [`SystemEnv`]: production environment (real time, OS RNG)

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod archiver;
pub mod authorizer;
pub mod config;
mod error;
pub mod provisioner;
pub mod room_service;
pub mod scheduler;
pub mod storage;
mod system_env;

pub use archiver::{ArchiveError, ArchiveOutcome, SnapshotArchiver, enforce_retention};
pub use authorizer::{AuthorizeError, RoomAuthorizer, RoomToken};
pub use config::{RoomServiceConfig, ServiceConfig};
pub use error::ServerError;
pub use provisioner::{ProvisionError, ProvisionOutcome, RoomProvisioner};
pub use room_service::{
    LiveblocksClient, MemoryRoomService, RoomCall, RoomInfo, RoomOp, RoomService, UpstreamError,
};
pub use scheduler::{ArchiveReport, ArchiveScheduler};
pub use storage::{ChaoticStorage, MemoryStorage, RedbStorage, Storage, StorageError, StorageOp};
pub use system_env::SystemEnv;
