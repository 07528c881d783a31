//! Service configuration.
//!
//! [`ServiceConfig`] is built once (from CLI flags and environment in the
//! binary, or [`Default`] in tests) and handed to each component. The room
//! policy travels with it so tests can vary the policy version without any
//! global state.

use std::{fmt, time::Duration};

use charge_core::RoomPolicy;

use crate::room_service::{DEFAULT_BASE_URL, DEFAULT_REQUEST_TIMEOUT};

/// Snapshots kept per world after each archive run.
pub const DEFAULT_SNAPSHOT_RETENTION: usize = 10;

/// Interval between scheduled archive runs.
pub const DEFAULT_ARCHIVE_INTERVAL: Duration = Duration::from_secs(7 * 24 * 60 * 60);

/// Room-storage service connection settings.
#[derive(Clone)]
pub struct RoomServiceConfig {
    /// API base URL (without the `/v2` suffix)
    pub base_url: String,
    /// Secret key sent as a bearer token
    pub secret_key: String,
    /// Upper bound on each HTTP request
    pub request_timeout: Duration,
}

impl fmt::Debug for RoomServiceConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RoomServiceConfig")
            .field("base_url", &self.base_url)
            .field("secret_key", &"<redacted>")
            .field("request_timeout", &self.request_timeout)
            .finish()
    }
}

impl Default for RoomServiceConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            secret_key: String::new(),
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
        }
    }
}

/// Configuration shared by the provisioner, archiver and scheduler.
#[derive(Debug, Clone)]
pub struct ServiceConfig {
    /// Room-storage service connection
    pub room_service: RoomServiceConfig,
    /// Access policy pushed to rooms
    pub policy: RoomPolicy,
    /// Snapshots kept per world
    pub snapshot_retention: usize,
    /// Time between scheduled archive runs
    pub archive_interval: Duration,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            room_service: RoomServiceConfig::default(),
            policy: RoomPolicy::current(),
            snapshot_retention: DEFAULT_SNAPSHOT_RETENTION,
            archive_interval: DEFAULT_ARCHIVE_INTERVAL,
        }
    }
}
