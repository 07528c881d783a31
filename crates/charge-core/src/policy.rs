//! Room access policy.
//!
//! A [`RoomPolicy`] is a versioned, immutable description of who may do what
//! in a world's room. The provisioner pushes [`RoomPolicy::access_config`] to
//! the room service and records the policy version on the world; rooms whose
//! recorded version is at least the policy version are considered in sync.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Group name granted to players and owners.
pub const PLAYER_GROUP: &str = "player";

/// Policy version shipped with this build.
pub const CURRENT_POLICY_VERSION: u32 = 1;

/// Access level granted to a room participant.
///
/// Ordered: `Private < Read < Write`. Each level's permissions are a superset
/// of the previous one's in capability.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AccessLevel {
    /// No grants
    Private,
    /// Read storage, write presence
    Read,
    /// Full write
    Write,
}

impl AccessLevel {
    /// Permission strings understood by the room service.
    pub fn permissions(self) -> &'static [&'static str] {
        match self {
            Self::Private => &[],
            Self::Read => &["room:read", "room:presence:write"],
            Self::Write => &["room:write"],
        }
    }

    fn permission_list(self) -> Vec<String> {
        self.permissions().iter().map(|p| (*p).to_string()).collect()
    }
}

/// Access settings body sent to the room service on create and update.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoomAccessConfig {
    /// Permissions for any authorized user without a matching group
    pub default_accesses: Vec<String>,
    /// Permissions per group id
    pub groups_accesses: BTreeMap<String, Vec<String>>,
}

/// Versioned room access policy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoomPolicy {
    version: u32,
    default_access: AccessLevel,
    group_access: BTreeMap<String, AccessLevel>,
}

impl RoomPolicy {
    /// Policy with no group grants.
    pub fn new(version: u32, default_access: AccessLevel) -> Self {
        Self { version, default_access, group_access: BTreeMap::new() }
    }

    /// The policy this build enforces: version 1, read by default, players
    /// write.
    pub fn current() -> Self {
        Self::new(CURRENT_POLICY_VERSION, AccessLevel::Read)
            .with_group(PLAYER_GROUP, AccessLevel::Write)
    }

    /// Grant `level` to members of `group`.
    #[must_use]
    pub fn with_group(mut self, group: impl Into<String>, level: AccessLevel) -> Self {
        self.group_access.insert(group.into(), level);
        self
    }

    /// Policy version number.
    pub fn version(&self) -> u32 {
        self.version
    }

    /// Access level for users with no group grant.
    pub fn default_access(&self) -> AccessLevel {
        self.default_access
    }

    /// Access level granted to `group`, if any.
    pub fn group_access(&self, group: &str) -> Option<AccessLevel> {
        self.group_access.get(group).copied()
    }

    /// Whether a room recorded at `room_version` already carries this policy.
    pub fn is_satisfied_by(&self, room_version: u32) -> bool {
        room_version >= self.version
    }

    /// Compute the access settings body for the room service.
    pub fn access_config(&self) -> RoomAccessConfig {
        RoomAccessConfig {
            default_accesses: self.default_access.permission_list(),
            groups_accesses: self
                .group_access
                .iter()
                .map(|(group, level)| (group.clone(), level.permission_list()))
                .collect(),
        }
    }
}

impl Default for RoomPolicy {
    fn default() -> Self {
        Self::current()
    }
}
