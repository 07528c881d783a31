//! Validated identifiers.
//!
//! Room ids are derived from world ids (`world:<worldId>`). Both directions go
//! through [`RoomId`] so a malformed id is rejected at the boundary instead of
//! being split and indexed ad hoc.

use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};

use crate::error::{IdError, MAX_WORLD_ID_LEN};

/// Prefix shared by every world room id.
pub const ROOM_PREFIX: &str = "world:";

/// Identifier of a world (campaign instance).
///
/// Non-empty, at most [`MAX_WORLD_ID_LEN`] bytes, ASCII alphanumerics plus
/// `-` and `_`. The restricted alphabet keeps ids safe to embed in URL paths
/// and in storage keys that use `0x00` as a separator.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct WorldId(String);

impl WorldId {
    /// Validate and wrap a world id.
    pub fn new(id: impl Into<String>) -> Result<Self, IdError> {
        let id = id.into();

        if id.is_empty() {
            return Err(IdError::EmptyWorldId);
        }
        if id.len() > MAX_WORLD_ID_LEN {
            return Err(IdError::WorldIdTooLong { len: id.len() });
        }
        if let Some(found) = id.chars().find(|c| !(c.is_ascii_alphanumeric() || *c == '-' || *c == '_'))
        {
            return Err(IdError::InvalidWorldIdChar { found });
        }

        Ok(Self(id))
    }

    /// Borrow the id as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for WorldId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for WorldId {
    type Err = IdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl TryFrom<String> for WorldId {
    type Error = IdError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<WorldId> for String {
    fn from(id: WorldId) -> Self {
        id.0
    }
}

impl AsRef<str> for WorldId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Identifier of a world's collaboration room on the room-storage service.
///
/// Canonical text form is `world:<worldId>`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RoomId {
    world_id: WorldId,
}

impl RoomId {
    /// Room belonging to `world_id`.
    pub fn for_world(world_id: &WorldId) -> Self {
        Self { world_id: world_id.clone() }
    }

    /// Parse a room id of the form `world:<worldId>`.
    ///
    /// The world part must itself be a valid [`WorldId`], which also rejects
    /// any further `:` segments.
    pub fn parse(s: &str) -> Result<Self, IdError> {
        let rest =
            s.strip_prefix(ROOM_PREFIX).ok_or_else(|| IdError::MissingRoomPrefix(s.to_string()))?;

        Ok(Self { world_id: WorldId::new(rest)? })
    }

    /// World that owns this room.
    pub fn world_id(&self) -> &WorldId {
        &self.world_id
    }

    /// Whether this room belongs to `world_id`.
    pub fn belongs_to(&self, world_id: &WorldId) -> bool {
        &self.world_id == world_id
    }
}

impl fmt::Display for RoomId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{ROOM_PREFIX}{}", self.world_id)
    }
}

impl FromStr for RoomId {
    type Err = IdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

/// Identifier of a stored world snapshot.
///
/// Random 128-bit value, rendered as 32 lowercase hex digits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct SnapshotId(u128);

impl SnapshotId {
    /// Wrap a raw value.
    pub const fn from_u128(value: u128) -> Self {
        Self(value)
    }

    /// Raw value.
    pub const fn as_u128(self) -> u128 {
        self.0
    }
}

impl fmt::Display for SnapshotId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:032x}", self.0)
    }
}

impl FromStr for SnapshotId {
    type Err = IdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.len() != 32 {
            return Err(IdError::InvalidSnapshotId(s.to_string()));
        }
        u128::from_str_radix(s, 16).map(Self).map_err(|_| IdError::InvalidSnapshotId(s.to_string()))
    }
}

impl TryFrom<String> for SnapshotId {
    type Error = IdError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<SnapshotId> for String {
    fn from(id: SnapshotId) -> Self {
        id.to_string()
    }
}
