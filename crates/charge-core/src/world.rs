//! World, membership and snapshot records.

use serde::{Deserialize, Serialize};

use crate::{
    ids::{RoomId, SnapshotId, WorldId},
    policy::PLAYER_GROUP,
};

/// A campaign instance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct World {
    /// Unique id
    pub id: WorldId,
    /// Display name
    pub name: String,
    /// Policy version the remote room was last provisioned with (0 = never)
    pub room_version: u32,
}

impl World {
    /// New world that has never been provisioned.
    pub fn new(id: WorldId, name: impl Into<String>) -> Self {
        Self { id, name: name.into(), room_version: 0 }
    }

    /// The world's collaboration room.
    pub fn room_id(&self) -> RoomId {
        RoomId::for_world(&self.id)
    }
}

/// Role of a user within a world.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MemberRole {
    /// Created the world
    Owner,
    /// Plays in the world
    Player,
    /// Watches without write access
    Spectator,
}

impl MemberRole {
    /// Room-service group ids for this role.
    pub fn group_ids(self) -> Vec<String> {
        match self {
            Self::Owner | Self::Player => vec![PLAYER_GROUP.to_string()],
            Self::Spectator => Vec::new(),
        }
    }
}

/// A user's membership in a world.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Membership {
    /// World the user belongs to
    pub world_id: WorldId,
    /// Authenticated user id
    pub user_id: String,
    /// Role within the world
    pub role: MemberRole,
}

/// Immutable copy of a room's storage document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorldSnapshot {
    /// Generated id
    pub id: SnapshotId,
    /// Owning world
    pub world_id: WorldId,
    /// World display name at capture time
    pub name: String,
    /// Parsed storage document
    pub data: serde_json::Value,
    /// Capture time, milliseconds since the Unix epoch
    pub created_at_ms: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_world_is_unprovisioned() {
        let world = World::new(WorldId::new("w1").unwrap(), "Ashes");
        assert_eq!(world.room_version, 0);
        assert_eq!(world.room_id().to_string(), "world:w1");
    }

    #[test]
    fn role_groups() {
        assert_eq!(MemberRole::Player.group_ids(), vec!["player".to_string()]);
        assert_eq!(MemberRole::Owner.group_ids(), vec!["player".to_string()]);
        assert!(MemberRole::Spectator.group_ids().is_empty());
    }
}
