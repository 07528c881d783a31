//! Integration tests for room provisioning.
//!
//! Drives `RoomProvisioner` against `MemoryRoomService` and checks the exact
//! sequence of remote calls for each starting state:
//! 1. Already current: no remote calls
//! 2. Room missing: GET (404) then create with id and config
//! 3. Room present: GET then update with the same config
//! 4. Upstream failure: error returned, recorded version untouched
//! 5. Room created by another caller between GET and create: update instead

use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use charge_core::{AccessLevel, RoomAccessConfig, RoomId, RoomPolicy, World, WorldId};
use charge_server::{
    MemoryRoomService, MemoryStorage, ProvisionError, ProvisionOutcome, RoomCall, RoomInfo,
    RoomOp, RoomProvisioner, RoomService, Storage, UpstreamError,
};

/// Room service where another caller creates the room right after the first
/// lookup reports it missing.
struct RacingRooms {
    inner: MemoryRoomService,
    peer_config: RoomAccessConfig,
    raced: AtomicBool,
}

impl RacingRooms {
    fn new(inner: MemoryRoomService, peer_config: RoomAccessConfig) -> Self {
        Self { inner, peer_config, raced: AtomicBool::new(false) }
    }
}

#[async_trait]
impl RoomService for RacingRooms {
    async fn get_room(&self, room_id: &RoomId) -> Result<Option<RoomInfo>, UpstreamError> {
        let found = self.inner.get_room(room_id).await?;
        if found.is_none() && !self.raced.swap(true, Ordering::SeqCst) {
            self.inner.create_room(room_id, &self.peer_config).await?;
        }
        Ok(found)
    }

    async fn update_room(
        &self,
        room_id: &RoomId,
        config: &RoomAccessConfig,
    ) -> Result<(), UpstreamError> {
        self.inner.update_room(room_id, config).await
    }

    async fn create_room(
        &self,
        room_id: &RoomId,
        config: &RoomAccessConfig,
    ) -> Result<(), UpstreamError> {
        self.inner.create_room(room_id, config).await
    }

    async fn fetch_storage(&self, room_id: &RoomId) -> Result<Option<String>, UpstreamError> {
        self.inner.fetch_storage(room_id).await
    }

    async fn identify_user(
        &self,
        user_id: &str,
        group_ids: &[String],
    ) -> Result<String, UpstreamError> {
        self.inner.identify_user(user_id, group_ids).await
    }
}

fn seeded_world(storage: &MemoryStorage, id: &str) -> World {
    let world = World::new(WorldId::new(id).unwrap(), "Ashes of Vel");
    storage.create_world(&world).unwrap();
    world
}

fn room_version(storage: &MemoryStorage, world: &World) -> u32 {
    storage.load_world(&world.id).unwrap().unwrap().room_version
}

#[tokio::test]
async fn second_call_makes_no_remote_calls() {
    let storage = MemoryStorage::new();
    let rooms = MemoryRoomService::new();
    let world = seeded_world(&storage, "w1");
    let provisioner = RoomProvisioner::new(storage.clone(), rooms.clone(), RoomPolicy::current());

    let first = provisioner.ensure_room_provisioned(&world.id, &world.room_id()).await.unwrap();
    assert_eq!(first, ProvisionOutcome::Created);

    rooms.clear_calls();
    let second = provisioner.ensure_room_provisioned(&world.id, &world.room_id()).await.unwrap();

    assert_eq!(second, ProvisionOutcome::Current);
    assert!(rooms.calls().is_empty(), "Current room must not touch the room service");
}

#[tokio::test]
async fn missing_room_is_created_with_id_and_config() {
    let storage = MemoryStorage::new();
    let rooms = MemoryRoomService::new();
    let world = seeded_world(&storage, "w1");
    let policy = RoomPolicy::current();
    let provisioner = RoomProvisioner::new(storage.clone(), rooms.clone(), policy.clone());
    assert_eq!(provisioner.policy(), &policy);

    let outcome = provisioner.ensure_room_provisioned(&world.id, &world.room_id()).await.unwrap();

    assert_eq!(outcome, ProvisionOutcome::Created);
    assert_eq!(
        rooms.calls(),
        vec![
            RoomCall::GetRoom(world.room_id()),
            RoomCall::CreateRoom { room_id: world.room_id(), config: policy.access_config() },
        ]
    );
    assert_eq!(rooms.room_config(&world.room_id()), Some(policy.access_config()));
    assert_eq!(room_version(&storage, &world), policy.version());
}

#[tokio::test]
async fn existing_room_is_updated_in_place() {
    let storage = MemoryStorage::new();
    let rooms = MemoryRoomService::new();
    let world = seeded_world(&storage, "w1");
    rooms.insert_room(world.room_id(), RoomPolicy::new(0, AccessLevel::Private).access_config());

    let policy = RoomPolicy::current();
    let provisioner = RoomProvisioner::new(storage.clone(), rooms.clone(), policy.clone());

    let outcome = provisioner.ensure_room_provisioned(&world.id, &world.room_id()).await.unwrap();

    assert_eq!(outcome, ProvisionOutcome::Updated);
    assert_eq!(
        rooms.calls(),
        vec![
            RoomCall::GetRoom(world.room_id()),
            RoomCall::UpdateRoom { room_id: world.room_id(), config: policy.access_config() },
        ]
    );
    assert_eq!(rooms.room_config(&world.room_id()), Some(policy.access_config()));
    assert_eq!(room_version(&storage, &world), 1);
}

#[test]
fn update_body_carries_no_room_id() {
    let body = serde_json::to_value(RoomPolicy::current().access_config()).unwrap();
    let object = body.as_object().unwrap();

    assert!(!object.contains_key("id"));
    assert_eq!(object.len(), 2);
    assert!(object.contains_key("defaultAccesses"));
    assert!(object.contains_key("groupsAccesses"));
}

#[tokio::test]
async fn upstream_failures_leave_version_untouched() {
    for op in [RoomOp::GetRoom, RoomOp::UpdateRoom, RoomOp::CreateRoom] {
        let storage = MemoryStorage::new();
        let rooms = MemoryRoomService::new();
        let world = seeded_world(&storage, "w1");
        if op == RoomOp::UpdateRoom {
            rooms.insert_room(world.room_id(), RoomPolicy::current().access_config());
        }
        rooms.fail(op, 500);

        let provisioner = RoomProvisioner::new(storage.clone(), rooms, RoomPolicy::current());
        let result = provisioner.ensure_room_provisioned(&world.id, &world.room_id()).await;

        match result {
            Err(ProvisionError::Upstream(UpstreamError::Status { status, .. })) => {
                assert_eq!(status, 500, "{op:?}");
            },
            other => panic!("{op:?}: expected upstream 500, got {other:?}"),
        }
        assert_eq!(room_version(&storage, &world), 0, "{op:?} must not bump the version");
    }
}

#[tokio::test]
async fn retry_after_failure_completes_provisioning() {
    let storage = MemoryStorage::new();
    let rooms = MemoryRoomService::new();
    let world = seeded_world(&storage, "w1");
    let provisioner = RoomProvisioner::new(storage.clone(), rooms.clone(), RoomPolicy::current());

    rooms.fail(RoomOp::CreateRoom, 503);
    assert!(provisioner.ensure_room_provisioned(&world.id, &world.room_id()).await.is_err());

    rooms.clear_failures();
    let outcome = provisioner.ensure_room_provisioned(&world.id, &world.room_id()).await.unwrap();

    assert_eq!(outcome, ProvisionOutcome::Created);
    assert_eq!(room_version(&storage, &world), 1);
}

#[tokio::test]
async fn lost_version_write_reapplies_same_settings() {
    let storage = MemoryStorage::new();
    let rooms = MemoryRoomService::new();
    let world = seeded_world(&storage, "w1");
    let policy = RoomPolicy::current();
    let provisioner = RoomProvisioner::new(storage.clone(), rooms.clone(), policy.clone());

    provisioner.ensure_room_provisioned(&world.id, &world.room_id()).await.unwrap();

    // Crash between the remote write and the version bump
    storage.set_room_version(&world.id, 0).unwrap();

    let outcome = provisioner.ensure_room_provisioned(&world.id, &world.room_id()).await.unwrap();

    assert_eq!(outcome, ProvisionOutcome::Updated);
    assert_eq!(rooms.room_config(&world.room_id()), Some(policy.access_config()));
    assert_eq!(room_version(&storage, &world), policy.version());
}

#[tokio::test]
async fn unknown_world_makes_no_remote_calls() {
    let storage = MemoryStorage::new();
    let rooms = MemoryRoomService::new();
    let provisioner = RoomProvisioner::new(storage, rooms.clone(), RoomPolicy::current());

    let world_id = WorldId::new("ghost").unwrap();
    let result = provisioner.ensure_room_provisioned(&world_id, &RoomId::for_world(&world_id)).await;

    assert!(matches!(result, Err(ProvisionError::WorldNotFound(_))));
    assert!(rooms.calls().is_empty());
}

#[tokio::test]
async fn room_created_after_lookup_is_updated() {
    let storage = MemoryStorage::new();
    let rooms = MemoryRoomService::new();
    let world = seeded_world(&storage, "w1");
    let stale = RoomPolicy::new(0, AccessLevel::Private).access_config();
    let policy = RoomPolicy::current();
    let provisioner = RoomProvisioner::new(
        storage.clone(),
        RacingRooms::new(rooms.clone(), stale.clone()),
        policy.clone(),
    );

    let outcome = provisioner.ensure_room_provisioned(&world.id, &world.room_id()).await;

    assert_eq!(outcome.unwrap(), ProvisionOutcome::Updated);
    assert_eq!(
        rooms.calls(),
        vec![
            RoomCall::GetRoom(world.room_id()),
            RoomCall::CreateRoom { room_id: world.room_id(), config: stale },
            RoomCall::CreateRoom { room_id: world.room_id(), config: policy.access_config() },
            RoomCall::UpdateRoom { room_id: world.room_id(), config: policy.access_config() },
        ]
    );
    assert_eq!(rooms.room_config(&world.room_id()), Some(policy.access_config()));
    assert_eq!(room_version(&storage, &world), policy.version());
}

#[tokio::test]
async fn failed_update_after_conflict_leaves_version_untouched() {
    let storage = MemoryStorage::new();
    let rooms = MemoryRoomService::new();
    let world = seeded_world(&storage, "w1");
    rooms.fail(RoomOp::UpdateRoom, 503);
    let provisioner = RoomProvisioner::new(
        storage.clone(),
        RacingRooms::new(rooms.clone(), RoomPolicy::current().access_config()),
        RoomPolicy::current(),
    );

    let result = provisioner.ensure_room_provisioned(&world.id, &world.room_id()).await;

    assert!(matches!(
        result,
        Err(ProvisionError::Upstream(UpstreamError::Status { status: 503, .. }))
    ));
    assert_eq!(room_version(&storage, &world), 0);

    // Next attempt finds the room and completes with a plain update
    rooms.clear_failures();
    let outcome = provisioner.ensure_room_provisioned(&world.id, &world.room_id()).await.unwrap();
    assert_eq!(outcome, ProvisionOutcome::Updated);
    assert_eq!(room_version(&storage, &world), 1);
}
