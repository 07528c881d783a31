//! Integration tests for room authorization.
//!
//! Covers the full join flow (membership, provisioning, token) and checks
//! that every denial happens before any remote call it doesn't need.

use charge_core::{MemberRole, Membership, RoomPolicy, World, WorldId};
use charge_server::{
    AuthorizeError, MemoryRoomService, MemoryStorage, RoomAuthorizer, RoomCall, RoomOp,
    RoomProvisioner, Storage,
};

struct Fixture {
    storage: MemoryStorage,
    rooms: MemoryRoomService,
    authorizer: RoomAuthorizer<MemoryStorage, MemoryRoomService>,
    world: World,
}

fn fixture() -> Fixture {
    let storage = MemoryStorage::new();
    let rooms = MemoryRoomService::new();
    let world = World::new(WorldId::new("w1").unwrap(), "Ashes of Vel");
    storage.create_world(&world).unwrap();

    for (user, role) in
        [("owner", MemberRole::Owner), ("ana", MemberRole::Player), ("eve", MemberRole::Spectator)]
    {
        storage
            .store_membership(&Membership {
                world_id: world.id.clone(),
                user_id: user.to_string(),
                role,
            })
            .unwrap();
    }

    let provisioner = RoomProvisioner::new(storage.clone(), rooms.clone(), RoomPolicy::current());
    let authorizer = RoomAuthorizer::new(storage.clone(), rooms.clone(), provisioner);

    Fixture { storage, rooms, authorizer, world }
}

#[tokio::test]
async fn player_gets_token_with_player_group() {
    let fx = fixture();

    let token = fx.authorizer.authorize("ana", "world:w1").await.unwrap();

    assert_eq!(token.0, "token:ana:player");
    assert_eq!(
        fx.rooms.calls().last(),
        Some(&RoomCall::IdentifyUser {
            user_id: "ana".to_string(),
            group_ids: vec!["player".to_string()],
        })
    );
}

#[tokio::test]
async fn spectator_gets_token_without_groups() {
    let fx = fixture();

    let token = fx.authorizer.authorize("eve", "world:w1").await.unwrap();

    assert_eq!(token.0, "token:eve:");
}

#[tokio::test]
async fn first_join_provisions_room() {
    let fx = fixture();

    fx.authorizer.authorize("owner", "world:w1").await.unwrap();

    let ops: Vec<_> = fx.rooms.calls().iter().map(RoomCall::op).collect();
    assert_eq!(ops, vec![RoomOp::GetRoom, RoomOp::CreateRoom, RoomOp::IdentifyUser]);
    assert_eq!(fx.storage.load_world(&fx.world.id).unwrap().unwrap().room_version, 1);

    // Second join only mints a token
    fx.rooms.clear_calls();
    fx.authorizer.authorize("ana", "world:w1").await.unwrap();
    let ops: Vec<_> = fx.rooms.calls().iter().map(RoomCall::op).collect();
    assert_eq!(ops, vec![RoomOp::IdentifyUser]);
}

#[tokio::test]
async fn non_member_is_denied_without_remote_calls() {
    let fx = fixture();

    let err = fx.authorizer.authorize("mallory", "world:w1").await.unwrap_err();

    assert!(matches!(err, AuthorizeError::NotAMember { .. }));
    assert_eq!(err.status(), 403);
    assert_eq!(err.public_message(), "access denied");
    assert!(fx.rooms.calls().is_empty());
}

#[tokio::test]
async fn unknown_world_is_denied_without_remote_calls() {
    let fx = fixture();

    let err = fx.authorizer.authorize("ana", "world:nope").await.unwrap_err();

    assert!(matches!(err, AuthorizeError::UnknownWorld(_)));
    assert_eq!(err.status(), 404);
    assert!(fx.rooms.calls().is_empty());
}

#[tokio::test]
async fn malformed_room_ids_are_rejected() {
    let fx = fixture();

    for room in ["w1", "world:", "room:w1", "world:w1:extra", "world:../w1", ""] {
        let err = fx.authorizer.authorize("ana", room).await.unwrap_err();
        assert!(matches!(err, AuthorizeError::InvalidRoom(_)), "{room:?} gave {err:?}");
        assert_eq!(err.status(), 400);
    }
    assert!(fx.rooms.calls().is_empty());
}

#[tokio::test]
async fn provisioning_failure_denies_without_token() {
    let fx = fixture();
    fx.rooms.fail(RoomOp::CreateRoom, 502);

    let err = fx.authorizer.authorize("ana", "world:w1").await.unwrap_err();

    assert!(matches!(err, AuthorizeError::Provisioning(_)));
    assert_eq!(err.status(), 500);
    assert_eq!(err.public_message(), "access denied");
    assert!(fx.rooms.calls().iter().all(|c| c.op() != RoomOp::IdentifyUser));
}

#[tokio::test]
async fn token_failure_is_reported_after_provisioning() {
    let fx = fixture();
    fx.rooms.fail(RoomOp::IdentifyUser, 503);

    let err = fx.authorizer.authorize("ana", "world:w1").await.unwrap_err();

    assert!(matches!(err, AuthorizeError::Token(_)));
    assert_eq!(fx.storage.load_world(&fx.world.id).unwrap().unwrap().room_version, 1);
}
