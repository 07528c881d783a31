//! Fuzz target for RoomId::parse
//!
//! Room ids arrive straight from clients on the authorization path, so the
//! parser sees arbitrary strings.
//!
//! # Invariants
//!
//! - Parsing NEVER panics
//! - Every accepted id re-displays to exactly the input
//! - Every accepted id belongs to the world it names
//! - Accepted world ids contain only `[A-Za-z0-9_-]`

#![no_main]

use charge_core::{RoomId, WorldId};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let Ok(input) = std::str::from_utf8(data) else { return };

    if let Ok(room_id) = RoomId::parse(input) {
        assert_eq!(room_id.to_string(), input, "Display must round-trip");
        assert!(room_id.belongs_to(room_id.world_id()));
        assert!(
            room_id
                .world_id()
                .as_str()
                .bytes()
                .all(|b| b.is_ascii_alphanumeric() || b == b'_' || b == b'-'),
            "World id charset violated: {input:?}"
        );
        assert_eq!(RoomId::for_world(room_id.world_id()), room_id);
    }

    // World ids parse independently of the prefix
    if let Ok(world_id) = WorldId::new(input) {
        let room_id = RoomId::for_world(&world_id);
        assert_eq!(RoomId::parse(&room_id.to_string()).ok(), Some(room_id));
    }
});
