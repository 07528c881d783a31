//! In-process room service that records calls and scripts failures.
//!
//! Backs the provisioning, archiving and authorization tests.

#![allow(clippy::disallowed_types, reason = "Synchronous in-memory operations only")]

use std::{
    collections::HashMap,
    sync::{Arc, Mutex},
};

use async_trait::async_trait;
use charge_core::{RoomAccessConfig, RoomId};

use super::{RoomInfo, RoomService, UpstreamError};

/// Room service operation, for scripting failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RoomOp {
    /// `GET /v2/rooms/{roomId}`
    GetRoom,
    /// `POST /v2/rooms/{roomId}`
    UpdateRoom,
    /// `POST /v2/rooms`
    CreateRoom,
    /// `GET /v2/rooms/{roomId}/storage`
    FetchStorage,
    /// `POST /v2/identify-user`
    IdentifyUser,
}

/// A recorded call against [`MemoryRoomService`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RoomCall {
    /// Room lookup
    GetRoom(RoomId),
    /// Access update of an existing room
    UpdateRoom {
        /// Target room
        room_id: RoomId,
        /// Body sent
        config: RoomAccessConfig,
    },
    /// Room creation
    CreateRoom {
        /// Id of the new room
        room_id: RoomId,
        /// Access settings sent alongside the id
        config: RoomAccessConfig,
    },
    /// Storage document fetch
    FetchStorage(RoomId),
    /// Token request
    IdentifyUser {
        /// User the token is for
        user_id: String,
        /// Groups embedded in the token
        group_ids: Vec<String>,
    },
}

impl RoomCall {
    /// Operation this call exercised.
    pub fn op(&self) -> RoomOp {
        match self {
            Self::GetRoom(_) => RoomOp::GetRoom,
            Self::UpdateRoom { .. } => RoomOp::UpdateRoom,
            Self::CreateRoom { .. } => RoomOp::CreateRoom,
            Self::FetchStorage(_) => RoomOp::FetchStorage,
            Self::IdentifyUser { .. } => RoomOp::IdentifyUser,
        }
    }
}

/// In-process room service for tests and simulation.
///
/// Behaves like the real service for the operations this crate uses: updating
/// a missing room is a 404, creating an existing room is a 409, and storage
/// documents exist only once set. Failures can be scripted per operation.
/// Clones share state.
#[derive(Clone, Default)]
pub struct MemoryRoomService {
    inner: Arc<Mutex<MemoryRoomServiceInner>>,
}

#[derive(Default)]
struct MemoryRoomServiceInner {
    rooms: HashMap<RoomId, RoomAccessConfig>,
    storage: HashMap<RoomId, String>,
    failures: HashMap<RoomOp, u16>,
    calls: Vec<RoomCall>,
}

impl MemoryRoomService {
    /// Service with no rooms.
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed an existing room.
    pub fn insert_room(&self, room_id: RoomId, config: RoomAccessConfig) {
        self.lock().rooms.insert(room_id, config);
    }

    /// Set the raw storage document returned for a room.
    pub fn set_storage(&self, room_id: RoomId, document: impl Into<String>) {
        self.lock().storage.insert(room_id, document.into());
    }

    /// Make every call to `op` fail with `status` until cleared.
    pub fn fail(&self, op: RoomOp, status: u16) {
        self.lock().failures.insert(op, status);
    }

    /// Remove all scripted failures.
    pub fn clear_failures(&self) {
        self.lock().failures.clear();
    }

    /// Access settings currently held for a room.
    pub fn room_config(&self, room_id: &RoomId) -> Option<RoomAccessConfig> {
        self.lock().rooms.get(room_id).cloned()
    }

    /// Every call made so far, in order.
    pub fn calls(&self) -> Vec<RoomCall> {
        self.lock().calls.clone()
    }

    /// Forget recorded calls.
    pub fn clear_calls(&self) {
        self.lock().calls.clear();
    }

    #[allow(clippy::expect_used)]
    fn lock(&self) -> std::sync::MutexGuard<'_, MemoryRoomServiceInner> {
        self.inner.lock().expect("Mutex poisoned")
    }

    /// Record `call` and return the scripted failure for its operation.
    fn record(&self, call: RoomCall) -> Result<(), UpstreamError> {
        let mut inner = self.lock();
        let op = call.op();
        inner.calls.push(call);

        match inner.failures.get(&op) {
            Some(&status) => Err(status_error(status, "scripted failure")),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl RoomService for MemoryRoomService {
    async fn get_room(&self, room_id: &RoomId) -> Result<Option<RoomInfo>, UpstreamError> {
        self.record(RoomCall::GetRoom(room_id.clone()))?;

        Ok(self.lock().rooms.get(room_id).map(|config| RoomInfo {
            id: room_id.to_string(),
            default_accesses: config.default_accesses.clone(),
            groups_accesses: config.groups_accesses.clone(),
        }))
    }

    async fn update_room(
        &self,
        room_id: &RoomId,
        config: &RoomAccessConfig,
    ) -> Result<(), UpstreamError> {
        self.record(RoomCall::UpdateRoom { room_id: room_id.clone(), config: config.clone() })?;

        let mut inner = self.lock();
        match inner.rooms.get_mut(room_id) {
            Some(existing) => {
                *existing = config.clone();
                Ok(())
            },
            None => Err(status_error(404, "room not found")),
        }
    }

    async fn create_room(
        &self,
        room_id: &RoomId,
        config: &RoomAccessConfig,
    ) -> Result<(), UpstreamError> {
        self.record(RoomCall::CreateRoom { room_id: room_id.clone(), config: config.clone() })?;

        let mut inner = self.lock();
        if inner.rooms.contains_key(room_id) {
            return Err(status_error(409, "room already exists"));
        }
        inner.rooms.insert(room_id.clone(), config.clone());
        Ok(())
    }

    async fn fetch_storage(&self, room_id: &RoomId) -> Result<Option<String>, UpstreamError> {
        self.record(RoomCall::FetchStorage(room_id.clone()))?;

        Ok(self.lock().storage.get(room_id).cloned())
    }

    async fn identify_user(
        &self,
        user_id: &str,
        group_ids: &[String],
    ) -> Result<String, UpstreamError> {
        self.record(RoomCall::IdentifyUser {
            user_id: user_id.to_string(),
            group_ids: group_ids.to_vec(),
        })?;

        Ok(format!("token:{user_id}:{}", group_ids.join(",")))
    }
}

fn status_error(status: u16, message: &str) -> UpstreamError {
    let status_text = match status {
        404 => "Not Found",
        409 => "Conflict",
        500 => "Internal Server Error",
        502 => "Bad Gateway",
        503 => "Service Unavailable",
        _ => "Error",
    };

    UpstreamError::Status {
        status,
        status_text: status_text.to_string(),
        body: message.to_string(),
    }
}
