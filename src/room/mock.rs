//! Mock room client for testing without a media server.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;

use crate::device::StreamHandle;
use crate::gate::{self, Gate};
use crate::room::RoomClient;
use crate::{DeviceId, MediaKind, RoomId, SessionError};

/// A room client that records every call.
///
/// Joins succeed immediately unless a failure was queued with
/// [`fail_next_lobby_join`](Self::fail_next_lobby_join) or
/// [`fail_next_room_join`](Self::fail_next_room_join), or the room join is
/// held with [`hold_room_join`](Self::hold_room_join).
///
/// Clones share state.
///
/// # Example
///
/// ```
/// use meet_session::{MediaKind, MockRoomClient};
///
/// let client = MockRoomClient::new();
/// client.fail_next_room_join("room is full");
///
/// assert!(client.producing(MediaKind::Camera).is_none());
/// assert_eq!(client.produce_calls(), 0);
/// ```
#[derive(Clone, Default)]
pub struct MockRoomClient {
    state: Arc<MockRoomState>,
}

#[derive(Default)]
struct MockRoomState {
    lobby_joins: Mutex<Vec<RoomId>>,
    room_joins: Mutex<usize>,
    leaves: Mutex<usize>,
    lobby_failure: Mutex<Option<String>>,
    room_failure: Mutex<Option<String>>,
    room_gate: Mutex<Option<Gate>>,
    producing: Mutex<HashMap<MediaKind, DeviceId>>,
    produce_calls: Mutex<usize>,
    display_names: Mutex<Vec<String>>,
    avatar_urls: Mutex<Vec<String>>,
}

impl MockRoomClient {
    /// Creates a client whose joins always succeed.
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes the next lobby join fail with `reason`.
    pub fn fail_next_lobby_join(&self, reason: impl Into<String>) {
        *self.state.lobby_failure.lock() = Some(reason.into());
    }

    /// Makes the next room join fail with `reason`.
    pub fn fail_next_room_join(&self, reason: impl Into<String>) {
        *self.state.room_failure.lock() = Some(reason.into());
    }

    /// Holds room joins until [`release_room_join`](Self::release_room_join).
    pub fn hold_room_join(&self) {
        *self.state.room_gate.lock() = Some(Gate::closed());
    }

    /// Lets held and future room joins complete.
    pub fn release_room_join(&self) {
        if let Some(gate) = self.state.room_gate.lock().as_ref() {
            gate.open();
        }
    }

    /// Rooms passed to `join_lobby`, in order.
    pub fn lobby_joins(&self) -> Vec<RoomId> {
        self.state.lobby_joins.lock().clone()
    }

    /// Number of `join_room` calls.
    pub fn room_joins(&self) -> usize {
        *self.state.room_joins.lock()
    }

    /// Number of `leave_room` calls.
    pub fn leaves(&self) -> usize {
        *self.state.leaves.lock()
    }

    /// Device currently produced for `kind`.
    pub fn producing(&self, kind: MediaKind) -> Option<DeviceId> {
        self.state.producing.lock().get(&kind).cloned()
    }

    /// Number of `produce` calls so far.
    pub fn produce_calls(&self) -> usize {
        *self.state.produce_calls.lock()
    }

    /// Display names pushed so far, in order.
    pub fn display_names(&self) -> Vec<String> {
        self.state.display_names.lock().clone()
    }

    /// Avatar URLs pushed so far, in order.
    pub fn avatar_urls(&self) -> Vec<String> {
        self.state.avatar_urls.lock().clone()
    }
}

#[async_trait]
impl RoomClient for MockRoomClient {
    async fn join_lobby(&self, room_id: &RoomId) -> Result<(), SessionError> {
        self.state.lobby_joins.lock().push(room_id.clone());
        match self.state.lobby_failure.lock().take() {
            Some(reason) => Err(SessionError::join_failed(room_id.clone(), reason)),
            None => Ok(()),
        }
    }

    async fn join_room(&self) -> Result<(), SessionError> {
        *self.state.room_joins.lock() += 1;

        let waiter = self.state.room_gate.lock().as_ref().map(Gate::waiter);
        if let Some(rx) = waiter {
            gate::pass(rx).await;
        }

        let room_id = self
            .state
            .lobby_joins
            .lock()
            .last()
            .cloned()
            .unwrap_or_else(|| RoomId::new("unknown"));
        match self.state.room_failure.lock().take() {
            Some(reason) => Err(SessionError::join_failed(room_id, reason)),
            None => Ok(()),
        }
    }

    async fn leave_room(&self) -> Result<(), SessionError> {
        *self.state.leaves.lock() += 1;
        self.state.producing.lock().clear();
        Ok(())
    }

    fn produce(&self, stream: &StreamHandle) {
        *self.state.produce_calls.lock() += 1;
        self.state
            .producing
            .lock()
            .insert(stream.kind(), stream.device_id().clone());
    }

    fn stop_producing(&self, kind: MediaKind) {
        self.state.producing.lock().remove(&kind);
    }

    fn set_display_name(&self, name: &str) {
        self.state.display_names.lock().push(name.to_owned());
    }

    fn set_avatar_url(&self, url: &str) {
        self.state.avatar_urls.lock().push(url.to_owned());
    }
}
