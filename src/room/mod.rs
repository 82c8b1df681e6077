//! The real-time SDK seen from the session engine.
//!
//! Everything that talks to the media server (signaling, SFU negotiation,
//! transport) lives behind [`RoomClient`]. The engine decides *when* to
//! join, leave, produce and stop producing; the client decides *how*.

mod mock;
mod peer;

pub use mock::MockRoomClient;
pub use peer::{PeerRoster, PeerView};

use async_trait::async_trait;

use crate::device::StreamHandle;
use crate::{MediaKind, RoomId, SessionError};

/// Room operations provided by the real-time SDK.
///
/// Join and leave calls are awaited on background tasks, so they may finish
/// in any order relative to other session messages. `produce` and
/// `stop_producing` are called from inside the session loop and must not
/// block, and so are the identity setters.
///
/// # Example
///
/// ```
/// use async_trait::async_trait;
/// use meet_session::{MediaKind, RoomClient, RoomId, SessionError, StreamHandle};
///
/// struct LoggingClient;
///
/// #[async_trait]
/// impl RoomClient for LoggingClient {
///     async fn join_lobby(&self, room_id: &RoomId) -> Result<(), SessionError> {
///         println!("joining lobby {room_id}");
///         Ok(())
///     }
///
///     async fn join_room(&self) -> Result<(), SessionError> {
///         Ok(())
///     }
///
///     async fn leave_room(&self) -> Result<(), SessionError> {
///         Ok(())
///     }
///
///     fn produce(&self, stream: &StreamHandle) {
///         println!("producing {} from {}", stream.kind(), stream.device_id());
///     }
///
///     fn stop_producing(&self, kind: MediaKind) {
///         println!("stopped producing {kind}");
///     }
/// }
/// ```
#[async_trait]
pub trait RoomClient: Send + Sync {
    /// Joins the lobby of `room_id`.
    async fn join_lobby(&self, room_id: &RoomId) -> Result<(), SessionError>;

    /// Moves from the lobby into the room.
    async fn join_room(&self) -> Result<(), SessionError>;

    /// Leaves the room or lobby.
    async fn leave_room(&self) -> Result<(), SessionError>;

    /// Starts sending `stream` to peers.
    fn produce(&self, stream: &StreamHandle);

    /// Stops sending the local stream of `kind` to peers.
    fn stop_producing(&self, kind: MediaKind);

    /// Sets the name other participants see. Called once the lobby is
    /// joined and again whenever the preference changes.
    fn set_display_name(&self, _name: &str) {}

    /// Sets the avatar other participants see while the camera is off.
    fn set_avatar_url(&self, _url: &str) {}
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn test_room_client_is_send_sync() {
        fn assert_send_sync<T: Send + Sync + ?Sized>() {}
        assert_send_sync::<Arc<dyn RoomClient>>();
    }
}
