//! Notifications emitted while the session runs.
//!
//! Events describe what the engine did: streams started and stopped,
//! production toggled, phase changes, recoverable failures. They are for
//! UI feedback and logging; the authoritative state is always the
//! [`SessionSnapshot`](crate::SessionSnapshot).

use std::sync::Arc;

use crate::{DeviceId, MediaKind, PeerId, RoomId, RoomPhase};

/// Events emitted by a running session.
///
/// # Example
///
/// ```
/// use meet_session::SessionEvent;
///
/// fn handle_event(event: SessionEvent) {
///     match event {
///         SessionEvent::PhaseChanged { from, to } => {
///             println!("phase: {from} -> {to}");
///         }
///         SessionEvent::DeviceFailed { kind, device_id, reason } => {
///             eprintln!("{kind} {device_id} failed: {reason}");
///         }
///         SessionEvent::NavigateAway { .. } => {
///             println!("leaving the meeting page");
///         }
///         other => println!("{other:?}"),
///     }
/// }
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    /// The lifecycle moved to a new phase.
    PhaseChanged {
        /// Phase before.
        from: RoomPhase,
        /// Phase after.
        to: RoomPhase,
    },

    /// A local capture started.
    StreamStarted {
        /// Camera or microphone.
        kind: MediaKind,
        /// Captured device.
        device_id: DeviceId,
    },

    /// A local capture was released.
    StreamStopped {
        /// Camera or microphone.
        kind: MediaKind,
        /// Released device.
        device_id: DeviceId,
    },

    /// A local stream is now sent to peers.
    ProducingStarted {
        /// Camera or microphone.
        kind: MediaKind,
        /// Produced device.
        device_id: DeviceId,
    },

    /// A local stream is no longer sent to peers.
    ProducingStopped {
        /// Camera or microphone.
        kind: MediaKind,
    },

    /// Opening a device failed. The control stays inactive until the user
    /// tries again.
    DeviceFailed {
        /// Camera or microphone.
        kind: MediaKind,
        /// Device that failed.
        device_id: DeviceId,
        /// Reason reported by the backend.
        reason: String,
    },

    /// Joining the lobby or room failed.
    JoinFailed {
        /// Room being joined.
        room_id: RoomId,
        /// Reason reported by the SDK.
        reason: String,
    },

    /// A remote participant left.
    PeerLeft {
        /// The peer that left.
        peer_id: PeerId,
    },

    /// The local participant left; the host should navigate away.
    NavigateAway {
        /// Room that was left.
        room_id: Option<RoomId>,
    },
}

/// Callback type for receiving session events.
///
/// Register with [`MeetSessionBuilder::on_event()`].
///
/// [`MeetSessionBuilder::on_event()`]: crate::MeetSessionBuilder::on_event
pub type EventCallback = Arc<dyn Fn(SessionEvent) + Send + Sync>;

/// Creates an [`EventCallback`] from a closure.
///
/// ```
/// use meet_session::{event_callback, SessionEvent};
///
/// let callback = event_callback(|event| {
///     println!("Got event: {:?}", event);
/// });
/// ```
pub fn event_callback<F>(f: F) -> EventCallback
where
    F: Fn(SessionEvent) + Send + Sync + 'static,
{
    Arc::new(f)
}

/// Delivers events to the optional callback.
#[derive(Clone, Default)]
pub(crate) struct EventEmitter {
    callback: Option<EventCallback>,
}

impl EventEmitter {
    pub(crate) fn new(callback: Option<EventCallback>) -> Self {
        Self { callback }
    }

    pub(crate) fn emit(&self, event: SessionEvent) {
        if let Some(ref callback) = self.callback {
            callback(event);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;

    #[test]
    fn test_session_event_debug() {
        let event = SessionEvent::ProducingStopped {
            kind: MediaKind::Camera,
        };
        let debug = format!("{event:?}");
        assert!(debug.contains("ProducingStopped"));
        assert!(debug.contains("Camera"));
    }

    #[test]
    fn test_emitter_without_callback_is_noop() {
        let emitter = EventEmitter::default();
        emitter.emit(SessionEvent::PeerLeft {
            peer_id: PeerId::new("p1"),
        });
    }

    #[test]
    fn test_emitter_delivers_events() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        let emitter = EventEmitter::new(Some(event_callback(move |e| sink.lock().push(e))));

        emitter.emit(SessionEvent::PhaseChanged {
            from: RoomPhase::Idle,
            to: RoomPhase::LobbyJoining,
        });

        assert_eq!(
            seen.lock().as_slice(),
            &[SessionEvent::PhaseChanged {
                from: RoomPhase::Idle,
                to: RoomPhase::LobbyJoining,
            }]
        );
    }
}
