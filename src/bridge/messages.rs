//! Messages processed by the session loop.

use tokio::sync::oneshot;

use crate::device::controller::{FetchCompletion, StreamReply};
use crate::device::DeviceInfo;
use crate::lifecycle::JoinAttempt;
use crate::room::PeerView;
use crate::{DeviceId, MediaKind, PeerId, RoomId, RoomPhase, SessionError};

/// A named session signal, from this UI or pushed by the SDK.
///
/// # Example
///
/// ```
/// use meet_session::Signal;
///
/// assert_eq!(Signal::from_name("cam-on"), Some(Signal::CamOn));
/// assert_eq!(Signal::from_name("app:mic-off"), Some(Signal::MicOff));
/// assert_eq!(Signal::from_name("room:me-left"), Some(Signal::SelfLeft));
/// assert_eq!(Signal::from_name("bogus"), None);
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Signal {
    /// Turn the camera on with the preferred device.
    CamOn,
    /// Turn the camera off and release it.
    CamOff,
    /// Unmute with the preferred microphone.
    MicOn,
    /// Mute and release the microphone.
    MicOff,
    /// A remote participant appeared.
    PeerJoined(PeerView),
    /// A remote participant changed name, avatar or tracks.
    PeerUpdated(PeerView),
    /// A remote participant left.
    PeerLeft(PeerId),
    /// The local participant left the room.
    SelfLeft,
    /// The SDK lost the room connection without a self-leave.
    RoomDropped,
}

impl Signal {
    /// Parses the payload-free signals by name.
    ///
    /// Accepts the bare names (`cam-on`, `mic-off`, `self-left`,
    /// `room-dropped`) and the namespaced forms fired by the SDK and the
    /// page (`app:cam-on`, `room:me-left`).
    pub fn from_name(name: &str) -> Option<Self> {
        let bare = name
            .strip_prefix("app:")
            .or_else(|| name.strip_prefix("room:"))
            .unwrap_or(name);
        match bare {
            "cam-on" => Some(Self::CamOn),
            "cam-off" => Some(Self::CamOff),
            "mic-on" => Some(Self::MicOn),
            "mic-off" => Some(Self::MicOff),
            "self-left" | "me-left" => Some(Self::SelfLeft),
            "room-dropped" => Some(Self::RoomDropped),
            _ => None,
        }
    }

    /// Short name for logging.
    pub fn name(&self) -> &'static str {
        match self {
            Self::CamOn => "cam-on",
            Self::CamOff => "cam-off",
            Self::MicOn => "mic-on",
            Self::MicOff => "mic-off",
            Self::PeerJoined(_) => "peer-joined",
            Self::PeerUpdated(_) => "peer-updated",
            Self::PeerLeft(_) => "peer-left",
            Self::SelfLeft => "self-left",
            Self::RoomDropped => "room-dropped",
        }
    }
}

impl std::fmt::Display for Signal {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

pub(crate) type Reply<T> = oneshot::Sender<Result<T, SessionError>>;

/// Requests from [`SessionHandle`](crate::SessionHandle).
pub(crate) enum Command {
    Signal(Signal),
    JoinLobby {
        room_id: RoomId,
        respond_to: Reply<()>,
    },
    JoinRoom {
        respond_to: Reply<()>,
    },
    LeaveRoom {
        respond_to: Reply<()>,
    },
    Restart {
        respond_to: Reply<()>,
    },
    FetchStream {
        kind: MediaKind,
        device_id: DeviceId,
        respond_to: StreamReply,
    },
    StopStream {
        kind: MediaKind,
        respond_to: Reply<()>,
    },
    SwitchDevice {
        kind: MediaKind,
        device_id: DeviceId,
        respond_to: Reply<()>,
    },
    ListDevices {
        kind: MediaKind,
        respond_to: Reply<Vec<DeviceInfo>>,
    },
    /// Answered once every message queued before it has been handled.
    Flush {
        respond_to: oneshot::Sender<RoomPhase>,
    },
    Stop,
}

/// Results of spawned work, posted back to the loop.
#[derive(Debug)]
pub(crate) enum Completion {
    Fetch(FetchCompletion),
    Join {
        attempt: JoinAttempt,
        result: Result<(), SessionError>,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_name_accepts_namespaced_forms() {
        assert_eq!(Signal::from_name("app:cam-on"), Some(Signal::CamOn));
        assert_eq!(Signal::from_name("app:cam-off"), Some(Signal::CamOff));
        assert_eq!(Signal::from_name("mic-on"), Some(Signal::MicOn));
        assert_eq!(Signal::from_name("room:me-left"), Some(Signal::SelfLeft));
        assert_eq!(Signal::from_name("self-left"), Some(Signal::SelfLeft));
        assert_eq!(Signal::from_name("room-dropped"), Some(Signal::RoomDropped));
        assert_eq!(Signal::from_name("app:peer-left"), None);
    }

    #[test]
    fn test_signal_display() {
        assert_eq!(Signal::PeerLeft(PeerId::new("p1")).to_string(), "peer-left");
        assert_eq!(Signal::CamOn.to_string(), "cam-on");
    }
}
