//! Observable session state for UI code.

use crate::device::{LocalStream, ProductionLink};
use crate::room::PeerView;
use crate::{DeviceId, MediaKind, RoomId, RoomPhase};

/// Local media state of one kind.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct KindSnapshot {
    /// The live capture, if any.
    pub stream: Option<LocalStream>,
    /// Set while the capture is being sent to peers.
    pub production: Option<ProductionLink>,
    /// Device currently being opened.
    pub pending: Option<DeviceId>,
    /// Device whose last open failed, until the user retries.
    pub failed: Option<DeviceId>,
}

impl KindSnapshot {
    /// Returns `true` while a capture is live.
    pub fn is_capturing(&self) -> bool {
        self.stream.is_some()
    }

    /// Returns `true` while the capture is sent to peers.
    pub fn is_producing(&self) -> bool {
        self.production.is_some()
    }

    /// Device of the live capture.
    pub fn device_id(&self) -> Option<&DeviceId> {
        self.stream.as_ref().map(|s| &s.device_id)
    }

    /// Returns `true` when no open is in flight.
    pub fn is_settled(&self) -> bool {
        self.pending.is_none()
    }
}

/// Everything the UI needs to render the local side of the meeting.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionSnapshot {
    /// Current lifecycle phase.
    pub phase: RoomPhase,
    /// Room of the current or last join.
    pub room_id: Option<RoomId>,
    /// Camera state.
    pub camera: KindSnapshot,
    /// Microphone state.
    pub microphone: KindSnapshot,
    /// Remote participants in peer id order.
    pub peers: Vec<PeerView>,
}

impl SessionSnapshot {
    /// State of `kind`.
    pub fn kind(&self, kind: MediaKind) -> &KindSnapshot {
        match kind {
            MediaKind::Camera => &self.camera,
            MediaKind::Microphone => &self.microphone,
        }
    }

    /// Returns `true` when no device open is in flight for either kind.
    pub fn is_settled(&self) -> bool {
        self.camera.is_settled() && self.microphone.is_settled()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_snapshot_is_idle_and_empty() {
        let snapshot = SessionSnapshot::default();
        assert_eq!(snapshot.phase, RoomPhase::Idle);
        assert!(!snapshot.camera.is_capturing());
        assert!(!snapshot.microphone.is_producing());
        assert!(snapshot.is_settled());
    }

    #[test]
    fn test_kind_accessor() {
        let snapshot = SessionSnapshot {
            camera: KindSnapshot {
                pending: Some(DeviceId::new("camA")),
                ..Default::default()
            },
            ..Default::default()
        };
        assert!(!snapshot.kind(MediaKind::Camera).is_settled());
        assert!(snapshot.kind(MediaKind::Microphone).is_settled());
        assert!(!snapshot.is_settled());
    }
}
