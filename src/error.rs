//! Error types for meet-session.
//!
//! Errors fall into two groups:
//! - **Recoverable** ([`DeviceUnavailable`], [`JoinFailed`]): the session
//!   keeps running; the user retries by clicking the control again
//! - **Discarded** ([`StaleOperation`], [`InvalidTransition`]): logged by the
//!   session loop and returned to direct callers, never fatal
//!
//! [`DeviceUnavailable`]: SessionError::DeviceUnavailable
//! [`JoinFailed`]: SessionError::JoinFailed
//! [`StaleOperation`]: SessionError::StaleOperation
//! [`InvalidTransition`]: SessionError::InvalidTransition

use crate::{DeviceId, MediaKind, RoomId, RoomPhase};

/// Errors produced by the session engine and its collaborators.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SessionError {
    /// A capture device could not be opened.
    #[error("{kind} device unavailable: {device_id} - {reason}")]
    DeviceUnavailable {
        /// Camera or microphone.
        kind: MediaKind,
        /// Device that failed to open.
        device_id: DeviceId,
        /// Why the device could not be opened (permission, removed, busy).
        reason: String,
    },

    /// An async operation finished after the state it was started for
    /// changed. Its result was thrown away.
    #[error("stale {operation} discarded")]
    StaleOperation {
        /// What was discarded, e.g. "camera fetch for camA".
        operation: String,
    },

    /// The lifecycle was asked to do something its current phase forbids.
    #[error("cannot {action} while {from}")]
    InvalidTransition {
        /// Phase the session was in.
        from: RoomPhase,
        /// The requested action.
        action: &'static str,
    },

    /// The SDK reported that joining the lobby or the room failed.
    #[error("failed to join {room_id}: {reason}")]
    JoinFailed {
        /// Room being joined.
        room_id: RoomId,
        /// Reason reported by the SDK.
        reason: String,
    },

    /// A capture was explicitly requested in a phase that has no preview.
    #[error("cannot capture {kind} while {phase}")]
    CaptureNotAllowed {
        /// Camera or microphone.
        kind: MediaKind,
        /// Current phase.
        phase: RoomPhase,
    },

    /// No capture backend was given to the builder.
    #[error("no capture backend configured - call capture_backend() before start()")]
    NoCaptureBackend,

    /// No room client was given to the builder.
    #[error("no room client configured - call room_client() before start()")]
    NoRoomClient,

    /// The session configuration is unusable.
    #[error("invalid session config: {reason}")]
    InvalidConfig {
        /// What is wrong with it.
        reason: String,
    },

    /// The session mailbox is full; only returned by non-waiting sends.
    #[error("session mailbox full")]
    MailboxFull,

    /// The session task has stopped.
    #[error("session closed")]
    SessionClosed,
}

impl SessionError {
    /// Creates a device unavailable error.
    pub fn device_unavailable(
        kind: MediaKind,
        device_id: impl Into<DeviceId>,
        reason: impl Into<String>,
    ) -> Self {
        Self::DeviceUnavailable {
            kind,
            device_id: device_id.into(),
            reason: reason.into(),
        }
    }

    /// Creates a join failed error.
    pub fn join_failed(room_id: impl Into<RoomId>, reason: impl Into<String>) -> Self {
        Self::JoinFailed {
            room_id: room_id.into(),
            reason: reason.into(),
        }
    }

    /// Creates a stale operation error.
    pub fn stale(operation: impl Into<String>) -> Self {
        Self::StaleOperation {
            operation: operation.into(),
        }
    }

    /// Returns `true` for errors the session loop drops silently.
    pub fn is_stale(&self) -> bool {
        matches!(self, Self::StaleOperation { .. })
    }
}
