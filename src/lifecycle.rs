//! Room lifecycle state machine.
//!
//! ```text
//! Idle ─▶ LobbyJoining ─▶ LobbyJoined ─▶ RoomJoining ─▶ RoomJoined ─▶ Left
//!  ▲          │               ▲  │            │              │          │
//!  └──failed──┘               │  └────────────┴──────────────┴──▶ Left  │
//!                             └────failed─────┘              │          │
//!                             └────────dropped───────────────┘          │
//!  ▲                                                                    │
//!  └──────────────────────────────restart───────────────────────────────┘
//! ```
//!
//! Every phase between `LobbyJoining` and `RoomJoined` may leave.
//!
//! Join calls are asynchronous. Each one is tagged with a [`JoinAttempt`];
//! a completion whose attempt no longer matches is stale and rejected.

use crate::{RoomId, SessionError};

/// Where the local participant is in the meeting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum RoomPhase {
    /// Nothing joined yet.
    #[default]
    Idle,
    /// Lobby join requested, waiting for the SDK.
    LobbyJoining,
    /// In the lobby: devices can be previewed but nothing is sent.
    LobbyJoined,
    /// Room join requested, waiting for the SDK.
    RoomJoining,
    /// In the room: captured streams are produced to peers.
    RoomJoined,
    /// Left the meeting. Terminal until [`restart`](Lifecycle::restart).
    Left,
}

impl RoomPhase {
    /// Returns `true` in phases where local devices may be captured.
    #[must_use]
    pub fn allows_capture(self) -> bool {
        matches!(self, Self::LobbyJoined | Self::RoomJoining | Self::RoomJoined)
    }

    /// Returns `true` only when captured streams should be sent to peers.
    #[must_use]
    pub fn allows_production(self) -> bool {
        self == Self::RoomJoined
    }
}

impl std::fmt::Display for RoomPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Idle => "idle",
            Self::LobbyJoining => "joining lobby",
            Self::LobbyJoined => "in lobby",
            Self::RoomJoining => "joining room",
            Self::RoomJoined => "in room",
            Self::Left => "left",
        };
        f.write_str(name)
    }
}

/// Which join call an attempt belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JoinStage {
    /// `join_lobby(room_id)`.
    Lobby,
    /// `join_room()`.
    Room,
}

/// Ticket for one in-flight join call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JoinAttempt {
    /// Lobby or room.
    pub stage: JoinStage,
    /// Monotonic attempt number.
    pub number: u64,
    /// Room being joined.
    pub room_id: RoomId,
}

/// A completed phase change.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Transition {
    /// Phase before.
    pub from: RoomPhase,
    /// Phase after.
    pub to: RoomPhase,
}

/// The lifecycle coordinator's state.
#[derive(Debug, Default)]
pub struct Lifecycle {
    phase: RoomPhase,
    room_id: Option<RoomId>,
    attempt: u64,
}

impl Lifecycle {
    /// Starts in [`RoomPhase::Idle`].
    pub fn new() -> Self {
        Self::default()
    }

    /// Current phase.
    pub fn phase(&self) -> RoomPhase {
        self.phase
    }

    /// Room of the current or last join, cleared by `restart`.
    pub fn room_id(&self) -> Option<&RoomId> {
        self.room_id.as_ref()
    }

    /// `Idle -> LobbyJoining`.
    pub fn begin_lobby_join(&mut self, room_id: RoomId) -> Result<JoinAttempt, SessionError> {
        self.expect(RoomPhase::Idle, "join lobby")?;
        self.room_id = Some(room_id.clone());
        self.move_to(RoomPhase::LobbyJoining);
        Ok(self.next_attempt(JoinStage::Lobby, room_id))
    }

    /// `LobbyJoined -> RoomJoining`, for the room the lobby was joined with.
    pub fn begin_room_join(&mut self) -> Result<JoinAttempt, SessionError> {
        self.expect(RoomPhase::LobbyJoined, "join room")?;
        let room_id = self
            .room_id
            .clone()
            .ok_or(SessionError::InvalidTransition {
                from: self.phase,
                action: "join room",
            })?;
        self.move_to(RoomPhase::RoomJoining);
        Ok(self.next_attempt(JoinStage::Room, room_id))
    }

    /// Applies a successful join completion.
    ///
    /// `LobbyJoining -> LobbyJoined` or `RoomJoining -> RoomJoined`.
    pub fn join_succeeded(&mut self, attempt: &JoinAttempt) -> Result<Transition, SessionError> {
        self.check_current(attempt)?;
        let to = match attempt.stage {
            JoinStage::Lobby => RoomPhase::LobbyJoined,
            JoinStage::Room => RoomPhase::RoomJoined,
        };
        Ok(self.move_to(to))
    }

    /// Applies a failed join completion.
    ///
    /// A failed lobby join returns to `Idle`; a failed room join falls back
    /// to `LobbyJoined` so captured previews survive.
    pub fn join_failed(&mut self, attempt: &JoinAttempt) -> Result<Transition, SessionError> {
        self.check_current(attempt)?;
        let to = match attempt.stage {
            JoinStage::Lobby => {
                self.room_id = None;
                RoomPhase::Idle
            }
            JoinStage::Room => RoomPhase::LobbyJoined,
        };
        Ok(self.move_to(to))
    }

    /// The SDK lost the room without a self-leave: `RoomJoined -> LobbyJoined`.
    pub fn room_dropped(&mut self) -> Result<Transition, SessionError> {
        self.expect(RoomPhase::RoomJoined, "drop room connection")?;
        Ok(self.move_to(RoomPhase::LobbyJoined))
    }

    /// Any joining or joined phase `-> Left`. An in-flight join becomes
    /// stale.
    pub fn leave(&mut self) -> Result<Transition, SessionError> {
        match self.phase {
            RoomPhase::LobbyJoining
            | RoomPhase::LobbyJoined
            | RoomPhase::RoomJoining
            | RoomPhase::RoomJoined => Ok(self.move_to(RoomPhase::Left)),
            from => Err(SessionError::InvalidTransition {
                from,
                action: "leave",
            }),
        }
    }

    /// `Left -> Idle`, forgetting the old room.
    pub fn restart(&mut self) -> Result<Transition, SessionError> {
        self.expect(RoomPhase::Left, "restart")?;
        self.room_id = None;
        Ok(self.move_to(RoomPhase::Idle))
    }

    fn expect(&self, phase: RoomPhase, action: &'static str) -> Result<(), SessionError> {
        if self.phase == phase {
            Ok(())
        } else {
            Err(SessionError::InvalidTransition {
                from: self.phase,
                action,
            })
        }
    }

    fn check_current(&self, attempt: &JoinAttempt) -> Result<(), SessionError> {
        let joining = match attempt.stage {
            JoinStage::Lobby => RoomPhase::LobbyJoining,
            JoinStage::Room => RoomPhase::RoomJoining,
        };
        if attempt.number != self.attempt || self.phase != joining {
            return Err(SessionError::stale(format!(
                "{:?} join #{} for {}",
                attempt.stage, attempt.number, attempt.room_id
            )));
        }
        Ok(())
    }

    fn next_attempt(&mut self, stage: JoinStage, room_id: RoomId) -> JoinAttempt {
        self.attempt += 1;
        JoinAttempt {
            stage,
            number: self.attempt,
            room_id,
        }
    }

    fn move_to(&mut self, to: RoomPhase) -> Transition {
        let from = std::mem::replace(&mut self.phase, to);
        Transition { from, to }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn in_lobby() -> Lifecycle {
        let mut lifecycle = Lifecycle::new();
        let attempt = lifecycle.begin_lobby_join(RoomId::new("room1")).unwrap();
        lifecycle.join_succeeded(&attempt).unwrap();
        lifecycle
    }

    fn in_room() -> Lifecycle {
        let mut lifecycle = in_lobby();
        let attempt = lifecycle.begin_room_join().unwrap();
        lifecycle.join_succeeded(&attempt).unwrap();
        lifecycle
    }

    #[test]
    fn test_full_happy_path() {
        let mut lifecycle = Lifecycle::new();
        assert_eq!(lifecycle.phase(), RoomPhase::Idle);

        let lobby = lifecycle.begin_lobby_join(RoomId::new("room1")).unwrap();
        assert_eq!(lifecycle.phase(), RoomPhase::LobbyJoining);

        let t = lifecycle.join_succeeded(&lobby).unwrap();
        assert_eq!(t.to, RoomPhase::LobbyJoined);

        let room = lifecycle.begin_room_join().unwrap();
        assert_eq!(room.room_id.as_str(), "room1");
        assert_eq!(lifecycle.phase(), RoomPhase::RoomJoining);

        lifecycle.join_succeeded(&room).unwrap();
        assert_eq!(lifecycle.phase(), RoomPhase::RoomJoined);

        let t = lifecycle.leave().unwrap();
        assert_eq!(t.from, RoomPhase::RoomJoined);
        assert_eq!(lifecycle.phase(), RoomPhase::Left);
    }

    #[test]
    fn test_room_join_requires_lobby() {
        let mut lifecycle = Lifecycle::new();
        let result = lifecycle.begin_room_join();
        assert!(matches!(
            result,
            Err(SessionError::InvalidTransition {
                from: RoomPhase::Idle,
                ..
            })
        ));
        assert_eq!(lifecycle.phase(), RoomPhase::Idle);
    }

    #[test]
    fn test_leave_from_lobby() {
        let mut lifecycle = in_lobby();
        lifecycle.leave().unwrap();
        assert_eq!(lifecycle.phase(), RoomPhase::Left);
    }

    #[test]
    fn test_leave_while_joining_makes_join_stale() {
        let mut lifecycle = in_lobby();
        let attempt = lifecycle.begin_room_join().unwrap();
        lifecycle.leave().unwrap();

        assert!(lifecycle.join_succeeded(&attempt).unwrap_err().is_stale());
        assert_eq!(lifecycle.phase(), RoomPhase::Left);
    }

    #[test]
    fn test_leave_rejected_when_idle() {
        let mut lifecycle = Lifecycle::new();
        assert!(matches!(
            lifecycle.leave(),
            Err(SessionError::InvalidTransition {
                from: RoomPhase::Idle,
                action: "leave",
            })
        ));
    }

    #[test]
    fn test_room_join_failure_falls_back_to_lobby() {
        let mut lifecycle = in_lobby();
        let attempt = lifecycle.begin_room_join().unwrap();
        let t = lifecycle.join_failed(&attempt).unwrap();
        assert_eq!(t.to, RoomPhase::LobbyJoined);
        assert_eq!(lifecycle.room_id().map(RoomId::as_str), Some("room1"));
    }

    #[test]
    fn test_lobby_join_failure_returns_to_idle() {
        let mut lifecycle = Lifecycle::new();
        let attempt = lifecycle.begin_lobby_join(RoomId::new("room1")).unwrap();
        lifecycle.join_failed(&attempt).unwrap();
        assert_eq!(lifecycle.phase(), RoomPhase::Idle);
        assert!(lifecycle.room_id().is_none());
    }

    #[test]
    fn test_stale_join_completion_rejected() {
        let mut lifecycle = Lifecycle::new();
        let first = lifecycle.begin_lobby_join(RoomId::new("room1")).unwrap();
        lifecycle.join_failed(&first).unwrap();
        let second = lifecycle.begin_lobby_join(RoomId::new("room2")).unwrap();

        let result = lifecycle.join_succeeded(&first);
        assert!(matches!(result, Err(SessionError::StaleOperation { .. })));
        assert_eq!(lifecycle.phase(), RoomPhase::LobbyJoining);

        lifecycle.join_succeeded(&second).unwrap();
        assert_eq!(lifecycle.room_id().map(RoomId::as_str), Some("room2"));
    }

    #[test]
    fn test_left_is_terminal_until_restart() {
        let mut lifecycle = in_room();
        lifecycle.leave().unwrap();

        assert!(lifecycle.begin_lobby_join(RoomId::new("room1")).is_err());
        assert!(lifecycle.leave().is_err());

        lifecycle.restart().unwrap();
        assert_eq!(lifecycle.phase(), RoomPhase::Idle);
        assert!(lifecycle.room_id().is_none());
        lifecycle.begin_lobby_join(RoomId::new("room2")).unwrap();
    }

    #[test]
    fn test_room_dropped_returns_to_lobby() {
        let mut lifecycle = in_room();
        let t = lifecycle.room_dropped().unwrap();
        assert_eq!(t.from, RoomPhase::RoomJoined);
        assert_eq!(t.to, RoomPhase::LobbyJoined);
        assert!(in_lobby().room_dropped().is_err());
    }

    #[test]
    fn test_phase_permissions() {
        assert!(!RoomPhase::Idle.allows_capture());
        assert!(!RoomPhase::LobbyJoining.allows_capture());
        assert!(RoomPhase::LobbyJoined.allows_capture());
        assert!(RoomPhase::RoomJoining.allows_capture());
        assert!(RoomPhase::RoomJoined.allows_capture());
        assert!(!RoomPhase::Left.allows_capture());

        assert!(RoomPhase::RoomJoined.allows_production());
        assert!(!RoomPhase::RoomJoining.allows_production());
    }
}
