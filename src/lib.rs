//! # meet-session
//!
//! **Note:** This crate is under active development. The API may change before 1.0.
//!
//! Local media and session state for real-time meeting clients.
//!
//! `meet-session` keeps four things consistent with each other: what the
//! user wants (mic muted, camera off, which devices), the preferences that
//! outlive a single view, the signals fired by the UI and the real-time
//! SDK, and the camera and microphone captures actually held open. It also
//! drives the room lifecycle (idle, lobby, room, left) and decides when
//! captures are only previewed and when they are produced to peers.
//!
//! Media transport, signaling and SFU negotiation stay in the SDK, which
//! plugs in through [`RoomClient`]. Device access plugs in through
//! [`CaptureBackend`].
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use meet_session::{MeetSession, MockBackend, MockRoomClient, Signal};
//!
//! # async fn demo() -> Result<(), meet_session::SessionError> {
//! let session = MeetSession::builder()
//!     .capture_backend(MockBackend::new())
//!     .room_client(MockRoomClient::new())
//!     .on_event(|e| tracing::info!(?e, "session event"))
//!     .start()
//!     .await?;
//! let handle = session.handle();
//!
//! handle.join_lobby("room1").await?;   // preview only
//! handle.signal(Signal::CamOn).await?;
//! handle.join_room().await?;           // the same capture is now produced
//!
//! // Wire SDK listeners to the same mailbox
//! if let Some(signal) = Signal::from_name("room:me-left") {
//!     handle.try_signal(signal)?;
//! }
//!
//! session.stop().await?;
//! # Ok(())
//! # }
//! ```
//!
//! ## Architecture
//!
//! - **Session loop**: one task owns the lifecycle, the device controller
//!   and the peer roster, handling one message at a time
//! - **Spawned work**: device opens and join calls run on their own tasks
//!   and post completions back; stale completions are released
//! - **Snapshots**: after every message the loop publishes a
//!   [`SessionSnapshot`] on a watch channel for the UI

#![warn(missing_docs)]
// unwrap/expect allowed in tests only
#![cfg_attr(test, allow(clippy::unwrap_used, clippy::expect_used))]
// These doc lints are too strict for internal implementation details
#![allow(clippy::missing_panics_doc, clippy::missing_errors_doc)]

mod bridge;
mod builder;
mod config;
mod device;
mod error;
mod event;
mod gate;
mod id;
mod lifecycle;
mod preferences;
mod room;
mod session;
mod snapshot;

pub use bridge::Signal;
pub use builder::{MeetSession, MeetSessionBuilder};
pub use config::SessionConfig;
pub use device::{
    CaptureBackend, CaptureTrack, DeviceInfo, LocalStream, MediaKind, MockBackend,
    ProductionLink, StreamHandle,
};
pub use error::SessionError;
pub use event::{event_callback, EventCallback, SessionEvent};
pub use id::{DeviceId, PeerId, RoomId, TrackId};
pub use lifecycle::{JoinAttempt, JoinStage, Lifecycle, RoomPhase, Transition};
pub use preferences::{PreferenceState, PreferenceStore};
pub use room::{MockRoomClient, PeerRoster, PeerView, RoomClient};
pub use session::{Session, SessionHandle};
pub use snapshot::{KindSnapshot, SessionSnapshot};
