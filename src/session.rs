//! Running session and its command handle.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;

use crate::bridge::{Command, Signal};
use crate::device::{DeviceInfo, LocalStream};
use crate::{DeviceId, MediaKind, PreferenceStore, RoomId, RoomPhase, SessionError, SessionSnapshot};

/// Cloneable interface to a running session.
///
/// Every method enqueues a message on the session's single ordered mailbox.
/// Request/reply methods wait for the session loop to answer; signals are
/// fire-and-forget.
///
/// # Example
///
/// ```
/// use meet_session::{MediaKind, MeetSession, MockBackend, MockRoomClient, RoomPhase, Signal};
///
/// # async fn demo() -> Result<(), meet_session::SessionError> {
/// let session = MeetSession::builder()
///     .capture_backend(MockBackend::new())
///     .room_client(MockRoomClient::new())
///     .start()
///     .await?;
/// let handle = session.handle();
///
/// handle.join_lobby("room1").await?;
/// handle.signal(Signal::CamOn).await?;
/// let snapshot = handle
///     .wait_for(|s| s.camera.is_capturing())
///     .await?;
/// assert_eq!(snapshot.phase, RoomPhase::LobbyJoined);
///
/// session.stop().await
/// # }
/// ```
#[derive(Clone)]
pub struct SessionHandle {
    commands: mpsc::Sender<Command>,
    snapshot: watch::Receiver<SessionSnapshot>,
    preferences: PreferenceStore,
}

impl std::fmt::Debug for SessionHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionHandle")
            .field("phase", &self.snapshot.borrow().phase)
            .field("closed", &self.commands.is_closed())
            .finish_non_exhaustive()
    }
}

impl SessionHandle {
    pub(crate) fn new(
        commands: mpsc::Sender<Command>,
        snapshot: watch::Receiver<SessionSnapshot>,
        preferences: PreferenceStore,
    ) -> Self {
        Self {
            commands,
            snapshot,
            preferences,
        }
    }

    async fn send(&self, command: Command) -> Result<(), SessionError> {
        self.commands
            .send(command)
            .await
            .map_err(|_| SessionError::SessionClosed)
    }

    async fn request<T>(
        &self,
        build: impl FnOnce(oneshot::Sender<Result<T, SessionError>>) -> Command,
    ) -> Result<T, SessionError> {
        let (tx, rx) = oneshot::channel();
        self.send(build(tx)).await?;
        rx.await.map_err(|_| SessionError::SessionClosed)?
    }

    /// Queues a signal. Waits only if the mailbox is full.
    pub async fn signal(&self, signal: Signal) -> Result<(), SessionError> {
        self.send(Command::Signal(signal)).await
    }

    /// Queues a signal without waiting, for synchronous event listeners.
    ///
    /// Fails with [`SessionError::MailboxFull`] when the mailbox is at
    /// capacity.
    pub fn try_signal(&self, signal: Signal) -> Result<(), SessionError> {
        self.commands
            .try_send(Command::Signal(signal))
            .map_err(|err| match err {
                mpsc::error::TrySendError::Full(_) => SessionError::MailboxFull,
                mpsc::error::TrySendError::Closed(_) => SessionError::SessionClosed,
            })
    }

    /// Joins the lobby of `room_id` and waits for the SDK to confirm.
    pub async fn join_lobby(&self, room_id: impl Into<RoomId>) -> Result<(), SessionError> {
        let room_id = room_id.into();
        self.request(|respond_to| Command::JoinLobby {
            room_id,
            respond_to,
        })
        .await
    }

    /// Moves from the lobby into the room. Captured streams start producing
    /// without being reopened.
    pub async fn join_room(&self) -> Result<(), SessionError> {
        self.request(|respond_to| Command::JoinRoom { respond_to })
            .await
    }

    /// Leaves the lobby or room and releases every capture.
    pub async fn leave_room(&self) -> Result<(), SessionError> {
        self.request(|respond_to| Command::LeaveRoom { respond_to })
            .await
    }

    /// Returns from `Left` to `Idle` so a new room can be joined.
    pub async fn restart(&self) -> Result<(), SessionError> {
        self.request(|respond_to| Command::Restart { respond_to })
            .await
    }

    /// Selects `device_id` for `kind`, turns `kind` on and waits for the
    /// capture.
    ///
    /// Fails with [`SessionError::CaptureNotAllowed`] outside the lobby and
    /// room, [`SessionError::DeviceUnavailable`] when the device cannot be
    /// opened, and [`SessionError::StaleOperation`] when another device was
    /// chosen before this one finished opening.
    pub async fn fetch_stream(
        &self,
        kind: MediaKind,
        device_id: impl Into<DeviceId>,
    ) -> Result<LocalStream, SessionError> {
        let device_id = device_id.into();
        self.request(|respond_to| Command::FetchStream {
            kind,
            device_id,
            respond_to,
        })
        .await
    }

    /// Turns `kind` off and releases its capture before returning.
    pub async fn stop_stream(&self, kind: MediaKind) -> Result<(), SessionError> {
        self.request(|respond_to| Command::StopStream { kind, respond_to })
            .await
    }

    /// Changes the preferred device for `kind`. Recaptures only if `kind`
    /// is currently on.
    pub async fn switch_device(
        &self,
        kind: MediaKind,
        device_id: impl Into<DeviceId>,
    ) -> Result<(), SessionError> {
        let device_id = device_id.into();
        self.request(|respond_to| Command::SwitchDevice {
            kind,
            device_id,
            respond_to,
        })
        .await
    }

    /// Lists the capture devices of `kind`.
    pub async fn list_devices(&self, kind: MediaKind) -> Result<Vec<DeviceInfo>, SessionError> {
        self.request(|respond_to| Command::ListDevices { kind, respond_to })
            .await
    }

    /// Waits until every message queued before this call has been handled.
    ///
    /// Device opens run in the background, so a flush does not wait for
    /// them; use [`wait_for`](Self::wait_for) for that.
    pub async fn flush(&self) -> Result<RoomPhase, SessionError> {
        let (tx, rx) = oneshot::channel();
        self.send(Command::Flush { respond_to: tx }).await?;
        rx.await.map_err(|_| SessionError::SessionClosed)
    }

    /// The latest published snapshot.
    pub fn snapshot(&self) -> SessionSnapshot {
        self.snapshot.borrow().clone()
    }

    /// The current lifecycle phase.
    pub fn phase(&self) -> RoomPhase {
        self.snapshot.borrow().phase
    }

    /// A receiver that sees every published snapshot.
    pub fn subscribe(&self) -> watch::Receiver<SessionSnapshot> {
        self.snapshot.clone()
    }

    /// Waits until a published snapshot satisfies `predicate` and returns it.
    pub async fn wait_for(
        &self,
        mut predicate: impl FnMut(&SessionSnapshot) -> bool,
    ) -> Result<SessionSnapshot, SessionError> {
        let mut rx = self.snapshot.clone();
        let snapshot = rx
            .wait_for(|s| predicate(s))
            .await
            .map_err(|_| SessionError::SessionClosed)?;
        Ok(snapshot.clone())
    }

    /// The preference store this session reads and writes.
    pub fn preferences(&self) -> &PreferenceStore {
        &self.preferences
    }
}

/// A running session.
///
/// The `Session` is returned by [`MeetSessionBuilder::start()`] and owns the
/// session loop task. Hand out [`SessionHandle`]s to UI code and SDK event
/// listeners; keep the `Session` itself where shutdown is decided.
///
/// # Lifecycle
///
/// 1. Created by [`MeetSessionBuilder::start()`]
/// 2. The loop runs in the background, driven through [`SessionHandle`]s
/// 3. Call [`stop()`](Session::stop) for graceful shutdown
/// 4. Dropping the `Session` also stops the loop (but prefer explicit `stop()`)
///
/// Stopping releases every capture. It does not leave the room; call
/// [`SessionHandle::leave_room`] first if the SDK should be told.
///
/// [`MeetSessionBuilder::start()`]: crate::MeetSessionBuilder::start
pub struct Session {
    running: Arc<AtomicBool>,
    handle: SessionHandle,
    task: Option<JoinHandle<()>>,
}

impl Session {
    pub(crate) fn new(handle: SessionHandle, task: JoinHandle<()>) -> Self {
        Self {
            running: Arc::new(AtomicBool::new(true)),
            handle,
            task: Some(task),
        }
    }

    /// A new handle to this session.
    pub fn handle(&self) -> SessionHandle {
        self.handle.clone()
    }

    /// Returns `true` until the session loop has been asked to stop.
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst) && !self.handle.commands.is_closed()
    }

    /// Gracefully stops the session.
    ///
    /// This will:
    /// 1. Let the loop finish every message queued before the stop
    /// 2. Release both captures
    /// 3. Reject a join still waiting for the SDK
    /// 4. Wait for the loop task to complete
    pub async fn stop(mut self) -> Result<(), SessionError> {
        self.stop_internal().await
    }

    async fn stop_internal(&mut self) -> Result<(), SessionError> {
        if !self.running.swap(false, Ordering::SeqCst) {
            return Ok(());
        }

        let _ = self.handle.commands.send(Command::Stop).await;

        if let Some(task) = self.task.take() {
            if let Err(err) = task.await {
                tracing::error!(error = %err, "session task ended abnormally");
            }
        }

        Ok(())
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        if self.running.swap(false, Ordering::SeqCst) {
            let _ = self.handle.commands.try_send(Command::Stop);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{MeetSession, MockBackend, MockRoomClient};
    use std::time::Duration;

    async fn start() -> (Session, MockBackend) {
        let backend = MockBackend::new();
        let session = MeetSession::builder()
            .capture_backend(backend.clone())
            .room_client(MockRoomClient::new())
            .start()
            .await
            .unwrap();
        (session, backend)
    }

    #[tokio::test]
    async fn test_stop_is_graceful() {
        let (session, _) = start().await;
        let handle = session.handle();
        assert!(session.is_running());

        session.stop().await.unwrap();
        assert!(matches!(
            handle.join_lobby("room1").await,
            Err(SessionError::SessionClosed)
        ));
    }

    #[tokio::test]
    async fn test_stop_releases_captures() {
        let (session, backend) = start().await;
        let handle = session.handle();
        handle.join_lobby("room1").await.unwrap();
        handle.signal(Signal::MicOn).await.unwrap();
        tokio::time::timeout(
            Duration::from_secs(1),
            handle.wait_for(|s| s.microphone.is_capturing()),
        )
        .await
        .unwrap()
        .unwrap();

        session.stop().await.unwrap();
        assert!(backend.live_devices(MediaKind::Microphone).is_empty());
    }

    #[tokio::test]
    async fn test_drop_stops_loop() {
        let (session, backend) = start().await;
        let handle = session.handle();
        handle.join_lobby("room1").await.unwrap();
        handle.signal(Signal::CamOn).await.unwrap();
        tokio::time::timeout(
            Duration::from_secs(1),
            handle.wait_for(|s| s.camera.is_capturing()),
        )
        .await
        .unwrap()
        .unwrap();

        drop(session);
        tokio::time::timeout(
            Duration::from_secs(1),
            handle.wait_for(|s| !s.camera.is_capturing()),
        )
        .await
        .unwrap()
        .ok();
        assert!(backend.live_devices(MediaKind::Camera).is_empty());
    }

    #[tokio::test]
    async fn test_flush_reports_phase() {
        let (session, _) = start().await;
        let handle = session.handle();
        assert_eq!(handle.flush().await.unwrap(), RoomPhase::Idle);
        handle.join_lobby("room1").await.unwrap();
        assert_eq!(handle.flush().await.unwrap(), RoomPhase::LobbyJoined);
        session.stop().await.unwrap();
    }
}
