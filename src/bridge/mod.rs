//! Session event bridge.
//!
//! One task owns the lifecycle, the device controller and the peer roster.
//! Signals, commands, completions of spawned work and preference changes
//! all arrive through its `select!` loop and are handled one at a time in
//! arrival order. After each message the loop reconciles both device slots
//! against the preferences and the phase, then publishes a fresh
//! [`SessionSnapshot`].

mod messages;

pub use messages::Signal;
pub(crate) use messages::{Command, Completion, Reply};

use std::sync::Arc;

use tokio::sync::{mpsc, watch};

use crate::device::controller::{DeviceStreamController, StreamReply};
use crate::device::CaptureBackend;
use crate::event::EventEmitter;
use crate::lifecycle::{JoinAttempt, JoinStage, Lifecycle, Transition};
use crate::room::{PeerRoster, RoomClient};
use crate::{
    DeviceId, MediaKind, PreferenceStore, RoomId, RoomPhase, SessionError, SessionEvent,
    SessionSnapshot,
};

/// Collaborators handed to the actor by the builder.
pub(crate) struct ActorParts {
    pub backend: Arc<dyn CaptureBackend>,
    pub client: Arc<dyn RoomClient>,
    pub preferences: PreferenceStore,
    pub events: EventEmitter,
    pub snapshot: watch::Sender<SessionSnapshot>,
}

pub(crate) struct SessionActor {
    preferences: PreferenceStore,
    controller: DeviceStreamController,
    lifecycle: Lifecycle,
    roster: PeerRoster,
    backend: Arc<dyn CaptureBackend>,
    client: Arc<dyn RoomClient>,
    completions: mpsc::Sender<Completion>,
    events: EventEmitter,
    snapshot: watch::Sender<SessionSnapshot>,
    pending_join: Option<Reply<()>>,
    /// Identity last pushed to the client while joined.
    pushed_name: Option<String>,
    pushed_avatar: Option<String>,
}

impl SessionActor {
    pub(crate) fn new(parts: ActorParts, completions: mpsc::Sender<Completion>) -> Self {
        let ActorParts {
            backend,
            client,
            preferences,
            events,
            snapshot,
        } = parts;
        let controller = DeviceStreamController::new(
            Arc::clone(&backend),
            Arc::clone(&client),
            completions.clone(),
            events.clone(),
        );
        Self {
            preferences,
            controller,
            lifecycle: Lifecycle::new(),
            roster: PeerRoster::new(),
            backend,
            client,
            completions,
            events,
            snapshot,
            pending_join: None,
            pushed_name: None,
            pushed_avatar: None,
        }
    }

    /// Runs until [`Command::Stop`] or until every handle is dropped.
    pub(crate) async fn run(
        mut self,
        mut commands: mpsc::Receiver<Command>,
        mut completions: mpsc::Receiver<Completion>,
    ) {
        let mut preferences = self.preferences.subscribe();
        tracing::info!(backend = self.backend.name(), "session started");
        self.reconcile();

        loop {
            tokio::select! {
                command = commands.recv() => match command {
                    Some(Command::Stop) | None => break,
                    Some(command) => self.handle_command(command),
                },
                Some(completion) = completions.recv() => {
                    self.handle_completion(completion);
                }
                Ok(()) = preferences.changed() => {
                    tracing::trace!("preferences changed");
                }
            }
            self.reconcile();
        }

        self.shutdown();
    }

    fn handle_command(&mut self, command: Command) {
        match command {
            Command::Signal(signal) => self.handle_signal(signal),
            Command::JoinLobby {
                room_id,
                respond_to,
            } => self.join_lobby(room_id, respond_to),
            Command::JoinRoom { respond_to } => self.join_room(respond_to),
            Command::LeaveRoom { respond_to } => {
                let result = self.leave_room();
                let _ = respond_to.send(result);
            }
            Command::Restart { respond_to } => {
                let result = self.restart();
                let _ = respond_to.send(result);
            }
            Command::FetchStream {
                kind,
                device_id,
                respond_to,
            } => self.fetch_stream(kind, device_id, respond_to),
            Command::StopStream { kind, respond_to } => {
                self.stop_stream(kind);
                let _ = respond_to.send(Ok(()));
            }
            Command::SwitchDevice {
                kind,
                device_id,
                respond_to,
            } => {
                self.switch_device(kind, device_id);
                let _ = respond_to.send(Ok(()));
            }
            Command::ListDevices { kind, respond_to } => {
                let backend = Arc::clone(&self.backend);
                tokio::spawn(async move {
                    let _ = respond_to.send(backend.list_devices(kind).await);
                });
            }
            Command::Flush { respond_to } => {
                let _ = respond_to.send(self.lifecycle.phase());
            }
            Command::Stop => {}
        }
    }

    fn handle_signal(&mut self, signal: Signal) {
        tracing::debug!(%signal, phase = %self.lifecycle.phase(), "signal");
        match signal {
            Signal::CamOn => self.activate(MediaKind::Camera),
            Signal::CamOff => self.deactivate(MediaKind::Camera),
            Signal::MicOn => self.activate(MediaKind::Microphone),
            Signal::MicOff => self.deactivate(MediaKind::Microphone),
            Signal::PeerJoined(peer) | Signal::PeerUpdated(peer) => self.roster.upsert(peer),
            Signal::PeerLeft(peer_id) => {
                if self.roster.remove(&peer_id).is_some() {
                    self.events.emit(SessionEvent::PeerLeft { peer_id });
                } else {
                    tracing::debug!(peer = %peer_id, "unknown peer left");
                }
            }
            Signal::SelfLeft => match self.lifecycle.leave() {
                Ok(transition) => self.after_leave(transition),
                Err(err) => tracing::debug!(error = %err, "ignoring self-left"),
            },
            Signal::RoomDropped => match self.lifecycle.room_dropped() {
                Ok(transition) => self.on_transition(transition),
                Err(err) => tracing::warn!(error = %err, "ignoring room drop"),
            },
        }
    }

    /// Turns `kind` on in the preferences, remembering the prior flag so a
    /// failed open can put it back.
    fn activate(&mut self, kind: MediaKind) {
        let was_active = self.preferences.is_active(kind);
        self.preferences.set_active(kind, true);
        self.controller.note_activation(kind, was_active);
    }

    fn deactivate(&mut self, kind: MediaKind) {
        self.preferences.set_active(kind, false);
        self.controller.note_deactivation(kind);
    }

    fn fetch_stream(&mut self, kind: MediaKind, device_id: DeviceId, respond_to: StreamReply) {
        let phase = self.lifecycle.phase();
        if !phase.allows_capture() {
            let _ = respond_to.send(Err(SessionError::CaptureNotAllowed { kind, phase }));
            return;
        }
        self.preferences.set_device(kind, device_id.clone());
        self.activate(kind);
        self.controller.add_waiter(kind, device_id, respond_to);
    }

    fn stop_stream(&mut self, kind: MediaKind) {
        self.deactivate(kind);
        self.controller.stop_stream(kind);
    }

    /// Only stores the device; the reconcile pass recaptures if `kind` is on.
    fn switch_device(&mut self, kind: MediaKind, device_id: DeviceId) {
        if self.preferences.set_device(kind, device_id.clone()) {
            tracing::debug!(%kind, device = %device_id, "preferred device changed");
        }
    }

    fn join_lobby(&mut self, room_id: RoomId, respond_to: Reply<()>) {
        let from = self.lifecycle.phase();
        match self.lifecycle.begin_lobby_join(room_id) {
            Ok(attempt) => self.begin_join(from, attempt, respond_to),
            Err(err) => {
                tracing::warn!(error = %err, "lobby join rejected");
                let _ = respond_to.send(Err(err));
            }
        }
    }

    fn join_room(&mut self, respond_to: Reply<()>) {
        let from = self.lifecycle.phase();
        match self.lifecycle.begin_room_join() {
            Ok(attempt) => self.begin_join(from, attempt, respond_to),
            Err(err) => {
                tracing::warn!(error = %err, "room join rejected");
                let _ = respond_to.send(Err(err));
            }
        }
    }

    fn begin_join(&mut self, from: RoomPhase, attempt: JoinAttempt, respond_to: Reply<()>) {
        self.on_transition(Transition {
            from,
            to: self.lifecycle.phase(),
        });
        if let Some(previous) = self.pending_join.replace(respond_to) {
            let _ = previous.send(Err(SessionError::stale("superseded join")));
        }

        let client = Arc::clone(&self.client);
        let completions = self.completions.clone();
        tokio::spawn(async move {
            let result = match attempt.stage {
                JoinStage::Lobby => client.join_lobby(&attempt.room_id).await,
                JoinStage::Room => client.join_room().await,
            };
            let _ = completions
                .send(Completion::Join { attempt, result })
                .await;
        });
    }

    fn leave_room(&mut self) -> Result<(), SessionError> {
        let transition = self.lifecycle.leave().map_err(|err| {
            tracing::warn!(error = %err, "leave rejected");
            err
        })?;

        let client = Arc::clone(&self.client);
        tokio::spawn(async move {
            if let Err(err) = client.leave_room().await {
                tracing::error!(error = %err, "room client failed to leave");
            }
        });

        self.after_leave(transition);
        Ok(())
    }

    fn after_leave(&mut self, transition: Transition) {
        self.on_transition(transition);
        self.controller.stop_all();
        self.roster.clear();
        if let Some(pending) = self.pending_join.take() {
            let _ = pending.send(Err(SessionError::stale("join interrupted by leave")));
        }
        self.events.emit(SessionEvent::NavigateAway {
            room_id: self.lifecycle.room_id().cloned(),
        });
    }

    fn restart(&mut self) -> Result<(), SessionError> {
        let transition = self.lifecycle.restart()?;
        self.roster.clear();
        self.on_transition(transition);
        Ok(())
    }

    fn handle_completion(&mut self, completion: Completion) {
        match completion {
            Completion::Fetch(fetch) => {
                let kind = fetch.ticket.kind;
                let desired = self.desired(kind);
                if let Some(restore) = self.controller.complete(fetch, desired.as_ref()) {
                    self.preferences.set_active(kind, restore);
                }
            }
            Completion::Join { attempt, result } => self.join_completed(&attempt, result),
        }
    }

    fn join_completed(&mut self, attempt: &JoinAttempt, result: Result<(), SessionError>) {
        let applied = match &result {
            Ok(()) => self.lifecycle.join_succeeded(attempt),
            Err(_) => self.lifecycle.join_failed(attempt),
        };
        let transition = match applied {
            Ok(transition) => transition,
            Err(err) if err.is_stale() => {
                tracing::debug!(error = %err, "discarding stale join completion");
                return;
            }
            Err(err) => {
                tracing::warn!(error = %err, "join completion rejected");
                return;
            }
        };

        if let Err(err) = &result {
            tracing::warn!(room = %attempt.room_id, error = %err, "join failed");
            self.events.emit(SessionEvent::JoinFailed {
                room_id: attempt.room_id.clone(),
                reason: err.to_string(),
            });
        }
        self.on_transition(transition);
        if let Some(pending) = self.pending_join.take() {
            let _ = pending.send(result);
        }
    }

    fn on_transition(&self, transition: Transition) {
        let Transition { from, to } = transition;
        tracing::info!(%from, %to, "phase changed");
        self.events.emit(SessionEvent::PhaseChanged { from, to });
    }

    /// The device `kind` should be capturing right now, if any.
    fn desired(&self, kind: MediaKind) -> Option<DeviceId> {
        let phase = self.lifecycle.phase();
        let preferences = self.preferences.get();
        (phase.allows_capture() && preferences.is_active(kind))
            .then(|| preferences.device_for(kind).clone())
    }

    fn reconcile(&mut self) {
        let allow_production = self.lifecycle.phase().allows_production();
        for kind in MediaKind::ALL {
            let desired = self.desired(kind);
            self.controller
                .reconcile(kind, desired.as_ref(), allow_production);
        }
        self.sync_identity();
        self.publish();
    }

    /// Pushes the display name and avatar to the client once the lobby is
    /// joined, then again only when they change.
    fn sync_identity(&mut self) {
        if !self.lifecycle.phase().allows_capture() {
            self.pushed_name = None;
            self.pushed_avatar = None;
            return;
        }

        let preferences = self.preferences.get();
        if self.pushed_name.as_deref() != Some(preferences.display_name.as_str()) {
            tracing::debug!(name = %preferences.display_name, "pushing display name");
            self.client.set_display_name(&preferences.display_name);
            self.pushed_name = Some(preferences.display_name);
        }
        if self.pushed_avatar.as_deref() != Some(preferences.avatar_url.as_str()) {
            tracing::debug!(url = %preferences.avatar_url, "pushing avatar");
            self.client.set_avatar_url(&preferences.avatar_url);
            self.pushed_avatar = Some(preferences.avatar_url);
        }
    }

    fn publish(&self) {
        let next = SessionSnapshot {
            phase: self.lifecycle.phase(),
            room_id: self.lifecycle.room_id().cloned(),
            camera: self.controller.snapshot(MediaKind::Camera),
            microphone: self.controller.snapshot(MediaKind::Microphone),
            peers: self.roster.iter().cloned().collect(),
        };
        self.snapshot.send_if_modified(|current| {
            if *current == next {
                false
            } else {
                *current = next;
                true
            }
        });
    }

    fn shutdown(&mut self) {
        self.controller.stop_all();
        if let Some(pending) = self.pending_join.take() {
            let _ = pending.send(Err(SessionError::SessionClosed));
        }
        self.publish();
        tracing::info!("session stopped");
    }
}
