//! Builder pattern for `MeetSession`.

use std::sync::Arc;

use tokio::sync::{mpsc, watch};

use crate::bridge::{ActorParts, SessionActor};
use crate::device::CaptureBackend;
use crate::event::EventEmitter;
use crate::room::RoomClient;
use crate::session::{Session, SessionHandle};
use crate::{
    event_callback, EventCallback, PreferenceStore, SessionConfig, SessionError, SessionEvent,
    SessionSnapshot,
};

/// Builder for configuring and starting a meeting session.
///
/// Use [`MeetSession::builder()`] to create a new builder.
///
/// # Example
///
/// ```
/// use meet_session::{MeetSession, MockBackend, MockRoomClient, PreferenceStore};
///
/// # async fn demo() -> Result<(), meet_session::SessionError> {
/// // The store outlives the session so the room view sees the lobby's choices.
/// let preferences = PreferenceStore::new();
///
/// let session = MeetSession::builder()
///     .capture_backend(MockBackend::new())
///     .room_client(MockRoomClient::new())
///     .preferences(preferences.clone())
///     .on_event(|e| tracing::info!(?e, "session event"))
///     .start()
///     .await?;
/// # session.stop().await
/// # }
/// ```
///
/// [`MeetSession::builder()`]: crate::MeetSession::builder
#[must_use]
pub struct MeetSessionBuilder {
    backend: Option<Arc<dyn CaptureBackend>>,
    client: Option<Arc<dyn RoomClient>>,
    /// Shared store; when absent one is created from the config.
    preferences: Option<PreferenceStore>,
    event_callback: Option<EventCallback>,
    config: SessionConfig,
}

impl Default for MeetSessionBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl MeetSessionBuilder {
    /// Creates a new builder with default settings.
    pub fn new() -> Self {
        Self {
            backend: None,
            client: None,
            preferences: None,
            event_callback: None,
            config: SessionConfig::default(),
        }
    }

    /// Sets the backend that opens camera and microphone devices.
    pub fn capture_backend<B: CaptureBackend + 'static>(mut self, backend: B) -> Self {
        self.backend = Some(Arc::new(backend));
        self
    }

    /// Sets the real-time SDK client.
    pub fn room_client<C: RoomClient + 'static>(mut self, client: C) -> Self {
        self.client = Some(Arc::new(client));
        self
    }

    /// Uses an existing preference store, so choices made in an earlier
    /// session (the lobby view) carry over.
    pub fn preferences(mut self, preferences: PreferenceStore) -> Self {
        self.preferences = Some(preferences);
        self
    }

    /// Set a callback to receive runtime events.
    ///
    /// Events include phase changes, streams starting and stopping, device
    /// failures and the request to navigate away after leaving.
    pub fn on_event<F>(mut self, callback: F) -> Self
    where
        F: Fn(SessionEvent) + Send + Sync + 'static,
    {
        self.event_callback = Some(event_callback(callback));
        self
    }

    /// Set custom session configuration.
    pub fn with_config(mut self, config: SessionConfig) -> Self {
        self.config = config;
        self
    }

    /// Validates the builder configuration.
    fn validate(&self) -> Result<(), SessionError> {
        if self.backend.is_none() {
            return Err(SessionError::NoCaptureBackend);
        }
        if self.client.is_none() {
            return Err(SessionError::NoRoomClient);
        }
        if self.config.command_capacity == 0 || self.config.completion_capacity == 0 {
            return Err(SessionError::InvalidConfig {
                reason: "channel capacities must be at least 1".to_string(),
            });
        }
        Ok(())
    }

    /// Starts the session loop.
    ///
    /// Returns a [`Session`] that owns the loop; get [`SessionHandle`]s
    /// from it to drive the session.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - No capture backend is configured
    /// - No room client is configured
    /// - A channel capacity in the config is zero
    pub async fn start(self) -> Result<Session, SessionError> {
        self.validate()?;
        let Self {
            backend: Some(backend),
            client: Some(client),
            preferences,
            event_callback,
            config,
        } = self
        else {
            return Err(SessionError::NoCaptureBackend);
        };

        let preferences =
            preferences.unwrap_or_else(|| PreferenceStore::with_state(config.initial_preferences));

        let (command_tx, command_rx) = mpsc::channel(config.command_capacity);
        let (completion_tx, completion_rx) = mpsc::channel(config.completion_capacity);
        let (snapshot_tx, snapshot_rx) = watch::channel(SessionSnapshot::default());

        let actor = SessionActor::new(
            ActorParts {
                backend,
                client,
                preferences: preferences.clone(),
                events: EventEmitter::new(event_callback),
                snapshot: snapshot_tx,
            },
            completion_tx,
        );
        let task = tokio::spawn(actor.run(command_rx, completion_rx));

        let handle = SessionHandle::new(command_tx, snapshot_rx, preferences);
        Ok(Session::new(handle, task))
    }
}

/// Main entry point for meet-session.
///
/// Use [`MeetSession::builder()`] to start configuring a session.
pub struct MeetSession;

impl MeetSession {
    /// Creates a new builder for configuring a session.
    pub fn builder() -> MeetSessionBuilder {
        MeetSessionBuilder::new()
    }
}
