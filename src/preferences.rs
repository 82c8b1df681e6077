//! User preferences that outlive a single view.
//!
//! The [`PreferenceStore`] is a cloneable handle over one shared
//! [`PreferenceState`]. Hand the same store to the lobby session and the
//! room session and the user's choices carry across navigation. Changes are
//! published through a `tokio::sync::watch` channel; setters that write the
//! value already stored notify nobody.

use std::sync::Arc;

use tokio::sync::watch;

use crate::{DeviceId, MediaKind};

/// What the user wants, independent of what is currently captured.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PreferenceState {
    /// Microphone muted.
    pub is_mic_muted: bool,
    /// Camera turned off.
    pub is_cam_off: bool,
    /// Preferred camera.
    pub video_device_id: DeviceId,
    /// Preferred microphone.
    pub audio_input_device_id: DeviceId,
    /// Name shown to other participants.
    pub display_name: String,
    /// Avatar shown when the camera is off.
    pub avatar_url: String,
}

impl Default for PreferenceState {
    fn default() -> Self {
        Self {
            is_mic_muted: true,
            is_cam_off: true,
            video_device_id: DeviceId::system_default(),
            audio_input_device_id: DeviceId::system_default(),
            display_name: String::new(),
            avatar_url: String::new(),
        }
    }
}

impl PreferenceState {
    /// Returns `true` if the user wants `kind` on (unmuted / camera on).
    pub fn is_active(&self, kind: MediaKind) -> bool {
        match kind {
            MediaKind::Camera => !self.is_cam_off,
            MediaKind::Microphone => !self.is_mic_muted,
        }
    }

    /// The preferred device for `kind`.
    pub fn device_for(&self, kind: MediaKind) -> &DeviceId {
        match kind {
            MediaKind::Camera => &self.video_device_id,
            MediaKind::Microphone => &self.audio_input_device_id,
        }
    }
}

/// Shared, observable preference state.
///
/// # Example
///
/// ```
/// use meet_session::{MediaKind, PreferenceStore};
///
/// let store = PreferenceStore::new();
/// let mut changes = store.subscribe();
///
/// store.set_cam_off(false);
/// assert!(store.get().is_active(MediaKind::Camera));
/// assert!(changes.has_changed().unwrap());
/// ```
#[derive(Clone)]
pub struct PreferenceStore {
    state: Arc<watch::Sender<PreferenceState>>,
}

impl Default for PreferenceStore {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for PreferenceStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("PreferenceStore")
            .field(&*self.state.borrow())
            .finish()
    }
}

impl PreferenceStore {
    /// Creates a store holding [`PreferenceState::default()`].
    pub fn new() -> Self {
        Self::with_state(PreferenceState::default())
    }

    /// Creates a store holding `state`.
    pub fn with_state(state: PreferenceState) -> Self {
        let (tx, _rx) = watch::channel(state);
        Self {
            state: Arc::new(tx),
        }
    }

    /// Returns a copy of the current preferences.
    pub fn get(&self) -> PreferenceState {
        self.state.borrow().clone()
    }

    /// Subscribes to changes.
    pub fn subscribe(&self) -> watch::Receiver<PreferenceState> {
        self.state.subscribe()
    }

    /// Mutes or unmutes the microphone.
    pub fn set_mic_muted(&self, muted: bool) -> bool {
        self.update(|s| assign(&mut s.is_mic_muted, muted))
    }

    /// Turns the camera off or on.
    pub fn set_cam_off(&self, off: bool) -> bool {
        self.update(|s| assign(&mut s.is_cam_off, off))
    }

    /// Selects the preferred camera.
    pub fn set_video_device(&self, device_id: impl Into<DeviceId>) -> bool {
        let device_id = device_id.into();
        self.update(|s| assign(&mut s.video_device_id, device_id))
    }

    /// Selects the preferred microphone.
    pub fn set_audio_device(&self, device_id: impl Into<DeviceId>) -> bool {
        let device_id = device_id.into();
        self.update(|s| assign(&mut s.audio_input_device_id, device_id))
    }

    /// Sets the display name.
    pub fn set_display_name(&self, name: impl Into<String>) -> bool {
        let name = name.into();
        self.update(|s| assign(&mut s.display_name, name))
    }

    /// Sets the avatar URL.
    pub fn set_avatar_url(&self, url: impl Into<String>) -> bool {
        let url = url.into();
        self.update(|s| assign(&mut s.avatar_url, url))
    }

    /// Returns `true` if the user wants `kind` on.
    pub fn is_active(&self, kind: MediaKind) -> bool {
        self.state.borrow().is_active(kind)
    }

    /// The preferred device for `kind`.
    pub fn device_for(&self, kind: MediaKind) -> DeviceId {
        self.state.borrow().device_for(kind).clone()
    }

    /// Turns `kind` on or off.
    pub fn set_active(&self, kind: MediaKind, active: bool) -> bool {
        match kind {
            MediaKind::Camera => self.set_cam_off(!active),
            MediaKind::Microphone => self.set_mic_muted(!active),
        }
    }

    /// Selects the preferred device for `kind`.
    pub fn set_device(&self, kind: MediaKind, device_id: impl Into<DeviceId>) -> bool {
        match kind {
            MediaKind::Camera => self.set_video_device(device_id),
            MediaKind::Microphone => self.set_audio_device(device_id),
        }
    }

    /// Applies `f` and notifies subscribers only if it reports a change.
    /// Returns whether anything changed.
    fn update(&self, f: impl FnOnce(&mut PreferenceState) -> bool) -> bool {
        self.state.send_if_modified(f)
    }
}

fn assign<T: PartialEq>(slot: &mut T, value: T) -> bool {
    if *slot == value {
        false
    } else {
        *slot = value;
        true
    }
}
