//! Configuration for a session.

use crate::PreferenceState;

/// Configuration for session behavior.
///
/// Use [`SessionConfig::default()`] for sensible defaults, or customize as needed.
///
/// # Example
///
/// ```
/// use meet_session::{PreferenceState, SessionConfig};
///
/// let config = SessionConfig {
///     command_capacity: 128,
///     initial_preferences: PreferenceState {
///         is_mic_muted: false,
///         ..Default::default()
///     },
///     ..Default::default()
/// };
/// ```
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Capacity of the session mailbox (signals and commands).
    ///
    /// Senders wait when the mailbox is full, so signals are never dropped.
    /// Default: 64
    pub command_capacity: usize,

    /// Capacity of the channel carrying device-open and join completions
    /// back into the session loop.
    ///
    /// Default: 32
    pub completion_capacity: usize,

    /// Preferences used when the builder is not given a
    /// [`PreferenceStore`](crate::PreferenceStore).
    ///
    /// Default: microphone muted, camera off, system default devices.
    pub initial_preferences: PreferenceState,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            command_capacity: 64,
            completion_capacity: 32,
            initial_preferences: PreferenceState::default(),
        }
    }
}
