//! Local capture devices and the streams opened on them.
//!
//! This module is the seam between the session engine and whatever actually
//! talks to the operating system (`getUserMedia`, a native capture API, or
//! the [`MockBackend`] in tests). The engine only ever sees two traits:
//!
//! - [`CaptureBackend`]: opens a device and enumerates devices
//! - [`CaptureTrack`]: a live capture that can be stopped
//!
//! Live tracks are wrapped in a [`StreamHandle`] owned by the
//! [`DeviceStreamController`](controller::DeviceStreamController).

pub(crate) mod controller;
mod mock;

pub use mock::MockBackend;

use async_trait::async_trait;

use crate::{DeviceId, SessionError};

/// The two kinds of local media the engine manages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum MediaKind {
    /// Video capture.
    Camera,
    /// Audio capture.
    Microphone,
}

impl MediaKind {
    /// Both kinds, in a fixed order.
    pub const ALL: [MediaKind; 2] = [MediaKind::Camera, MediaKind::Microphone];
}

impl std::fmt::Display for MediaKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Camera => write!(f, "camera"),
            Self::Microphone => write!(f, "microphone"),
        }
    }
}

/// A capture device reported by [`CaptureBackend::list_devices`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceInfo {
    /// Camera or microphone.
    pub kind: MediaKind,
    /// Id to pass back when opening the device.
    pub device_id: DeviceId,
    /// Human-readable label, e.g. "FaceTime HD Camera".
    pub label: String,
}

/// A live capture on an OS device.
///
/// Implementations must release the device synchronously in [`stop`],
/// and `stop` must be safe to call more than once.
///
/// [`stop`]: CaptureTrack::stop
pub trait CaptureTrack: Send + Sync {
    /// Label of the underlying track, for logging and rendering.
    fn label(&self) -> &str;

    /// Releases the OS device.
    fn stop(&self);
}

/// Opens capture devices.
///
/// # Example
///
/// ```
/// use async_trait::async_trait;
/// use meet_session::{CaptureBackend, CaptureTrack, DeviceId, MediaKind, SessionError};
///
/// struct NullTrack;
///
/// impl CaptureTrack for NullTrack {
///     fn label(&self) -> &str {
///         "null"
///     }
///
///     fn stop(&self) {}
/// }
///
/// struct NullBackend;
///
/// #[async_trait]
/// impl CaptureBackend for NullBackend {
///     fn name(&self) -> &str {
///         "null"
///     }
///
///     async fn open(
///         &self,
///         _kind: MediaKind,
///         _device_id: &DeviceId,
///     ) -> Result<Box<dyn CaptureTrack>, SessionError> {
///         Ok(Box::new(NullTrack))
///     }
/// }
/// ```
#[async_trait]
pub trait CaptureBackend: Send + Sync {
    /// Human-readable name for logging.
    fn name(&self) -> &str;

    /// Opens the device identified by `device_id`.
    ///
    /// Fails with [`SessionError::DeviceUnavailable`] when permission is
    /// denied, the device was removed, or another process holds it.
    async fn open(
        &self,
        kind: MediaKind,
        device_id: &DeviceId,
    ) -> Result<Box<dyn CaptureTrack>, SessionError>;

    /// Lists the devices of `kind` currently attached.
    ///
    /// Default implementation reports nothing.
    async fn list_devices(&self, kind: MediaKind) -> Result<Vec<DeviceInfo>, SessionError> {
        let _ = kind;
        Ok(Vec::new())
    }
}

/// An owned, live capture for one [`MediaKind`].
///
/// Dropping the handle stops the track, so the OS device is released as
/// soon as the controller lets go of it.
pub struct StreamHandle {
    kind: MediaKind,
    device_id: DeviceId,
    track: Box<dyn CaptureTrack>,
}

impl StreamHandle {
    pub(crate) fn new(kind: MediaKind, device_id: DeviceId, track: Box<dyn CaptureTrack>) -> Self {
        Self {
            kind,
            device_id,
            track,
        }
    }

    /// Camera or microphone.
    pub fn kind(&self) -> MediaKind {
        self.kind
    }

    /// The device this stream captures from.
    pub fn device_id(&self) -> &DeviceId {
        &self.device_id
    }

    /// The underlying track, for rendering or producing.
    pub fn track(&self) -> &dyn CaptureTrack {
        self.track.as_ref()
    }

    /// A detached description of this stream.
    pub fn describe(&self) -> LocalStream {
        LocalStream {
            kind: self.kind,
            device_id: self.device_id.clone(),
            label: self.track.label().to_string(),
        }
    }
}

impl std::fmt::Debug for StreamHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StreamHandle")
            .field("kind", &self.kind)
            .field("device_id", &self.device_id)
            .field("label", &self.track.label())
            .finish()
    }
}

impl Drop for StreamHandle {
    fn drop(&mut self) {
        self.track.stop();
    }
}

/// Description of a local stream, safe to hand to UI code.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocalStream {
    /// Camera or microphone.
    pub kind: MediaKind,
    /// Device being captured.
    pub device_id: DeviceId,
    /// Track label reported by the backend.
    pub label: String,
}

/// Marks a local stream as being sent to peers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProductionLink {
    /// Camera or microphone.
    pub kind: MediaKind,
    /// Device whose stream is produced.
    pub device_id: DeviceId,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    struct CountingTrack {
        stops: Arc<AtomicUsize>,
    }

    impl CaptureTrack for CountingTrack {
        fn label(&self) -> &str {
            "counting"
        }

        fn stop(&self) {
            self.stops.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[test]
    fn test_media_kind_display() {
        assert_eq!(MediaKind::Camera.to_string(), "camera");
        assert_eq!(MediaKind::Microphone.to_string(), "microphone");
    }

    #[test]
    fn test_stream_handle_stops_track_on_drop() {
        let stops = Arc::new(AtomicUsize::new(0));
        let handle = StreamHandle::new(
            MediaKind::Camera,
            DeviceId::new("camA"),
            Box::new(CountingTrack {
                stops: Arc::clone(&stops),
            }),
        );

        assert_eq!(stops.load(Ordering::SeqCst), 0);
        drop(handle);
        assert_eq!(stops.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_stream_handle_describe() {
        let handle = StreamHandle::new(
            MediaKind::Microphone,
            DeviceId::new("micA"),
            Box::new(CountingTrack {
                stops: Arc::new(AtomicUsize::new(0)),
            }),
        );

        let described = handle.describe();
        assert_eq!(described.kind, MediaKind::Microphone);
        assert_eq!(described.device_id.as_str(), "micA");
        assert_eq!(described.label, "counting");
    }

    #[test]
    fn test_backend_is_send_sync() {
        fn assert_send_sync<T: Send + Sync + ?Sized>() {}
        assert_send_sync::<dyn CaptureBackend>();
        assert_send_sync::<StreamHandle>();
    }
}
