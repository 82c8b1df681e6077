//! Mock capture backend for testing without hardware.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;

use crate::device::{CaptureBackend, CaptureTrack, DeviceInfo, MediaKind};
use crate::gate::{self, Gate};
use crate::{DeviceId, SessionError};

/// A capture backend that hands out fake tracks.
///
/// Besides opening devices instantly, the mock can refuse devices, hold an
/// open until the test releases it (to force out-of-order completions), and
/// reports which tracks are live so tests can check that the OS device was
/// released.
///
/// Clones share state, so keep one clone for assertions and give another to
/// the session builder.
///
/// # Example
///
/// ```
/// use meet_session::{DeviceId, MediaKind, MockBackend};
///
/// let backend = MockBackend::new()
///     .with_device(MediaKind::Camera, "camA", "Front camera")
///     .with_device(MediaKind::Microphone, "micA", "Built-in microphone");
///
/// backend.fail_device("camB", "permission denied");
/// backend.hold("camA"); // opens of camA wait for backend.release("camA")
///
/// assert_eq!(backend.open_count(MediaKind::Camera), 0);
/// assert!(backend.live_devices(MediaKind::Camera).is_empty());
/// ```
#[derive(Clone, Default)]
pub struct MockBackend {
    state: Arc<MockState>,
}

#[derive(Default)]
struct MockState {
    devices: Mutex<Vec<DeviceInfo>>,
    failures: Mutex<HashMap<DeviceId, String>>,
    gates: Mutex<HashMap<DeviceId, Gate>>,
    opens: Mutex<Vec<(MediaKind, DeviceId)>>,
    live: Mutex<Vec<LiveTrack>>,
    peak: Mutex<HashMap<MediaKind, usize>>,
    next_track: AtomicU64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct LiveTrack {
    number: u64,
    kind: MediaKind,
    device_id: DeviceId,
}

impl MockBackend {
    /// Creates a backend with no listed devices. Any device id still opens.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a device to what [`list_devices`](CaptureBackend::list_devices) reports.
    #[must_use]
    pub fn with_device(
        self,
        kind: MediaKind,
        device_id: impl Into<DeviceId>,
        label: impl Into<String>,
    ) -> Self {
        self.state.devices.lock().push(DeviceInfo {
            kind,
            device_id: device_id.into(),
            label: label.into(),
        });
        self
    }

    /// Makes every open of `device_id` fail with `reason`.
    pub fn fail_device(&self, device_id: impl Into<DeviceId>, reason: impl Into<String>) {
        self.state
            .failures
            .lock()
            .insert(device_id.into(), reason.into());
    }

    /// Lets `device_id` open again.
    pub fn heal_device(&self, device_id: impl Into<DeviceId>) {
        self.state.failures.lock().remove(&device_id.into());
    }

    /// Holds opens of `device_id` until [`release`](Self::release) is called.
    pub fn hold(&self, device_id: impl Into<DeviceId>) {
        self.state.gates.lock().insert(device_id.into(), Gate::closed());
    }

    /// Lets held and future opens of `device_id` complete.
    pub fn release(&self, device_id: impl Into<DeviceId>) {
        if let Some(gate) = self.state.gates.lock().get(&device_id.into()) {
            gate.open();
        }
    }

    /// Every open attempt so far, in order.
    pub fn opens(&self) -> Vec<(MediaKind, DeviceId)> {
        self.state.opens.lock().clone()
    }

    /// Number of open attempts for `kind`.
    pub fn open_count(&self, kind: MediaKind) -> usize {
        self.state
            .opens
            .lock()
            .iter()
            .filter(|(k, _)| *k == kind)
            .count()
    }

    /// Devices of `kind` with a track that has not been stopped.
    pub fn live_devices(&self, kind: MediaKind) -> Vec<DeviceId> {
        self.state
            .live
            .lock()
            .iter()
            .filter(|t| t.kind == kind)
            .map(|t| t.device_id.clone())
            .collect()
    }

    /// The most tracks of `kind` that were ever live at the same time.
    pub fn peak_live(&self, kind: MediaKind) -> usize {
        self.state.peak.lock().get(&kind).copied().unwrap_or(0)
    }

    fn start_track(&self, kind: MediaKind, device_id: &DeviceId) -> MockTrack {
        let number = self.state.next_track.fetch_add(1, Ordering::SeqCst);
        let mut live = self.state.live.lock();
        live.push(LiveTrack {
            number,
            kind,
            device_id: device_id.clone(),
        });
        let now_live = live.iter().filter(|t| t.kind == kind).count();
        drop(live);

        let mut peak = self.state.peak.lock();
        let entry = peak.entry(kind).or_insert(0);
        *entry = (*entry).max(now_live);

        MockTrack {
            number,
            label: format!("mock-{kind}-{device_id}-{number}"),
            state: Arc::clone(&self.state),
            stopped: AtomicBool::new(false),
        }
    }
}

#[async_trait]
impl CaptureBackend for MockBackend {
    fn name(&self) -> &str {
        "mock"
    }

    async fn open(
        &self,
        kind: MediaKind,
        device_id: &DeviceId,
    ) -> Result<Box<dyn CaptureTrack>, SessionError> {
        self.state.opens.lock().push((kind, device_id.clone()));

        let waiter = self.state.gates.lock().get(device_id).map(Gate::waiter);
        if let Some(rx) = waiter {
            gate::pass(rx).await;
        }

        let failure = self.state.failures.lock().get(device_id).cloned();
        if let Some(reason) = failure {
            return Err(SessionError::device_unavailable(
                kind,
                device_id.clone(),
                reason,
            ));
        }

        Ok(Box::new(self.start_track(kind, device_id)))
    }

    async fn list_devices(&self, kind: MediaKind) -> Result<Vec<DeviceInfo>, SessionError> {
        Ok(self
            .state
            .devices
            .lock()
            .iter()
            .filter(|d| d.kind == kind)
            .cloned()
            .collect())
    }
}

struct MockTrack {
    number: u64,
    label: String,
    state: Arc<MockState>,
    stopped: AtomicBool,
}

impl CaptureTrack for MockTrack {
    fn label(&self) -> &str {
        &self.label
    }

    fn stop(&self) {
        if self.stopped.swap(true, Ordering::SeqCst) {
            return;
        }
        self.state.live.lock().retain(|t| t.number != self.number);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn test_open_and_stop_tracks_liveness() {
        let backend = MockBackend::new();
        let track = backend
            .open(MediaKind::Camera, &DeviceId::new("camA"))
            .await
            .unwrap();

        assert_eq!(backend.live_devices(MediaKind::Camera), vec![DeviceId::new("camA")]);
        assert!(track.label().contains("camA"));

        track.stop();
        track.stop(); // idempotent
        assert!(backend.live_devices(MediaKind::Camera).is_empty());
        assert_eq!(backend.open_count(MediaKind::Camera), 1);
        assert_eq!(backend.open_count(MediaKind::Microphone), 0);
    }

    #[tokio::test]
    async fn test_failing_device() {
        let backend = MockBackend::new();
        backend.fail_device("micA", "permission denied");

        let result = backend
            .open(MediaKind::Microphone, &DeviceId::new("micA"))
            .await;
        assert!(matches!(
            result,
            Err(SessionError::DeviceUnavailable { .. })
        ));
        assert!(backend.live_devices(MediaKind::Microphone).is_empty());

        backend.heal_device("micA");
        assert!(backend
            .open(MediaKind::Microphone, &DeviceId::new("micA"))
            .await
            .is_ok());
    }

    #[tokio::test]
    async fn test_held_open_waits_for_release() {
        let backend = MockBackend::new();
        backend.hold("camA");

        let opener = {
            let backend = backend.clone();
            tokio::spawn(async move {
                backend
                    .open(MediaKind::Camera, &DeviceId::new("camA"))
                    .await
                    .map(|t| t.label().to_string())
            })
        };

        tokio::time::sleep(Duration::from_millis(10)).await;
        assert!(!opener.is_finished());
        assert_eq!(backend.open_count(MediaKind::Camera), 1);

        backend.release("camA");
        let label = tokio::time::timeout(Duration::from_secs(1), opener)
            .await
            .unwrap()
            .unwrap()
            .unwrap();
        assert!(label.starts_with("mock-camera-camA"));
    }

    #[tokio::test]
    async fn test_peak_live() {
        let backend = MockBackend::new();
        let a = backend
            .open(MediaKind::Camera, &DeviceId::new("camA"))
            .await
            .unwrap();
        a.stop();
        let _b = backend
            .open(MediaKind::Camera, &DeviceId::new("camB"))
            .await
            .unwrap();

        assert_eq!(backend.peak_live(MediaKind::Camera), 1);
    }

    #[tokio::test]
    async fn test_list_devices_filters_by_kind() {
        let backend = MockBackend::new()
            .with_device(MediaKind::Camera, "camA", "Front")
            .with_device(MediaKind::Microphone, "micA", "Mic");

        let cams = backend.list_devices(MediaKind::Camera).await.unwrap();
        assert_eq!(cams.len(), 1);
        assert_eq!(cams[0].label, "Front");
    }
}
