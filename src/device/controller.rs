//! Device stream controller: owns the local captures, one slot per kind.
//!
//! The controller is driven declaratively. After every message the session
//! loop tells it which device each kind *should* capture (or none) and
//! whether captures may be produced, and [`reconcile`] moves the slot
//! toward that target:
//!
//! ```text
//! Off ──open──▶ Capturing ──room joined──▶ Producing
//!  ▲                │  ▲                       │
//!  │                │  └──────left room────────┤
//!  └─────stop───────┴──────────stop────────────┘
//! ```
//!
//! Opens run on spawned tasks and come back as [`FetchCompletion`]s. Each
//! slot has at most one open in flight; its [`FetchTicket`] carries a
//! generation number, and a completion whose ticket is not the slot's
//! current one is dropped, which releases the track. A completion for a
//! device the user no longer wants is released the same way and the next
//! reconcile opens the wanted device.
//!
//! [`reconcile`]: DeviceStreamController::reconcile

use std::sync::Arc;

use tokio::sync::{mpsc, oneshot};

use crate::bridge::Completion;
use crate::device::{CaptureBackend, LocalStream, MediaKind, ProductionLink, StreamHandle};
use crate::event::EventEmitter;
use crate::room::RoomClient;
use crate::snapshot::KindSnapshot;
use crate::{DeviceId, SessionError, SessionEvent};

/// Reply channel for an explicit fetch.
pub(crate) type StreamReply = oneshot::Sender<Result<LocalStream, SessionError>>;

/// Identifies one device open.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct FetchTicket {
    pub kind: MediaKind,
    pub generation: u64,
    pub device_id: DeviceId,
}

/// Result of a device open, posted back to the session loop.
#[derive(Debug)]
pub(crate) struct FetchCompletion {
    pub ticket: FetchTicket,
    pub result: Result<StreamHandle, SessionError>,
}

#[derive(Default)]
struct Slot {
    handle: Option<StreamHandle>,
    production: Option<ProductionLink>,
    in_flight: Option<FetchTicket>,
    waiters: Vec<(DeviceId, StreamReply)>,
    failed: Option<DeviceId>,
    /// Flag value before the first activation since the last settle,
    /// restored if the resulting open fails.
    restore_active: Option<bool>,
    generation: u64,
}

impl Slot {
    fn answer(&mut self, device_id: &DeviceId, result: &Result<LocalStream, SessionError>) {
        let (matching, rest): (Vec<_>, Vec<_>) = std::mem::take(&mut self.waiters)
            .into_iter()
            .partition(|(d, _)| d == device_id);
        self.waiters = rest;
        for (_, reply) in matching {
            let _ = reply.send(result.clone());
        }
    }

    fn reject_unwanted(&mut self, kind: MediaKind, desired: Option<&DeviceId>) {
        let (stale, keep): (Vec<_>, Vec<_>) = std::mem::take(&mut self.waiters)
            .into_iter()
            .partition(|(d, _)| Some(d) != desired);
        self.waiters = keep;
        for (device_id, reply) in stale {
            let _ = reply.send(Err(SessionError::stale(format!(
                "{kind} fetch for {device_id}"
            ))));
        }
    }
}

/// Owns the camera and microphone captures.
pub(crate) struct DeviceStreamController {
    backend: Arc<dyn CaptureBackend>,
    client: Arc<dyn RoomClient>,
    completions: mpsc::Sender<Completion>,
    events: EventEmitter,
    camera: Slot,
    microphone: Slot,
}

impl DeviceStreamController {
    pub(crate) fn new(
        backend: Arc<dyn CaptureBackend>,
        client: Arc<dyn RoomClient>,
        completions: mpsc::Sender<Completion>,
        events: EventEmitter,
    ) -> Self {
        Self {
            backend,
            client,
            completions,
            events,
            camera: Slot::default(),
            microphone: Slot::default(),
        }
    }

    fn slot(&self, kind: MediaKind) -> &Slot {
        match kind {
            MediaKind::Camera => &self.camera,
            MediaKind::Microphone => &self.microphone,
        }
    }

    fn slot_mut(&mut self, kind: MediaKind) -> &mut Slot {
        match kind {
            MediaKind::Camera => &mut self.camera,
            MediaKind::Microphone => &mut self.microphone,
        }
    }

    /// Records that the user just turned `kind` on, and whether it was
    /// already on. Clears any failure so the next reconcile retries.
    ///
    /// Repeated activations before the open settles keep the first prior
    /// value.
    pub(crate) fn note_activation(&mut self, kind: MediaKind, was_active: bool) {
        let slot = self.slot_mut(kind);
        slot.restore_active.get_or_insert(was_active);
        slot.failed = None;
    }

    /// Records that the user turned `kind` off. Nothing is left to restore.
    pub(crate) fn note_deactivation(&mut self, kind: MediaKind) {
        self.slot_mut(kind).restore_active = None;
    }

    /// Registers a caller waiting for a capture of `device_id`.
    pub(crate) fn add_waiter(&mut self, kind: MediaKind, device_id: DeviceId, reply: StreamReply) {
        let slot = self.slot_mut(kind);
        match &slot.handle {
            Some(handle) if handle.device_id() == &device_id => {
                let _ = reply.send(Ok(handle.describe()));
            }
            _ => slot.waiters.push((device_id, reply)),
        }
    }

    /// Moves the slot for `kind` toward capturing `desired` (or nothing),
    /// producing it only when `allow_production` is set.
    pub(crate) fn reconcile(
        &mut self,
        kind: MediaKind,
        desired: Option<&DeviceId>,
        allow_production: bool,
    ) {
        let slot = self.slot_mut(kind);
        slot.reject_unwanted(kind, desired);
        if slot.failed.as_ref() != desired {
            slot.failed = None;
        }
        if slot.in_flight.is_some() {
            // The completion triggers another reconcile.
            return;
        }

        let Some(device_id) = desired else {
            self.stop_stream(kind);
            return;
        };

        let holds_desired = slot
            .handle
            .as_ref()
            .is_some_and(|h| h.device_id() == device_id);
        if holds_desired {
            slot.restore_active = None;
            self.sync_production(kind, allow_production);
        } else if slot.failed.as_ref() == Some(device_id) {
            self.stop_stream(kind);
        } else {
            self.fetch_stream(kind, device_id.clone());
        }
    }

    /// Releases whatever `kind` holds and starts opening `device_id`.
    fn fetch_stream(&mut self, kind: MediaKind, device_id: DeviceId) {
        self.stop_stream(kind);

        let slot = self.slot_mut(kind);
        slot.generation += 1;
        let ticket = FetchTicket {
            kind,
            generation: slot.generation,
            device_id,
        };
        slot.in_flight = Some(ticket.clone());

        tracing::debug!(
            %kind,
            device = %ticket.device_id,
            generation = ticket.generation,
            "opening device"
        );

        let backend = Arc::clone(&self.backend);
        let completions = self.completions.clone();
        tokio::spawn(async move {
            let result = backend
                .open(ticket.kind, &ticket.device_id)
                .await
                .map(|track| StreamHandle::new(ticket.kind, ticket.device_id.clone(), track));
            // If the session is gone the handle is dropped here, releasing it.
            let _ = completions
                .send(Completion::Fetch(FetchCompletion { ticket, result }))
                .await;
        });
    }

    /// Applies a finished open.
    ///
    /// Returns the flag value to restore when the open of the currently
    /// desired device failed after a user activation.
    pub(crate) fn complete(
        &mut self,
        completion: FetchCompletion,
        desired: Option<&DeviceId>,
    ) -> Option<bool> {
        let FetchCompletion { ticket, result } = completion;
        let kind = ticket.kind;
        let slot = self.slot_mut(kind);

        if slot.in_flight.as_ref() != Some(&ticket) {
            tracing::debug!(
                %kind,
                device = %ticket.device_id,
                generation = ticket.generation,
                "discarding completion of an open that is no longer tracked"
            );
            return None;
        }
        slot.in_flight = None;

        let wanted = desired == Some(&ticket.device_id);
        match result {
            Ok(handle) if wanted => {
                let described = handle.describe();
                slot.handle = Some(handle);
                slot.restore_active = None;
                slot.answer(&ticket.device_id, &Ok(described));
                tracing::info!(%kind, device = %ticket.device_id, "stream started");
                self.events.emit(SessionEvent::StreamStarted {
                    kind,
                    device_id: ticket.device_id,
                });
                None
            }
            Ok(handle) => {
                tracing::debug!(
                    %kind,
                    device = %ticket.device_id,
                    "releasing stream for a device that is no longer wanted"
                );
                drop(handle);
                None
            }
            Err(err) if wanted => {
                tracing::warn!(%kind, device = %ticket.device_id, error = %err, "device open failed");
                slot.failed = Some(ticket.device_id.clone());
                slot.answer(&ticket.device_id, &Err(err.clone()));
                let restore = slot.restore_active.take();
                self.events.emit(SessionEvent::DeviceFailed {
                    kind,
                    device_id: ticket.device_id,
                    reason: err.to_string(),
                });
                restore
            }
            Err(err) => {
                tracing::debug!(
                    %kind,
                    device = %ticket.device_id,
                    error = %err,
                    "ignoring failure of a device that is no longer wanted"
                );
                None
            }
        }
    }

    /// Starts or stops producing `kind` to match `allow`.
    fn sync_production(&mut self, kind: MediaKind, allow: bool) {
        let Self {
            client,
            events,
            camera,
            microphone,
            ..
        } = self;
        let slot = match kind {
            MediaKind::Camera => camera,
            MediaKind::Microphone => microphone,
        };

        let producing = slot.production.is_some();
        let should_produce = allow && slot.handle.is_some();
        if should_produce && !producing {
            let Some(handle) = slot.handle.as_ref() else {
                return;
            };
            client.produce(handle);
            let device_id = handle.device_id().clone();
            tracing::info!(%kind, device = %device_id, "producing");
            events.emit(SessionEvent::ProducingStarted {
                kind,
                device_id: device_id.clone(),
            });
            slot.production = Some(ProductionLink { kind, device_id });
        } else if !should_produce && producing {
            client.stop_producing(kind);
            slot.production = None;
            tracing::info!(%kind, "stopped producing");
            events.emit(SessionEvent::ProducingStopped { kind });
        }
    }

    /// Stops producing and releases the capture of `kind`, if any.
    pub(crate) fn stop_stream(&mut self, kind: MediaKind) {
        self.sync_production(kind, false);
        if let Some(handle) = self.slot_mut(kind).handle.take() {
            let device_id = handle.device_id().clone();
            drop(handle);
            tracing::info!(%kind, device = %device_id, "stream stopped");
            self.events
                .emit(SessionEvent::StreamStopped { kind, device_id });
        }
    }

    /// Releases both kinds. In-flight opens are released when they land.
    pub(crate) fn stop_all(&mut self) {
        for kind in MediaKind::ALL {
            self.stop_stream(kind);
        }
    }

    pub(crate) fn snapshot(&self, kind: MediaKind) -> KindSnapshot {
        let slot = self.slot(kind);
        KindSnapshot {
            stream: slot.handle.as_ref().map(StreamHandle::describe),
            production: slot.production.clone(),
            pending: slot.in_flight.as_ref().map(|t| t.device_id.clone()),
            failed: slot.failed.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::MockBackend;
    use crate::room::MockRoomClient;
    use std::time::Duration;

    struct Harness {
        controller: DeviceStreamController,
        completions: mpsc::Receiver<Completion>,
        backend: MockBackend,
        client: MockRoomClient,
    }

    fn harness() -> Harness {
        let backend = MockBackend::new();
        let client = MockRoomClient::new();
        let (tx, rx) = mpsc::channel(8);
        let controller = DeviceStreamController::new(
            Arc::new(backend.clone()),
            Arc::new(client.clone()),
            tx,
            EventEmitter::default(),
        );
        Harness {
            controller,
            completions: rx,
            backend,
            client,
        }
    }

    impl Harness {
        async fn next_fetch(&mut self) -> FetchCompletion {
            let completion = tokio::time::timeout(Duration::from_secs(1), self.completions.recv())
                .await
                .unwrap()
                .unwrap();
            match completion {
                Completion::Fetch(fetch) => fetch,
                Completion::Join { .. } => panic!("unexpected join completion"),
            }
        }
    }

    fn cam(id: &str) -> DeviceId {
        DeviceId::new(id)
    }

    #[tokio::test]
    async fn test_fetch_installs_handle_without_producing_in_lobby() {
        let mut h = harness();
        let cam_a = cam("camA");

        h.controller.reconcile(MediaKind::Camera, Some(&cam_a), false);
        assert_eq!(h.controller.snapshot(MediaKind::Camera).pending, Some(cam_a.clone()));

        let done = h.next_fetch().await;
        h.controller.complete(done, Some(&cam_a));
        h.controller.reconcile(MediaKind::Camera, Some(&cam_a), false);

        let snap = h.controller.snapshot(MediaKind::Camera);
        assert_eq!(snap.device_id(), Some(&cam_a));
        assert!(!snap.is_producing());
        assert!(h.client.producing(MediaKind::Camera).is_none());
    }

    #[tokio::test]
    async fn test_promotion_reuses_handle() {
        let mut h = harness();
        let cam_a = cam("camA");

        h.controller.reconcile(MediaKind::Camera, Some(&cam_a), false);
        let done = h.next_fetch().await;
        h.controller.complete(done, Some(&cam_a));

        h.controller.reconcile(MediaKind::Camera, Some(&cam_a), true);

        assert!(h.controller.snapshot(MediaKind::Camera).is_producing());
        assert_eq!(h.client.producing(MediaKind::Camera), Some(cam_a));
        assert_eq!(h.backend.open_count(MediaKind::Camera), 1);
    }

    #[tokio::test]
    async fn test_demotion_keeps_capture() {
        let mut h = harness();
        let mic = cam("micA");

        h.controller.reconcile(MediaKind::Microphone, Some(&mic), true);
        let done = h.next_fetch().await;
        h.controller.complete(done, Some(&mic));
        h.controller.reconcile(MediaKind::Microphone, Some(&mic), true);
        assert!(h.controller.snapshot(MediaKind::Microphone).is_producing());

        h.controller.reconcile(MediaKind::Microphone, Some(&mic), false);
        let snap = h.controller.snapshot(MediaKind::Microphone);
        assert!(snap.is_capturing());
        assert!(!snap.is_producing());
        assert!(h.client.producing(MediaKind::Microphone).is_none());
    }

    #[tokio::test]
    async fn test_stale_completion_is_released() {
        let mut h = harness();
        let cam_a = cam("camA");
        let cam_b = cam("camB");

        h.controller.reconcile(MediaKind::Camera, Some(&cam_a), false);
        let done = h.next_fetch().await;

        // User switched while camA was opening.
        h.controller.reconcile(MediaKind::Camera, Some(&cam_b), false);
        h.controller.complete(done, Some(&cam_b));
        assert!(!h.controller.snapshot(MediaKind::Camera).is_capturing());
        assert!(h.backend.live_devices(MediaKind::Camera).is_empty());

        h.controller.reconcile(MediaKind::Camera, Some(&cam_b), false);
        let done = h.next_fetch().await;
        h.controller.complete(done, Some(&cam_b));

        assert_eq!(
            h.controller.snapshot(MediaKind::Camera).device_id(),
            Some(&cam_b)
        );
        assert_eq!(h.backend.live_devices(MediaKind::Camera), vec![cam_b]);
    }

    #[tokio::test]
    async fn test_unknown_ticket_is_ignored() {
        let mut h = harness();
        let cam_a = cam("camA");
        h.controller.reconcile(MediaKind::Camera, Some(&cam_a), false);
        let mut done = h.next_fetch().await;
        done.ticket.generation += 10;

        assert!(h.controller.complete(done, Some(&cam_a)).is_none());
        assert!(!h.controller.snapshot(MediaKind::Camera).is_capturing());
        assert!(h.backend.live_devices(MediaKind::Camera).is_empty());
    }

    #[tokio::test]
    async fn test_failure_marks_device_and_restores_flag() {
        let mut h = harness();
        let cam_a = cam("camA");
        h.backend.fail_device("camA", "permission denied");

        h.controller.note_activation(MediaKind::Camera, false);
        h.controller.reconcile(MediaKind::Camera, Some(&cam_a), false);
        let done = h.next_fetch().await;
        let restore = h.controller.complete(done, Some(&cam_a));

        assert_eq!(restore, Some(false));
        assert_eq!(h.controller.snapshot(MediaKind::Camera).failed, Some(cam_a.clone()));

        // No retry while the failed device is still desired.
        h.controller.reconcile(MediaKind::Camera, Some(&cam_a), false);
        assert!(h.controller.snapshot(MediaKind::Camera).is_settled());
        assert_eq!(h.backend.open_count(MediaKind::Camera), 1);
    }

    #[tokio::test]
    async fn test_repeated_activation_keeps_first_prior_flag() {
        let mut h = harness();
        let cam_a = cam("camA");
        h.backend.fail_device("camA", "busy");

        h.controller.note_activation(MediaKind::Camera, false);
        h.controller.reconcile(MediaKind::Camera, Some(&cam_a), false);
        // Second click lands while the first open is still in flight.
        h.controller.note_activation(MediaKind::Camera, true);
        h.controller.reconcile(MediaKind::Camera, Some(&cam_a), false);

        let done = h.next_fetch().await;
        assert_eq!(h.controller.complete(done, Some(&cam_a)), Some(false));
        assert_eq!(h.backend.open_count(MediaKind::Camera), 1);
    }

    #[tokio::test]
    async fn test_deactivation_forgets_prior_flag() {
        let mut h = harness();
        let cam_a = cam("camA");
        h.backend.fail_device("camA", "busy");

        h.controller.note_activation(MediaKind::Camera, false);
        h.controller.note_deactivation(MediaKind::Camera);
        h.controller.note_activation(MediaKind::Camera, true);
        h.controller.reconcile(MediaKind::Camera, Some(&cam_a), false);

        let done = h.next_fetch().await;
        assert_eq!(h.controller.complete(done, Some(&cam_a)), Some(true));
    }

    #[tokio::test]
    async fn test_waiter_receives_stream() {
        let mut h = harness();
        let cam_a = cam("camA");
        let (tx, rx) = oneshot::channel();

        h.controller.add_waiter(MediaKind::Camera, cam_a.clone(), tx);
        h.controller.reconcile(MediaKind::Camera, Some(&cam_a), false);
        let done = h.next_fetch().await;
        h.controller.complete(done, Some(&cam_a));

        let stream = rx.await.unwrap().unwrap();
        assert_eq!(stream.device_id, cam_a);
    }

    #[tokio::test]
    async fn test_waiter_for_unwanted_device_is_rejected() {
        let mut h = harness();
        let (tx, rx) = oneshot::channel();

        h.controller.add_waiter(MediaKind::Camera, cam("camA"), tx);
        h.controller.reconcile(MediaKind::Camera, None, false);

        assert!(matches!(
            rx.await.unwrap(),
            Err(SessionError::StaleOperation { .. })
        ));
    }

    #[tokio::test]
    async fn test_stop_all_releases_everything() {
        let mut h = harness();
        let cam_a = cam("camA");
        let mic_a = cam("micA");

        h.controller.reconcile(MediaKind::Camera, Some(&cam_a), true);
        h.controller.reconcile(MediaKind::Microphone, Some(&mic_a), true);
        for _ in 0..2 {
            let done = h.next_fetch().await;
            let desired = match done.ticket.kind {
                MediaKind::Camera => cam_a.clone(),
                MediaKind::Microphone => mic_a.clone(),
            };
            h.controller.complete(done, Some(&desired));
        }
        h.controller.reconcile(MediaKind::Camera, Some(&cam_a), true);
        h.controller.reconcile(MediaKind::Microphone, Some(&mic_a), true);

        h.controller.stop_all();

        for kind in MediaKind::ALL {
            assert!(!h.controller.snapshot(kind).is_capturing());
            assert!(h.client.producing(kind).is_none());
            assert!(h.backend.live_devices(kind).is_empty());
        }
    }
}
