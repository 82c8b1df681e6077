//! Device switching with a slow camera.
//!
//! Opens of `camA` are held back while the user switches to `camB` and
//! clicks the camera button again. When `camA` finally opens it is released
//! straight away and `camB` wins. A failing microphone shows that the
//! control falls back to muted.
//!
//! Run with: RUST_LOG=meet_session=debug cargo run --example device_switch

use std::time::Duration;

use meet_session::{MediaKind, MeetSession, MockBackend, MockRoomClient, SessionEvent, Signal};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let backend = MockBackend::new()
        .with_device(MediaKind::Camera, "camA", "Slow webcam")
        .with_device(MediaKind::Camera, "camB", "Fast webcam")
        .with_device(MediaKind::Microphone, "micBroken", "Unplugged headset");
    backend.hold("camA");
    backend.fail_device("micBroken", "device removed");

    let session = MeetSession::builder()
        .capture_backend(backend.clone())
        .room_client(MockRoomClient::new())
        .on_event(|event| {
            if let SessionEvent::DeviceFailed { kind, reason, .. } = event {
                eprintln!("{kind} failed: {reason}");
            }
        })
        .start()
        .await?;
    let handle = session.handle();
    handle.join_lobby("design-review").await?;

    for device in handle.list_devices(MediaKind::Camera).await? {
        println!("camera: {} ({})", device.device_id, device.label);
    }

    handle.switch_device(MediaKind::Camera, "camA").await?;
    handle.signal(Signal::CamOn).await?;
    handle.wait_for(|s| s.camera.pending.is_some()).await?;
    println!("camA is opening...");

    handle.switch_device(MediaKind::Camera, "camB").await?;
    handle.signal(Signal::CamOn).await?;

    tokio::time::sleep(Duration::from_millis(100)).await;
    backend.release("camA");

    let snapshot = handle
        .wait_for(|s| s.camera.is_settled() && s.camera.is_capturing())
        .await?;
    println!(
        "camera settled on {:?}; live cameras: {:?}",
        snapshot.camera.device_id(),
        backend.live_devices(MediaKind::Camera)
    );

    handle.switch_device(MediaKind::Microphone, "micBroken").await?;
    if let Err(err) = handle.fetch_stream(MediaKind::Microphone, "micBroken").await {
        println!("microphone not started: {err}");
    }
    println!(
        "mic muted after failure: {}",
        handle.preferences().get().is_mic_muted
    );

    session.stop().await?;
    Ok(())
}
