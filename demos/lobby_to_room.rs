//! Lobby to room walkthrough.
//!
//! Joins a lobby, previews the camera and microphone, enters the room so
//! the same captures are produced, then leaves. Uses the mock backend and
//! room client, so no hardware or media server is needed.
//!
//! Run with: RUST_LOG=meet_session=debug cargo run --example lobby_to_room

use meet_session::{MediaKind, MeetSession, MockBackend, MockRoomClient, SessionEvent, Signal};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let backend = MockBackend::new()
        .with_device(MediaKind::Camera, "camA", "Front camera")
        .with_device(MediaKind::Microphone, "micA", "Built-in microphone");
    let client = MockRoomClient::new();

    let session = MeetSession::builder()
        .capture_backend(backend.clone())
        .room_client(client.clone())
        .on_event(|event| match event {
            SessionEvent::PhaseChanged { from, to } => println!("phase: {from} -> {to}"),
            SessionEvent::NavigateAway { room_id } => {
                println!("navigate away from {room_id:?}");
            }
            other => println!("event: {other:?}"),
        })
        .start()
        .await?;
    let handle = session.handle();

    handle.join_lobby("standup").await?;

    let camera = handle.fetch_stream(MediaKind::Camera, "camA").await?;
    println!("previewing {} ({})", camera.device_id, camera.label);
    handle.signal(Signal::MicOn).await?;
    let snapshot = handle
        .wait_for(|s| s.microphone.is_capturing())
        .await?;
    println!(
        "in lobby: camera producing={}, mic producing={}",
        snapshot.camera.is_producing(),
        snapshot.microphone.is_producing()
    );

    handle.join_room().await?;
    let snapshot = handle
        .wait_for(|s| s.camera.is_producing() && s.microphone.is_producing())
        .await?;
    println!(
        "in room: producing camera from {:?}, opens so far: {}",
        snapshot.camera.device_id(),
        backend.opens().len()
    );

    handle.leave_room().await?;
    println!(
        "left: live cameras={}, live mics={}",
        backend.live_devices(MediaKind::Camera).len(),
        backend.live_devices(MediaKind::Microphone).len()
    );

    session.stop().await?;
    Ok(())
}
