//! End-to-end monitor demo with a scripted source and stub collaborators
//!
//! Run with: cargo run --example monitor_demo

use anyhow::Result;
use bytes::Bytes;
use std::sync::Arc;
use std::time::Duration;
use streamwatch::{
    AudioRoute, MediaPacket, MediaType, Mediator, MediatorInputs, MemorySurface, MonitorConfig,
    NullRemote, OsMediaEvent, OutputRouteMonitor, PipelineController, PlaybackStatus, PlayerMode,
    ScriptedSource, TrackInfo,
};
use tokio::sync::mpsc;

fn aac_packet(pts: u64) -> MediaPacket {
    let mut data = vec![0xFF, 0xF1, 0x50, 0x80, 0x01, 0x00, 0xFC];
    data.extend_from_slice(&[0x21, 0x42, 0x63, 0x84]);
    MediaPacket {
        media: MediaType::Audio,
        keyframe: false,
        pts,
        payload: Bytes::from(data),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    streamwatch::logging::init();

    println!("🎧 StreamWatch Monitor Demo");
    println!("===========================\n");

    // A scripted source stands in for the camera stream.
    let mut script = ScriptedSource::new().announce(MediaType::Audio);
    for pts in 0..50 {
        script = script
            .packet(aac_packet(pts))
            .delay(Duration::from_millis(20));
    }
    script = script.delay(Duration::from_secs(3600));

    let config = MonitorConfig::audio_monitor("10.0.0.12:8554");
    let pipeline = PipelineController::spawn_with_source(
        config.pipeline.clone(),
        script.into_factory(),
    );

    let surface = Arc::new(MemorySurface::default());
    let routes = OutputRouteMonitor::new(AudioRoute::Bluetooth);
    let (status_tx, status) = mpsc::unbounded_channel();
    let (os_tx, os_events) = mpsc::unbounded_channel();
    let (_cmd_tx, commands) = mpsc::unbounded_channel();

    let mediator = Mediator::new(
        pipeline.clone(),
        Arc::new(NullRemote),
        surface.clone(),
        config.pause_on_speaker,
    );
    tokio::spawn(mediator.run(MediatorInputs {
        status,
        os_events,
        commands,
        routes: routes.subscribe(),
    }));

    println!("▶️  Lock-screen play button pressed");
    os_tx.send(OsMediaEvent::Play)?;
    let mut watch = pipeline.watch_state();
    watch.wait_for(|s| *s == streamwatch::PipelineState::Playing).await?;
    println!("   Pipeline: {}", pipeline.state());

    println!("\n🎵 Remote player starts a track");
    status_tx.send(PlaybackStatus {
        mode: PlayerMode::Playing,
        shuffle: false,
        sleep_timer: Some(1800),
        track: Some(TrackInfo {
            title: "An Ending".to_string(),
            artist: "Brian Eno".to_string(),
            artwork_url: "http://example/art.jpg".to_string(),
        }),
    })?;
    tokio::time::sleep(Duration::from_millis(100)).await;
    if let Some(info) = surface.last() {
        println!(
            "   Now playing: {} — {}",
            info.title.as_deref().unwrap_or("-"),
            info.artist.as_deref().unwrap_or("-"),
        );
    }

    println!("\n🔈 Audio route falls back to the built-in speaker");
    routes.set(AudioRoute::BuiltInSpeaker);
    watch.wait_for(|s| *s == streamwatch::PipelineState::Paused).await?;
    println!("   Pipeline: {}", pipeline.state());

    println!("\n🎧 Headphones plugged back in");
    routes.set(AudioRoute::Headphones);
    watch.wait_for(|s| *s == streamwatch::PipelineState::Playing).await?;
    println!("   Pipeline: {}", pipeline.state());

    pipeline.stop().await?;
    println!("\n✅ Demo complete ({} surface updates)", surface.published().len());
    Ok(())
}
