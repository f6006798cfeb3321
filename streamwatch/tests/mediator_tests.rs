//! Mediator reconciliation tests with in-memory collaborators

use bytes::Bytes;
use std::sync::Arc;
use std::time::Duration;
use streamwatch::{
    AudioRoute, MediaPacket, MediaType, Mediator, MediatorInputs, MemorySurface, MonitorConfig,
    OsMediaEvent, OutputRouteMonitor, PipelineController, PipelineState, PlaybackStatus,
    PlayerMode, RecordingRemote, RemoteCommand, ScriptedSource, TrackInfo,
};
use tokio::sync::mpsc;

const ADDRESS: &str = "10.0.0.12:8554";

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

fn steady_audio_script() -> ScriptedSource {
    let mut script = ScriptedSource::new().announce(MediaType::Audio);
    for pts in 0..5 {
        script = script.packet(aac_packet(pts));
    }
    script.delay(Duration::from_secs(60))
}

fn playing_status() -> PlaybackStatus {
    PlaybackStatus {
        mode: PlayerMode::Playing,
        shuffle: false,
        sleep_timer: None,
        track: Some(TrackInfo {
            title: "An Ending".to_string(),
            artist: "Brian Eno".to_string(),
            artwork_url: "http://x/a.jpg".to_string(),
        }),
    }
}

struct Fixture {
    pipeline: PipelineController,
    remote: Arc<RecordingRemote>,
    surface: Arc<MemorySurface>,
    status_tx: mpsc::UnboundedSender<PlaybackStatus>,
    os_tx: mpsc::UnboundedSender<OsMediaEvent>,
    cmd_tx: mpsc::UnboundedSender<RemoteCommand>,
    routes: OutputRouteMonitor,
}

impl Fixture {
    fn spawn(script: ScriptedSource) -> Self {
        let config = MonitorConfig::audio_monitor(ADDRESS);
        let pipeline =
            PipelineController::spawn_with_source(config.pipeline.clone(), script.into_factory());
        let remote = Arc::new(RecordingRemote::default());
        let surface = Arc::new(MemorySurface::default());
        let routes = OutputRouteMonitor::new(AudioRoute::Bluetooth);

        let (status_tx, status) = mpsc::unbounded_channel();
        let (os_tx, os_events) = mpsc::unbounded_channel();
        let (cmd_tx, commands) = mpsc::unbounded_channel();

        let mediator = Mediator::new(
            pipeline.clone(),
            remote.clone(),
            surface.clone(),
            config.pause_on_speaker,
        );
        tokio::spawn(mediator.run(MediatorInputs {
            status,
            os_events,
            commands,
            routes: routes.subscribe(),
        }));

        Self {
            pipeline,
            remote,
            surface,
            status_tx,
            os_tx,
            cmd_tx,
            routes,
        }
    }

    async fn wait_pipeline(&self, target: PipelineState) {
        let mut watch = self.pipeline.watch_state();
        tokio::time::timeout(Duration::from_secs(5), watch.wait_for(|s| *s == target))
            .await
            .expect("timed out waiting for pipeline state")
            .expect("pipeline controller gone");
    }

    /// Poll until the condition holds; panics after five seconds.
    async fn eventually(&self, what: &str, condition: impl Fn() -> bool) {
        for _ in 0..500 {
            if condition() {
                return;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("condition never held: {what}");
    }
}

#[tokio::test]
async fn os_play_starts_idle_pipeline_without_remote_command() {
    let fixture = Fixture::spawn(steady_audio_script());

    fixture.os_tx.send(OsMediaEvent::Play).unwrap();
    fixture.wait_pipeline(PipelineState::Playing).await;
    assert!(fixture.remote.sent().is_empty());
}

#[tokio::test]
async fn os_play_on_running_pipeline_plays_the_music_instead() {
    let fixture = Fixture::spawn(steady_audio_script());

    fixture.os_tx.send(OsMediaEvent::Play).unwrap();
    fixture.wait_pipeline(PipelineState::Playing).await;

    fixture.os_tx.send(OsMediaEvent::Play).unwrap();
    fixture
        .eventually("remote Play issued", || {
            fixture.remote.sent() == vec![RemoteCommand::Play]
        })
        .await;
    assert_eq!(fixture.pipeline.state(), PipelineState::Playing);
}

#[tokio::test]
async fn os_pause_toggles_remote_never_the_pipeline() {
    let fixture = Fixture::spawn(steady_audio_script());
    fixture.os_tx.send(OsMediaEvent::Play).unwrap();
    fixture.wait_pipeline(PipelineState::Playing).await;

    // Remote is not playing: pause toggles it on.
    fixture.os_tx.send(OsMediaEvent::Pause).unwrap();
    fixture
        .eventually("toggle on", || {
            fixture.remote.sent() == vec![RemoteCommand::Play]
        })
        .await;

    // Remote now playing: pause toggles it off.
    fixture.status_tx.send(playing_status()).unwrap();
    fixture.os_tx.send(OsMediaEvent::Pause).unwrap();
    fixture
        .eventually("toggle off", || {
            fixture.remote.sent() == vec![RemoteCommand::Play, RemoteCommand::Pause]
        })
        .await;

    // The monitor pipeline was never touched.
    assert_eq!(fixture.pipeline.state(), PipelineState::Playing);
}

#[tokio::test]
async fn os_next_plays_when_remote_is_not_playing() {
    let fixture = Fixture::spawn(steady_audio_script());

    fixture.os_tx.send(OsMediaEvent::Next).unwrap();
    fixture
        .eventually("remote Play issued", || {
            fixture.remote.sent() == vec![RemoteCommand::Play]
        })
        .await;

    fixture.status_tx.send(playing_status()).unwrap();
    fixture.os_tx.send(OsMediaEvent::Next).unwrap();
    fixture
        .eventually("remote Next issued", || {
            fixture.remote.sent() == vec![RemoteCommand::Play, RemoteCommand::Next]
        })
        .await;
}

#[tokio::test]
async fn os_previous_is_a_literal_previous() {
    let fixture = Fixture::spawn(steady_audio_script());

    fixture.os_tx.send(OsMediaEvent::Previous).unwrap();
    fixture
        .eventually("remote Previous issued", || {
            fixture.remote.sent() == vec![RemoteCommand::Previous]
        })
        .await;
}

#[tokio::test]
async fn shuffle_passes_through_to_the_remote() {
    let fixture = Fixture::spawn(steady_audio_script());

    fixture.os_tx.send(OsMediaEvent::SetShuffle(true)).unwrap();
    fixture
        .eventually("shuffle forwarded", || {
            fixture.remote.sent() == vec![RemoteCommand::SetShuffle(true)]
        })
        .await;
}

#[tokio::test]
async fn sleep_timer_passes_through_to_the_remote() {
    let fixture = Fixture::spawn(steady_audio_script());

    fixture
        .cmd_tx
        .send(RemoteCommand::SetSleepTimer(1800))
        .unwrap();
    fixture
        .eventually("sleep timer forwarded", || {
            fixture.remote.sent() == vec![RemoteCommand::SetSleepTimer(1800)]
        })
        .await;
}

#[tokio::test]
async fn speaker_route_pauses_external_route_resumes() {
    let fixture = Fixture::spawn(steady_audio_script());
    fixture.os_tx.send(OsMediaEvent::Play).unwrap();
    fixture.wait_pipeline(PipelineState::Playing).await;

    fixture.routes.set(AudioRoute::BuiltInSpeaker);
    fixture.wait_pipeline(PipelineState::Paused).await;

    fixture.routes.set(AudioRoute::Headphones);
    fixture.wait_pipeline(PipelineState::Playing).await;
}

#[tokio::test]
async fn stopped_snapshot_yields_monitor_only_info_without_fault() {
    let fixture = Fixture::spawn(steady_audio_script());
    fixture.os_tx.send(OsMediaEvent::Play).unwrap();
    fixture.wait_pipeline(PipelineState::Playing).await;

    fixture.status_tx.send(PlaybackStatus::default()).unwrap();
    fixture
        .eventually("monitor-only info published", || {
            fixture
                .surface
                .last()
                .is_some_and(|info| info.artist.as_deref() == Some("Monitor only"))
        })
        .await;
    assert_eq!(fixture.pipeline.state(), PipelineState::Playing);
}

#[tokio::test]
async fn playing_track_shows_monitor_prefix() {
    let fixture = Fixture::spawn(steady_audio_script());
    fixture.os_tx.send(OsMediaEvent::Play).unwrap();
    fixture.wait_pipeline(PipelineState::Playing).await;

    fixture.status_tx.send(playing_status()).unwrap();
    fixture
        .eventually("combined info published", || {
            fixture.surface.last().is_some_and(|info| {
                info.artist.as_deref() == Some("Monitor & Brian Eno")
                    && info.title.as_deref() == Some("An Ending")
            })
        })
        .await;
}

#[tokio::test]
async fn end_of_stream_publishes_stopped_and_play_recovers() {
    // Two packets then end of stream; every later play() replays the same
    // script, so only the recovery transition is asserted.
    let script = ScriptedSource::new()
        .announce(MediaType::Audio)
        .packet(aac_packet(0))
        .packet(aac_packet(1));
    let fixture = Fixture::spawn(script);

    fixture.os_tx.send(OsMediaEvent::Play).unwrap();
    fixture.wait_pipeline(PipelineState::Faulted).await;
    fixture
        .eventually("stopped info published", || {
            fixture
                .surface
                .last()
                .is_some_and(|info| info.artist.as_deref() == Some("Stopped"))
        })
        .await;
    // No retry happened on its own.
    assert!(fixture.remote.sent().is_empty());

    // The user pressing play is the conscious recovery decision. The
    // replayed script ends again, so the proof of recovery is the
    // monitor-only publication recorded while the fresh graph played.
    fixture.os_tx.send(OsMediaEvent::Play).unwrap();
    fixture
        .eventually("fresh graph reached Playing", || {
            fixture
                .surface
                .published()
                .iter()
                .any(|info| info.artist.as_deref() == Some("Monitor only"))
        })
        .await;
}
