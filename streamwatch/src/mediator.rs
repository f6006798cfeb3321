//! Playback state mediator
//!
//! The mediator sits between four independent asynchronous producers — the
//! pipeline state watch, the remote status feed, OS media-control events
//! and audio route changes — and two consumers, the pipeline controller
//! and the remote music service. All inputs are delivered serially to one
//! task, so reconciliation never races against itself; the precedence
//! rules below make the outcome well-defined regardless of arrival order.
//!
//! After every processed input the [`UnifiedNowPlayingInfo`] is recomputed
//! and republished before the next input is taken, so observers never see
//! an intermediate inconsistent state.

use crate::os_surface::{NowPlayingSurface, OsMediaEvent, UnifiedNowPlayingInfo};
use crate::remote::{RemoteCommand, RemoteControl};
use crate::route::AudioRoute;
use crate::status::PlaybackStatus;
use std::sync::Arc;
use streamwatch_pipeline::{PipelineController, PipelineState};
use tokio::sync::{mpsc, watch};
use tracing::{debug, info, warn};

/// Input channels feeding the mediator task
pub struct MediatorInputs {
    /// Decoded snapshots from the remote status feed
    pub status: mpsc::UnboundedReceiver<PlaybackStatus>,
    /// Media-control events from the OS surface
    pub os_events: mpsc::UnboundedReceiver<OsMediaEvent>,
    /// App-level passthrough commands for the remote service
    /// (sleep timer arming has no OS event bound to it)
    pub commands: mpsc::UnboundedReceiver<RemoteCommand>,
    /// Audio output route changes
    pub routes: watch::Receiver<AudioRoute>,
}

/// Reconciles pipeline, remote player, OS surface and audio route
pub struct Mediator {
    pipeline: PipelineController,
    remote: Arc<dyn RemoteControl>,
    surface: Arc<dyn NowPlayingSurface>,
    pause_on_speaker: bool,
    status: PlaybackStatus,
}

impl Mediator {
    /// Create a mediator over the given collaborators
    pub fn new(
        pipeline: PipelineController,
        remote: Arc<dyn RemoteControl>,
        surface: Arc<dyn NowPlayingSurface>,
        pause_on_speaker: bool,
    ) -> Self {
        Self {
            pipeline,
            remote,
            surface,
            pause_on_speaker,
            status: PlaybackStatus::default(),
        }
    }

    /// Run the reconciliation loop until an input side closes
    pub async fn run(mut self, mut inputs: MediatorInputs) {
        let mut pipeline_state = self.pipeline.watch_state();
        self.republish();

        loop {
            tokio::select! {
                changed = pipeline_state.changed() => {
                    if changed.is_err() {
                        break;
                    }
                    let state = *pipeline_state.borrow_and_update();
                    self.on_pipeline_state(state);
                }
                snapshot = inputs.status.recv() => match snapshot {
                    Some(snapshot) => self.on_status(snapshot),
                    None => break,
                },
                event = inputs.os_events.recv() => match event {
                    Some(event) => self.on_os_event(event).await,
                    None => break,
                },
                command = inputs.commands.recv() => match command {
                    Some(command) => self.send_remote(command).await,
                    None => break,
                },
                changed = inputs.routes.changed() => {
                    if changed.is_err() {
                        break;
                    }
                    let route = *inputs.routes.borrow_and_update();
                    self.on_route_change(route).await;
                }
            }
            self.republish();
        }
        info!("mediator shutting down");
    }

    fn on_pipeline_state(&mut self, state: PipelineState) {
        // End of stream surfaces as Faulted too; the distinction was
        // already logged by the pipeline and the OS surface only ever sees
        // "Stopped". Recovery is a conscious user decision, never a retry.
        debug!(%state, "pipeline state input");
    }

    fn on_status(&mut self, snapshot: PlaybackStatus) {
        debug!(mode = ?snapshot.mode, "remote status input");
        self.status = snapshot;
    }

    /// Apply the precedence rules for one OS media-control event
    ///
    /// The pipeline output is monitoring audio, not user media: the play
    /// button starts the monitor only when nothing is running, and the
    /// pause button never touches the monitor at all.
    async fn on_os_event(&mut self, event: OsMediaEvent) {
        debug!(?event, "os media event input");
        match event {
            OsMediaEvent::Play => {
                match self.pipeline.state() {
                    PipelineState::Idle | PipelineState::Faulted => {
                        if self.pipeline.state() == PipelineState::Faulted {
                            // A fresh graph needs a stop() first.
                            if let Err(e) = self.pipeline.stop().await {
                                warn!(error = %e, "pipeline stop failed");
                                return;
                            }
                        }
                        if let Err(e) = self.pipeline.play().await {
                            warn!(error = %e, "pipeline play failed");
                        }
                    }
                    // A running pipeline takes priority; play the music.
                    _ => self.send_remote(RemoteCommand::Play).await,
                }
            }
            OsMediaEvent::Pause | OsMediaEvent::Toggle => {
                // Both buttons toggle the remote playback.
                if self.status.is_playing() {
                    self.send_remote(RemoteCommand::Pause).await;
                } else {
                    self.send_remote(RemoteCommand::Play).await;
                }
            }
            OsMediaEvent::Next => {
                if self.status.is_playing() {
                    self.send_remote(RemoteCommand::Next).await;
                } else {
                    self.send_remote(RemoteCommand::Play).await;
                }
            }
            OsMediaEvent::Previous => {
                self.send_remote(RemoteCommand::Previous).await;
            }
            OsMediaEvent::SetShuffle(shuffle) => {
                self.send_remote(RemoteCommand::SetShuffle(shuffle)).await;
            }
        }
    }

    async fn on_route_change(&mut self, route: AudioRoute) {
        info!(route = route.describe(), "audio route input");
        let state = self.pipeline.state();
        if !route.is_external() && state == PipelineState::Playing && self.pause_on_speaker {
            info!("pausing monitor on built-in speaker");
            if let Err(e) = self.pipeline.pause().await {
                warn!(error = %e, "pipeline pause failed");
            }
        } else if route.is_external() && state == PipelineState::Paused {
            info!("resuming monitor on external route");
            if let Err(e) = self.pipeline.play().await {
                warn!(error = %e, "pipeline play failed");
            }
        }
    }

    async fn send_remote(&self, command: RemoteCommand) {
        debug!(endpoint = command.endpoint(), "issuing remote command");
        if let Err(e) = self.remote.send(command).await {
            // The remote service being down must not take the monitor with
            // it.
            warn!(error = %e, "remote command failed");
        }
    }

    fn republish(&self) {
        let info = UnifiedNowPlayingInfo::compute(self.pipeline.state(), &self.status);
        self.surface.publish(&info);
    }
}
