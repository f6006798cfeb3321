//! Pipeline controller
//!
//! The controller owns the stream graph, the dynamic router and the event
//! channel for one pipeline instance, and runs the state machine:
//!
//! ```text
//! Idle --play()--> Ready --(stream connected + first frame)--> Playing
//! Playing --pause()--> Paused --play()--> Playing
//! any state --stop()--> Idle
//! any non-Idle state --fault--> Faulted (terminal for the graph instance)
//! ```
//!
//! All mutations are dispatched onto one dedicated background task and
//! serialized; `play()`, `pause()` and `stop()` are idempotent and never
//! block the caller's context. A `Faulted` pipeline only recovers through
//! `stop()` followed by a fresh `play()`, which builds a brand new graph.

use crate::config::PipelineConfig;
use crate::error::{FaultKind, PipelineError};
use crate::event::{self, EventReceiver, EventSender, PipelineEvent};
use crate::graph::{GraphBuilder, StreamGraph};
use crate::media::{MediaFrame, MediaType};
use crate::router::{DynamicRouter, RouteEvent};
use crate::source::{SourceFactory, StreamHandle, TcpSource};
use crate::surface::{RenderSurfaceHandle, SurfaceBinding};
use std::fmt;
use tokio::sync::{broadcast, mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info, trace, warn};

/// Pipeline lifecycle state, ordered by capability
///
/// `Faulted` sits below `Idle`: a faulted graph instance can do nothing
/// until it is stopped and rebuilt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum PipelineState {
    /// Terminal fault state for the current graph instance
    Faulted,
    /// No graph exists
    Idle,
    /// Graph built, routes registered, waiting for the stream
    Ready,
    /// Decode path suspended
    Paused,
    /// Decode path active
    Playing,
}

impl fmt::Display for PipelineState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PipelineState::Faulted => write!(f, "Faulted"),
            PipelineState::Idle => write!(f, "Idle"),
            PipelineState::Ready => write!(f, "Ready"),
            PipelineState::Paused => write!(f, "Paused"),
            PipelineState::Playing => write!(f, "Playing"),
        }
    }
}

enum Command {
    Play {
        reply: oneshot::Sender<Result<(), PipelineError>>,
    },
    Pause {
        reply: oneshot::Sender<Result<(), PipelineError>>,
    },
    Stop {
        reply: oneshot::Sender<Result<(), PipelineError>>,
    },
    BindSurface {
        handle: RenderSurfaceHandle,
        reply: oneshot::Sender<Result<mpsc::UnboundedReceiver<MediaFrame>, PipelineError>>,
    },
    AttachMirror {
        reply: oneshot::Sender<Result<broadcast::Receiver<MediaFrame>, PipelineError>>,
    },
    UnbindSurface {
        reply: oneshot::Sender<Result<(), PipelineError>>,
    },
}

/// Messages from the source I/O task, generation-tagged so anything from a
/// torn-down graph is discarded instead of acted on.
enum SourceMessage {
    Announced {
        generation: u64,
        media: MediaType,
        handle: StreamHandle,
    },
    Packet {
        generation: u64,
        packet: crate::media::MediaPacket,
    },
    EndOfStream {
        generation: u64,
    },
    TransportFailed {
        generation: u64,
        reason: String,
    },
}

/// Handle to a running pipeline controller
///
/// Cheap to clone; all clones talk to the same background task.
#[derive(Clone)]
pub struct PipelineController {
    cmd_tx: mpsc::UnboundedSender<Command>,
    state_rx: watch::Receiver<PipelineState>,
}

impl PipelineController {
    /// Spawn a controller that reads from a TCP source
    pub fn spawn(config: PipelineConfig) -> Self {
        let source_config = config.clone();
        let factory: SourceFactory =
            std::sync::Arc::new(move || Box::new(TcpSource::new(&source_config)));
        Self::spawn_with_source(config, factory)
    }

    /// Spawn a controller with a custom source factory
    ///
    /// The factory is invoked once per `play()`; sources are never reused
    /// across stop/start cycles.
    pub fn spawn_with_source(config: PipelineConfig, factory: SourceFactory) -> Self {
        let (cmd_tx, cmd_rx) = mpsc::unbounded_channel();
        let (state_tx, state_rx) = watch::channel(PipelineState::Idle);
        let (events, event_rx) = event::channel();
        let (source_tx, source_rx) = mpsc::unbounded_channel();

        let engine = Engine {
            config,
            factory,
            cmd_rx,
            state_tx,
            state: PipelineState::Idle,
            events,
            event_rx,
            source_tx,
            source_rx,
            graph: None,
            router: DynamicRouter::new(),
            surface: None,
            io_task: None,
        };
        tokio::spawn(engine.run());

        Self { cmd_tx, state_rx }
    }

    /// Start playback, building a fresh graph if the pipeline is idle
    ///
    /// Returns once the graph is built and routes are registered; the
    /// transition to `Playing` happens asynchronously when the stream
    /// connects and the first frame decodes. No-op when already `Ready`,
    /// `Playing`, or `Faulted`.
    pub async fn play(&self) -> Result<(), PipelineError> {
        self.request(|reply| Command::Play { reply }).await
    }

    /// Suspend the decode path; no-op unless `Playing`
    pub async fn pause(&self) -> Result<(), PipelineError> {
        self.request(|reply| Command::Pause { reply }).await
    }

    /// Tear the pipeline down to `Idle`; safe from any state
    pub async fn stop(&self) -> Result<(), PipelineError> {
        self.request(|reply| Command::Stop { reply }).await
    }

    /// Bind a render surface to the video sink
    ///
    /// Only valid once the video sink stage exists (state at least
    /// `Ready`); must be re-issued after every `play()` since stages are
    /// recreated. Returns the stream of decoded frames for the surface.
    pub async fn bind_surface(
        &self,
        handle: RenderSurfaceHandle,
    ) -> Result<mpsc::UnboundedReceiver<MediaFrame>, PipelineError> {
        self.request(|reply| Command::BindSurface { handle, reply })
            .await
    }

    /// Attach a picture-in-picture mirror to the bound surface
    pub async fn attach_mirror(
        &self,
    ) -> Result<broadcast::Receiver<MediaFrame>, PipelineError> {
        self.request(|reply| Command::AttachMirror { reply }).await
    }

    /// Release the render surface binding
    ///
    /// Must be called before the owning surface is deallocated or before
    /// `stop()`, whichever comes first.
    pub async fn unbind_surface(&self) -> Result<(), PipelineError> {
        self.request(|reply| Command::UnbindSurface { reply }).await
    }

    /// Current pipeline state
    pub fn state(&self) -> PipelineState {
        *self.state_rx.borrow()
    }

    /// Watch channel publishing every state transition
    pub fn watch_state(&self) -> watch::Receiver<PipelineState> {
        self.state_rx.clone()
    }

    async fn request<T>(
        &self,
        make: impl FnOnce(oneshot::Sender<Result<T, PipelineError>>) -> Command,
    ) -> Result<T, PipelineError> {
        let (reply, rx) = oneshot::channel();
        self.cmd_tx
            .send(make(reply))
            .map_err(|_| PipelineError::ControllerGone)?;
        rx.await.map_err(|_| PipelineError::ControllerGone)?
    }
}

impl fmt::Debug for PipelineController {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PipelineController")
            .field("state", &self.state())
            .finish()
    }
}

/// The dedicated background execution context: owns the graph and
/// serializes every mutation against it.
struct Engine {
    config: PipelineConfig,
    factory: SourceFactory,
    cmd_rx: mpsc::UnboundedReceiver<Command>,
    state_tx: watch::Sender<PipelineState>,
    state: PipelineState,
    events: EventSender,
    event_rx: EventReceiver,
    source_tx: mpsc::UnboundedSender<SourceMessage>,
    source_rx: mpsc::UnboundedReceiver<SourceMessage>,
    graph: Option<StreamGraph>,
    router: DynamicRouter,
    surface: Option<SurfaceBinding>,
    io_task: Option<JoinHandle<()>>,
}

enum Next {
    Command(Option<Command>),
    Event(PipelineEvent),
    Source(SourceMessage),
}

impl Engine {
    async fn run(mut self) {
        loop {
            let next = tokio::select! {
                cmd = self.cmd_rx.recv() => Next::Command(cmd),
                Some(event) = self.event_rx.recv() => Next::Event(event),
                Some(msg) = self.source_rx.recv() => Next::Source(msg),
            };
            match next {
                Next::Command(Some(cmd)) => self.handle_command(cmd),
                Next::Command(None) => {
                    // Every controller handle is gone; tear down and exit.
                    self.do_stop();
                    break;
                }
                Next::Event(event) => self.handle_event(event),
                Next::Source(msg) => self.handle_source_message(msg),
            }
        }
    }

    fn handle_command(&mut self, cmd: Command) {
        match cmd {
            Command::Play { reply } => {
                let result = match self.state {
                    PipelineState::Playing | PipelineState::Ready => Ok(()),
                    PipelineState::Paused => {
                        self.set_state(PipelineState::Playing);
                        Ok(())
                    }
                    PipelineState::Faulted => {
                        warn!("play() ignored on faulted pipeline; stop() it first");
                        Ok(())
                    }
                    PipelineState::Idle => self.start_pipeline(),
                };
                let _ = reply.send(result);
            }
            Command::Pause { reply } => {
                if self.state == PipelineState::Playing {
                    self.set_state(PipelineState::Paused);
                }
                let _ = reply.send(Ok(()));
            }
            Command::Stop { reply } => {
                self.do_stop();
                let _ = reply.send(Ok(()));
            }
            Command::BindSurface { handle, reply } => {
                let _ = reply.send(self.bind_surface(handle));
            }
            Command::AttachMirror { reply } => {
                let result = match self.surface.as_mut() {
                    Some(binding) => Ok(binding.attach_mirror()),
                    None => Err(PipelineError::InvalidState {
                        reason: "no render surface bound".to_string(),
                    }),
                };
                let _ = reply.send(result);
            }
            Command::UnbindSurface { reply } => {
                self.surface = None;
                let _ = reply.send(Ok(()));
            }
        }
    }

    fn start_pipeline(&mut self) -> Result<(), PipelineError> {
        let graph = GraphBuilder::build(&self.config)?;
        let generation = graph.generation();
        self.graph = Some(graph);
        self.router = DynamicRouter::new();
        self.spawn_source(generation);
        self.set_state(PipelineState::Ready);
        Ok(())
    }

    fn spawn_source(&mut self, generation: u64) {
        let mut source = (self.factory)();
        let tx = self.source_tx.clone();
        let latency = self.config.latency;

        self.io_task = Some(tokio::spawn(async move {
            let announced = match tokio::time::timeout(latency, source.connect()).await {
                Err(_) => {
                    let _ = tx.send(SourceMessage::TransportFailed {
                        generation,
                        reason: PipelineError::ConnectTimeout { budget: latency }.to_string(),
                    });
                    return;
                }
                Ok(Err(e)) => {
                    let _ = tx.send(SourceMessage::TransportFailed {
                        generation,
                        reason: e.to_string(),
                    });
                    return;
                }
                Ok(Ok(announced)) => announced,
            };

            for media in announced {
                let _ = tx.send(SourceMessage::Announced {
                    generation,
                    media,
                    handle: StreamHandle::new(generation),
                });
            }

            loop {
                match source.next_packet().await {
                    Ok(Some(packet)) => {
                        if tx.send(SourceMessage::Packet { generation, packet }).is_err() {
                            break;
                        }
                    }
                    Ok(None) => {
                        let _ = tx.send(SourceMessage::EndOfStream { generation });
                        break;
                    }
                    Err(e) => {
                        let _ = tx.send(SourceMessage::TransportFailed {
                            generation,
                            reason: e.to_string(),
                        });
                        break;
                    }
                }
            }
        }));
    }

    fn handle_source_message(&mut self, msg: SourceMessage) {
        let live_generation = match &self.graph {
            Some(graph) => graph.generation(),
            None => {
                trace!("source message after teardown discarded");
                return;
            }
        };

        match msg {
            SourceMessage::Announced {
                generation,
                media,
                handle,
            } => {
                if generation != live_generation {
                    trace!(generation, "stale announcement discarded");
                    return;
                }
                let Some(graph) = self.graph.as_mut() else {
                    return;
                };
                match self.router.on_stream_announced(graph, media, handle) {
                    RouteEvent::Connected { media, .. } => {
                        info!(%media, "sub-stream connected to branch");
                    }
                    RouteEvent::Ignored { media, reason } => {
                        debug!(%media, ?reason, "sub-stream announcement ignored");
                    }
                    RouteEvent::Failed { media, reason } => {
                        // Non-fatal: one unroutable sub-stream must not take
                        // down its siblings.
                        warn!(%media, %reason, "sub-stream failed to connect");
                    }
                    RouteEvent::Stale { generation } => {
                        trace!(generation, "stale route discarded");
                    }
                }
            }
            SourceMessage::Packet { generation, packet } => {
                if generation != live_generation {
                    return;
                }
                if self.state != PipelineState::Playing && self.state != PipelineState::Ready {
                    return;
                }
                let result = {
                    let Some(graph) = self.graph.as_mut() else {
                        return;
                    };
                    graph.process_packet(packet)
                };
                match result {
                    Ok(Some(frame)) => {
                        if self.state == PipelineState::Ready {
                            // Stream connected and the first frame decoded.
                            self.events
                                .send(PipelineEvent::StateChanged(PipelineState::Playing));
                        }
                        self.deliver(frame);
                    }
                    Ok(None) => {}
                    Err(fault) => self.events.send(PipelineEvent::Fault(fault)),
                }
            }
            SourceMessage::EndOfStream { generation } => {
                if generation == live_generation {
                    self.events.send(PipelineEvent::Fault(FaultKind::EndOfStream));
                }
            }
            SourceMessage::TransportFailed { generation, reason } => {
                if generation == live_generation {
                    warn!(%reason, "source transport failed");
                    self.events
                        .send(PipelineEvent::Fault(FaultKind::TransportError));
                }
            }
        }
    }

    fn handle_event(&mut self, event: PipelineEvent) {
        match event {
            PipelineEvent::StateChanged(state) => self.set_state(state),
            PipelineEvent::Fault(kind) => {
                if self.state == PipelineState::Idle {
                    return;
                }
                if kind.is_failure() {
                    warn!(%kind, "pipeline faulted");
                } else {
                    info!("source reached end of stream");
                }
                if let Some(task) = self.io_task.take() {
                    task.abort();
                }
                self.set_state(PipelineState::Faulted);
            }
        }
    }

    fn deliver(&mut self, frame: MediaFrame) {
        match frame.media {
            MediaType::Video => {
                if let Some(surface) = &self.surface {
                    surface.deliver(&frame);
                }
            }
            MediaType::Audio => {
                trace!(pts = frame.pts, bytes = frame.payload.len(), "audio frame rendered");
            }
        }
    }

    fn bind_surface(
        &mut self,
        handle: RenderSurfaceHandle,
    ) -> Result<mpsc::UnboundedReceiver<MediaFrame>, PipelineError> {
        if self.state < PipelineState::Ready {
            return Err(PipelineError::InvalidState {
                reason: format!("cannot bind surface in state {}", self.state),
            });
        }
        let has_video = self
            .graph
            .as_ref()
            .is_some_and(|g| g.has_branch(MediaType::Video));
        if !has_video {
            return Err(PipelineError::InvalidState {
                reason: "no video branch built for this pipeline".to_string(),
            });
        }
        let (binding, frames) = SurfaceBinding::bind(handle);
        self.surface = Some(binding);
        Ok(frames)
    }

    /// Tear down in strict order: unbind the render surface, stop and
    /// unlink all stages, release the source, release the event channel.
    fn do_stop(&mut self) {
        self.surface = None;
        if let Some(task) = self.io_task.take() {
            task.abort();
        }
        if let Some(mut graph) = self.graph.take() {
            graph.teardown();
        }
        let (events, event_rx) = event::channel();
        self.events = events;
        self.event_rx = event_rx;
        self.set_state(PipelineState::Idle);
    }

    fn set_state(&mut self, state: PipelineState) {
        if self.state != state {
            debug!(from = %self.state, to = %state, "pipeline state changed");
            self.state = state;
            let _ = self.state_tx.send(state);
        }
    }
}
