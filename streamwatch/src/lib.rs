//! # StreamWatch - Live Audio/Video Monitor
//!
//! StreamWatch keeps a low-latency monitoring stream (think nursery camera
//! audio) running on a device while the same device plays music from a
//! remote player, and reconciles the two through the operating system's
//! media controls.
//!
//! ## Key Pieces
//!
//! - **Pipeline controller** (`streamwatch-pipeline`): builds the stream
//!   graph, routes late-announced sub-streams, owns the playback state
//!   machine
//! - **Playback state mediator**: merges pipeline state, the remote status
//!   feed, OS media events and audio route changes into one consistent
//!   now-playing publication and the right commands to each collaborator
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use streamwatch::{
//!     AudioRoute, Mediator, MediatorInputs, MemorySurface, MonitorConfig, NullRemote,
//!     OutputRouteMonitor, PipelineController,
//! };
//! use tokio::sync::mpsc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     streamwatch::logging::init();
//!
//!     let config = MonitorConfig::audio_monitor("10.0.0.12:8554");
//!     let pipeline = PipelineController::spawn(config.pipeline.clone());
//!
//!     let routes = OutputRouteMonitor::new(AudioRoute::Bluetooth);
//!     let (_status_tx, status) = mpsc::unbounded_channel();
//!     let (_os_tx, os_events) = mpsc::unbounded_channel();
//!     let (_cmd_tx, commands) = mpsc::unbounded_channel();
//!
//!     let mediator = Mediator::new(
//!         pipeline.clone(),
//!         Arc::new(NullRemote),
//!         Arc::new(MemorySurface::default()),
//!         config.pause_on_speaker,
//!     );
//!     tokio::spawn(mediator.run(MediatorInputs {
//!         status,
//!         os_events,
//!         commands,
//!         routes: routes.subscribe(),
//!     }));
//!
//!     pipeline.play().await?;
//!     Ok(())
//! }
//! ```

#![deny(missing_docs)]
#![warn(clippy::all)]

pub mod config;
pub mod error;
pub mod logging;
pub mod mediator;
pub mod os_surface;
pub mod remote;
pub mod route;
pub mod status;

// Re-export main types
pub use config::MonitorConfig;
pub use error::MediatorError;
pub use mediator::{Mediator, MediatorInputs};
pub use os_surface::{MemorySurface, NowPlayingSurface, OsMediaEvent, UnifiedNowPlayingInfo};
pub use remote::{NullRemote, RecordingRemote, RemoteCommand, RemoteControl};
pub use route::{AudioRoute, OutputRouteMonitor};
pub use status::{PlaybackStatus, PlayerMode, SseDecoder, TrackInfo};

// Re-export the pipeline crate's main types
pub use streamwatch_pipeline::{
    FaultKind, MediaFrame, MediaPacket, MediaType, PipelineConfig, PipelineController,
    PipelineError, PipelineEvent, PipelineState, RenderSurfaceHandle, ScriptedSource,
};
