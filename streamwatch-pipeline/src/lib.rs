//! # StreamWatch Pipeline
//!
//! Media pipeline controller for a live audio/video monitoring stream.
//! This crate builds and owns the per-session stream graph (source,
//! depacketizers, parsers, decoders, sinks), routes late-announced
//! sub-streams into it, and runs the playback state machine behind an
//! async [`PipelineController`] handle.

#![deny(missing_docs)]
#![warn(clippy::all)]

pub mod config;
pub mod controller;
pub mod error;
pub mod event;
pub mod graph;
pub mod media;
pub mod router;
pub mod source;
pub mod surface;

// Re-export main types
pub use config::{BranchConfig, PipelineConfig, TransportMode};
pub use controller::{PipelineController, PipelineState};
pub use error::{FaultKind, PipelineError};
pub use event::{EventReceiver, EventSender, PipelineEvent};
pub use graph::{Branch, GraphBuilder, Stage, StageId, StageKind, StreamGraph};
pub use media::{Codec, MediaFrame, MediaPacket, MediaType};
pub use router::{DynamicRouter, IgnoreReason, RouteEvent};
pub use source::{MediaSource, ScriptedSource, ScriptedStep, SourceFactory, StreamHandle, TcpSource};
pub use surface::{RenderSurfaceHandle, SurfaceBinding};
