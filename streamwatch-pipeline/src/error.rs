//! Pipeline error types
//!
//! Build-time and route-level errors are returned synchronously to the
//! caller as [`PipelineError`]; runtime faults travel asynchronously on the
//! event channel as [`FaultKind`] and move the pipeline to `Faulted`.

use crate::graph::StageKind;
use crate::media::MediaType;
use std::time::Duration;
use thiserror::Error;

/// Main error type for pipeline operations
#[derive(Error, Debug)]
pub enum PipelineError {
    /// Graph construction failed before the pipeline reached `Ready`
    #[error("graph build failed at {stage} stage: {reason}")]
    Build {
        /// Stage that failed to construct or link
        stage: StageKind,
        /// Failure reason
        reason: String,
    },

    /// A sub-stream could not be connected to its branch
    #[error("routing {media} stream failed: {reason}")]
    Route {
        /// Media type of the unroutable sub-stream
        media: MediaType,
        /// Failure reason
        reason: String,
    },

    /// Operation is not valid in the pipeline's current state
    #[error("invalid state: {reason}")]
    InvalidState {
        /// What was expected and what was found
        reason: String,
    },

    /// Transport-level failure while talking to the source
    #[error("transport error: {reason}")]
    Transport {
        /// Failure reason
        reason: String,
    },

    /// Connection was not established within the latency budget
    #[error("connection not established within {budget:?}")]
    ConnectTimeout {
        /// Configured latency budget
        budget: Duration,
    },

    /// The controller background task is gone
    #[error("pipeline controller is no longer running")]
    ControllerGone,

    /// I/O failure on the network source
    #[error("I/O error: {source}")]
    Io {
        /// Underlying I/O error
        #[from]
        source: std::io::Error,
    },
}

/// Runtime fault kinds delivered over the pipeline event channel
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FaultKind {
    /// The source connection failed or timed out
    TransportError,
    /// A branch failed to decode its sub-stream
    DecodeError,
    /// The source reached end of stream (expected terminal condition)
    EndOfStream,
}

impl FaultKind {
    /// Whether this fault represents an actual failure
    ///
    /// End of stream is an expected terminal condition; consumers should
    /// treat it as "stopped", not "failed".
    pub fn is_failure(&self) -> bool {
        !matches!(self, FaultKind::EndOfStream)
    }
}

impl std::fmt::Display for FaultKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FaultKind::TransportError => write!(f, "transport error"),
            FaultKind::DecodeError => write!(f, "decode error"),
            FaultKind::EndOfStream => write!(f, "end of stream"),
        }
    }
}
