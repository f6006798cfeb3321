//! Mediator error types

use thiserror::Error;

/// Main error type for the monitor facade
#[derive(Error, Debug)]
pub enum MediatorError {
    /// The remote music service rejected or lost a command
    #[error("remote command failed: {reason}")]
    Remote {
        /// Failure reason
        reason: String,
    },

    /// A status feed record could not be decoded
    #[error("malformed status record: {source}")]
    MalformedStatus {
        /// Underlying decode error
        #[from]
        source: serde_json::Error,
    },

    /// Pipeline operation failed
    #[error("pipeline error: {source}")]
    Pipeline {
        /// Underlying pipeline error
        #[from]
        source: streamwatch_pipeline::PipelineError,
    },
}
