//! Remote control of the music service
//!
//! The mediator issues commands through the [`RemoteControl`] seam; the
//! actual HTTP plumbing to the service lives behind an implementation of
//! the trait. Tests and demos use the in-memory implementations here.

use crate::error::MediatorError;
use async_trait::async_trait;
use parking_lot::Mutex;
use tracing::info;

/// A command for the remote music service
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RemoteCommand {
    /// Start or resume playback
    Play,
    /// Pause playback
    Pause,
    /// Skip to the next track
    Next,
    /// Return to the previous track
    Previous,
    /// Enable or disable shuffle
    SetShuffle(bool),
    /// Arm the sleep timer for the given number of seconds
    SetSleepTimer(u64),
}

impl RemoteCommand {
    /// Service endpoint the command maps to
    pub fn endpoint(&self) -> &'static str {
        match self {
            RemoteCommand::Play => "play",
            RemoteCommand::Pause => "pause",
            RemoteCommand::Next => "next",
            RemoteCommand::Previous => "previous",
            RemoteCommand::SetShuffle(_) => "shuffle",
            RemoteCommand::SetSleepTimer(_) => "sleep",
        }
    }
}

/// Command channel to the remote music service
#[async_trait]
pub trait RemoteControl: Send + Sync {
    /// Deliver one command to the service
    async fn send(&self, command: RemoteCommand) -> Result<(), MediatorError>;
}

/// Remote that logs commands and discards them
///
/// Stands in when no music service is reachable, e.g. monitor-only
/// deployments and the demo.
#[derive(Debug, Default)]
pub struct NullRemote;

#[async_trait]
impl RemoteControl for NullRemote {
    async fn send(&self, command: RemoteCommand) -> Result<(), MediatorError> {
        info!(endpoint = command.endpoint(), "remote command discarded");
        Ok(())
    }
}

/// Remote that records every command it receives, for tests
#[derive(Debug, Default)]
pub struct RecordingRemote {
    sent: Mutex<Vec<RemoteCommand>>,
}

#[async_trait]
impl RemoteControl for RecordingRemote {
    async fn send(&self, command: RemoteCommand) -> Result<(), MediatorError> {
        self.sent.lock().push(command);
        Ok(())
    }
}

impl RecordingRemote {
    /// Commands received so far, in order
    pub fn sent(&self) -> Vec<RemoteCommand> {
        self.sent.lock().clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn recording_remote_keeps_order() {
        let remote = RecordingRemote::default();
        remote.send(RemoteCommand::Play).await.unwrap();
        remote.send(RemoteCommand::SetShuffle(true)).await.unwrap();
        assert_eq!(
            remote.sent(),
            vec![RemoteCommand::Play, RemoteCommand::SetShuffle(true)]
        );
    }

    #[test]
    fn endpoints_match_service_routes() {
        assert_eq!(RemoteCommand::Previous.endpoint(), "previous");
        assert_eq!(RemoteCommand::SetSleepTimer(1800).endpoint(), "sleep");
    }
}
