//! Pipeline configuration

use crate::media::{Codec, MediaType};
use std::time::Duration;

/// Transport mode for the network source
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportMode {
    /// Reliable stream transport (TCP-equivalent)
    Tcp,
    /// Unreliable datagram transport
    Udp,
}

impl Default for TransportMode {
    fn default() -> Self {
        Self::Tcp
    }
}

/// Configuration for one decode branch of the stream graph
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BranchConfig {
    /// Media type of the branch
    pub media: MediaType,
    /// Codec the branch decodes
    pub codec: Codec,
}

/// Connection and graph parameters for one pipeline instance
#[derive(Debug, Clone, PartialEq)]
pub struct PipelineConfig {
    /// Remote source address (`host:port`)
    pub address: String,
    /// Transport mode used to reach the source
    pub transport: TransportMode,
    /// Connection establishment and buffering latency budget
    ///
    /// Exceeding the budget during connection surfaces as a transport
    /// fault, not a silent stall.
    pub latency: Duration,
    /// Branches to build, one per requested media type
    pub branches: Vec<BranchConfig>,
}

impl PipelineConfig {
    /// Audio-only monitoring configuration (AAC over TCP)
    pub fn audio_monitor(address: impl Into<String>) -> Self {
        Self {
            address: address.into(),
            transport: TransportMode::Tcp,
            latency: Duration::from_secs(2),
            branches: vec![BranchConfig {
                media: MediaType::Audio,
                codec: Codec::Aac,
            }],
        }
    }

    /// Audio plus video configuration (AAC + H.264 over TCP)
    pub fn audio_video(address: impl Into<String>) -> Self {
        let mut config = Self::audio_monitor(address);
        config.branches.push(BranchConfig {
            media: MediaType::Video,
            codec: Codec::H264,
        });
        config
    }

    /// Override the connection latency budget
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }
}
