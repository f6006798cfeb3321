//! Monitor configuration

use streamwatch_pipeline::PipelineConfig;

/// Top-level configuration for the monitor
#[derive(Debug, Clone)]
pub struct MonitorConfig {
    /// Pipeline configuration (source address, transport, branches)
    pub pipeline: PipelineConfig,
    /// Pause the monitor when audio output falls back to the built-in
    /// speaker
    pub pause_on_speaker: bool,
}

impl MonitorConfig {
    /// Audio-only monitor against the given source address, with the
    /// deployment defaults: TCP transport, 2 s latency budget, pause on
    /// speaker enabled.
    pub fn audio_monitor(address: impl Into<String>) -> Self {
        Self {
            pipeline: PipelineConfig::audio_monitor(address),
            pause_on_speaker: true,
        }
    }

    /// Audio plus video monitor against the given source address
    pub fn audio_video(address: impl Into<String>) -> Self {
        Self {
            pipeline: PipelineConfig::audio_video(address),
            pause_on_speaker: true,
        }
    }
}
