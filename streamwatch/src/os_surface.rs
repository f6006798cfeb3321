//! OS media-control surface
//!
//! Two-way seam to the operating system's media controls: inbound
//! [`OsMediaEvent`]s from the lock screen / now-playing widget, outbound
//! [`UnifiedNowPlayingInfo`] publications describing what the widget shows.

use crate::status::PlaybackStatus;
use parking_lot::Mutex;
use streamwatch_pipeline::PipelineState;

/// A media-control event from the OS (lock screen, widget, headset button)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OsMediaEvent {
    /// Play button
    Play,
    /// Pause button
    Pause,
    /// Combined play/pause toggle
    Toggle,
    /// Next-track button
    Next,
    /// Previous-track button
    Previous,
    /// Shuffle mode switch
    SetShuffle(bool),
}

/// What the OS media surface shows for this app
///
/// A pure function of the pipeline state and the latest remote snapshot:
/// recomputed from scratch on every input change, never patched
/// incrementally, so identical inputs always produce identical output.
#[derive(Debug, Clone, PartialEq)]
pub struct UnifiedNowPlayingInfo {
    /// Title line; absent when the monitor is stopped
    pub title: Option<String>,
    /// Artist line, doubling as the monitor status indicator
    pub artist: Option<String>,
    /// Playback rate shown to the OS; the monitor stream has no seekable
    /// timeline, so this is always 1.0
    pub playback_rate: f64,
    /// Shuffle flag for the surface's shuffle indicator
    pub shuffle: bool,
}

impl UnifiedNowPlayingInfo {
    /// Combine the pipeline state and remote snapshot into surface info
    ///
    /// A monitor that is not actively playing shows "Stopped" regardless of
    /// what the remote player is doing; fault detail never reaches the OS
    /// surface.
    pub fn compute(pipeline: PipelineState, status: &PlaybackStatus) -> Self {
        if pipeline != PipelineState::Playing {
            return Self {
                title: None,
                artist: Some("Stopped".to_string()),
                playback_rate: 1.0,
                shuffle: status.shuffle,
            };
        }

        match status.track.as_ref().filter(|_| status.is_playing()) {
            Some(track) => Self {
                title: Some(track.title.clone()),
                artist: Some(format!("Monitor & {}", track.artist)),
                playback_rate: 1.0,
                shuffle: status.shuffle,
            },
            None => Self {
                title: Some("No music".to_string()),
                artist: Some("Monitor only".to_string()),
                playback_rate: 1.0,
                shuffle: status.shuffle,
            },
        }
    }
}

/// Publication side of the OS media surface
pub trait NowPlayingSurface: Send + Sync {
    /// Replace the currently shown info
    fn publish(&self, info: &UnifiedNowPlayingInfo);
}

/// Surface that remembers everything published to it, for tests and demos
#[derive(Debug, Default)]
pub struct MemorySurface {
    published: Mutex<Vec<UnifiedNowPlayingInfo>>,
}

impl MemorySurface {
    /// Most recently published info
    pub fn last(&self) -> Option<UnifiedNowPlayingInfo> {
        self.published.lock().last().cloned()
    }

    /// Everything published so far, in order
    pub fn published(&self) -> Vec<UnifiedNowPlayingInfo> {
        self.published.lock().clone()
    }
}

impl NowPlayingSurface for MemorySurface {
    fn publish(&self, info: &UnifiedNowPlayingInfo) {
        self.published.lock().push(info.clone());
    }
}
