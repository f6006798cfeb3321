//! Remote music service status feed
//!
//! The music service pushes its full player state as JSON records over a
//! `text/event-stream` connection. [`PlaybackStatus`] is a complete snapshot
//! and local state is only ever mutated by applying a newer one; there is no
//! incremental patching. [`SseDecoder`] turns the raw byte chunks of the
//! feed into decoded snapshots; reconnection policy is the transport's
//! problem, not ours.

use serde::{Deserialize, Serialize};
use tracing::warn;

/// Remote player mode, as spelled in the feed's `status` field
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum PlayerMode {
    /// A track is actively playing
    Playing,
    /// A track is loaded but paused
    Paused,
    /// Nothing is loaded
    #[default]
    Stopped,
}

/// Metadata of the current track
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrackInfo {
    /// Track title
    pub title: String,
    /// Track artist
    pub artist: String,
    /// URL of the artwork image
    pub artwork_url: String,
}

/// One full snapshot of the remote player state
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct PlaybackStatus {
    /// Player mode
    #[serde(rename = "status")]
    pub mode: PlayerMode,
    /// Whether shuffle is enabled
    pub shuffle: bool,
    /// Seconds remaining on the sleep timer, if one is armed
    pub sleep_timer: Option<u64>,
    /// Current track, absent when stopped
    #[serde(rename = "metadata")]
    pub track: Option<TrackInfo>,
}

impl PlaybackStatus {
    /// Whether the remote player is actively playing
    pub fn is_playing(&self) -> bool {
        self.mode == PlayerMode::Playing
    }
}

/// Incremental decoder for the `data:`-framed event stream
///
/// Feed it raw chunks as they arrive; it buffers across chunk boundaries
/// and yields every complete snapshot. Records that fail to decode are
/// logged and skipped so one malformed event cannot wedge the feed.
#[derive(Debug, Default)]
pub struct SseDecoder {
    buffer: String,
}

impl SseDecoder {
    /// Create an empty decoder
    pub fn new() -> Self {
        Self::default()
    }

    /// Consume one chunk of feed bytes, yielding completed snapshots
    pub fn push(&mut self, chunk: &str) -> Vec<PlaybackStatus> {
        self.buffer.push_str(chunk);

        // Events are separated by a blank line; the trailing piece is an
        // incomplete event and stays buffered.
        let mut events: Vec<String> = self.buffer.split("\n\n").map(str::to_string).collect();
        self.buffer = events.pop().unwrap_or_default();

        let mut decoded = Vec::new();
        for event in events {
            let Some(json) = event.strip_prefix("data:") else {
                continue;
            };
            match serde_json::from_str::<PlaybackStatus>(json.trim()) {
                Ok(status) => decoded.push(status),
                Err(e) => warn!(error = %e, "skipping malformed status record"),
            }
        }
        decoded
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PLAYING_RECORD: &str = concat!(
        r#"data: {"status":"Playing","shuffle":true,"sleep_timer":1800,"#,
        r#""metadata":{"artist":"Brian Eno","title":"An Ending","artwork_url":"http://x/a.jpg"}}"#,
        "\n\n"
    );

    #[test]
    fn decodes_a_complete_record() {
        let mut decoder = SseDecoder::new();
        let statuses = decoder.push(PLAYING_RECORD);
        assert_eq!(statuses.len(), 1);
        let status = &statuses[0];
        assert!(status.is_playing());
        assert!(status.shuffle);
        assert_eq!(status.sleep_timer, Some(1800));
        assert_eq!(status.track.as_ref().unwrap().artist, "Brian Eno");
    }

    #[test]
    fn buffers_across_chunk_boundaries() {
        let mut decoder = SseDecoder::new();
        let (head, tail) = PLAYING_RECORD.split_at(40);
        assert!(decoder.push(head).is_empty());
        let statuses = decoder.push(tail);
        assert_eq!(statuses.len(), 1);
    }

    #[test]
    fn malformed_record_is_skipped_not_fatal() {
        let mut decoder = SseDecoder::new();
        let mut input = String::from("data: {not json}\n\n");
        input.push_str(r#"data: {"status":"Stopped","shuffle":false}"#);
        input.push_str("\n\n");
        let statuses = decoder.push(&input);
        assert_eq!(statuses.len(), 1);
        assert_eq!(statuses[0].mode, PlayerMode::Stopped);
        assert!(statuses[0].track.is_none());
    }

    #[test]
    fn non_data_lines_are_ignored() {
        let mut decoder = SseDecoder::new();
        let statuses = decoder.push(": keep-alive\n\n");
        assert!(statuses.is_empty());
    }

    #[test]
    fn multiple_records_in_one_chunk() {
        let mut decoder = SseDecoder::new();
        let mut input = String::from(r#"data: {"status":"Paused","shuffle":false}"#);
        input.push_str("\n\n");
        input.push_str(r#"data: {"status":"Playing","shuffle":false}"#);
        input.push_str("\n\n");
        let statuses = decoder.push(&input);
        assert_eq!(statuses.len(), 2);
        assert_eq!(statuses[0].mode, PlayerMode::Paused);
        assert_eq!(statuses[1].mode, PlayerMode::Playing);
    }
}
