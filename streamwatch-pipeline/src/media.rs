//! Media packet and frame types shared across pipeline stages

use bytes::Bytes;
use std::fmt;

/// Media type of a sub-stream or processing branch
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MediaType {
    /// Audio sub-stream
    Audio,
    /// Video sub-stream
    Video,
}

impl fmt::Display for MediaType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MediaType::Audio => write!(f, "audio"),
            MediaType::Video => write!(f, "video"),
        }
    }
}

/// Codec carried by a sub-stream
///
/// The set of codecs the graph builder can construct a decode branch for is
/// determined by [`Codec::has_decoder`]; requesting a branch for a codec
/// without a registered decoder is a build-time error, not a runtime fault.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Codec {
    /// AAC audio in ADTS framing
    Aac,
    /// Raw 16-bit PCM audio
    Pcm,
    /// H.264 video in Annex B framing
    H264,
    /// Opus audio (no decoder registered)
    Opus,
}

impl Codec {
    /// Media type this codec belongs to
    pub fn media(&self) -> MediaType {
        match self {
            Codec::Aac | Codec::Pcm | Codec::Opus => MediaType::Audio,
            Codec::H264 => MediaType::Video,
        }
    }

    /// Whether a decoder stage can be constructed for this codec
    pub fn has_decoder(&self) -> bool {
        !matches!(self, Codec::Opus)
    }

    /// Canonical codec name
    pub fn name(&self) -> &'static str {
        match self {
            Codec::Aac => "aac",
            Codec::Pcm => "pcm",
            Codec::H264 => "h264",
            Codec::Opus => "opus",
        }
    }
}

impl fmt::Display for Codec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// One encoded media packet as read off the network source
#[derive(Debug, Clone, PartialEq)]
pub struct MediaPacket {
    /// Media type of the sub-stream this packet belongs to
    pub media: MediaType,
    /// Whether this packet starts a keyframe (video only)
    pub keyframe: bool,
    /// Presentation timestamp in nanoseconds
    pub pts: u64,
    /// Encoded payload including codec framing
    pub payload: Bytes,
}

/// One decoded media frame as produced by a decoder stage
#[derive(Debug, Clone, PartialEq)]
pub struct MediaFrame {
    /// Media type of the originating branch
    pub media: MediaType,
    /// Whether this frame was decoded from a keyframe
    pub keyframe: bool,
    /// Presentation timestamp in nanoseconds
    pub pts: u64,
    /// Decoded payload
    pub payload: Bytes,
}
