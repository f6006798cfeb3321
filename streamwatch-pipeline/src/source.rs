//! Network media sources
//!
//! [`MediaSource`] is the seam between the pipeline and whatever speaks the
//! actual wire protocol. [`TcpSource`] implements it over a reliable TCP
//! connection with a small length-prefixed framing; [`ScriptedSource`]
//! replays a canned session and is what the tests and demos drive the
//! pipeline with.

use crate::config::{PipelineConfig, TransportMode};
use crate::error::PipelineError;
use crate::media::{MediaPacket, MediaType};
use async_trait::async_trait;
use bytes::Bytes;
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::AsyncReadExt;
use tokio::net::TcpStream;
use uuid::Uuid;

/// Generation-tagged handle for a sub-stream announced by the source
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct StreamHandle {
    /// Unique id of the announced sub-stream
    pub id: Uuid,
    /// Graph generation this handle was minted under
    pub generation: u64,
}

impl StreamHandle {
    /// Mint a fresh handle under the given graph generation
    pub fn new(generation: u64) -> Self {
        Self {
            id: Uuid::new_v4(),
            generation,
        }
    }
}

/// Factory producing a fresh source for every `play()`
///
/// A graph is never reused across stop/start cycles, and neither is its
/// source.
pub type SourceFactory = Arc<dyn Fn() -> Box<dyn MediaSource> + Send + Sync>;

/// A connected network source delivering announced sub-streams and packets
#[async_trait]
pub trait MediaSource: Send {
    /// Establish the connection and negotiate available sub-streams
    ///
    /// Returns the media types the source will deliver. The caller bounds
    /// this with the configured latency budget.
    async fn connect(&mut self) -> Result<Vec<MediaType>, PipelineError>;

    /// Read the next packet; `Ok(None)` signals end of stream
    async fn next_packet(&mut self) -> Result<Option<MediaPacket>, PipelineError>;
}

/// Media source over a reliable TCP connection
///
/// Wire format: after connect, the peer sends a one-byte sub-stream count
/// followed by one media-tag byte per sub-stream (0 = audio, 1 = video).
/// Each packet is `[media u8][flags u8][pts u64 BE][len u32 BE][payload]`,
/// with flag bit 0 marking a keyframe.
#[derive(Debug)]
pub struct TcpSource {
    address: String,
    transport: TransportMode,
    stream: Option<TcpStream>,
}

impl TcpSource {
    /// Create an unconnected source from the pipeline configuration
    pub fn new(config: &PipelineConfig) -> Self {
        Self {
            address: config.address.clone(),
            transport: config.transport,
            stream: None,
        }
    }

    fn media_from_tag(tag: u8) -> Result<MediaType, PipelineError> {
        match tag {
            0 => Ok(MediaType::Audio),
            1 => Ok(MediaType::Video),
            other => Err(PipelineError::Transport {
                reason: format!("unknown media tag {other}"),
            }),
        }
    }
}

#[async_trait]
impl MediaSource for TcpSource {
    async fn connect(&mut self) -> Result<Vec<MediaType>, PipelineError> {
        if self.transport != TransportMode::Tcp {
            return Err(PipelineError::Transport {
                reason: "this source only supports the reliable TCP transport".to_string(),
            });
        }
        let mut stream = TcpStream::connect(&self.address).await?;

        let count = stream.read_u8().await?;
        let mut announced = Vec::with_capacity(count as usize);
        for _ in 0..count {
            let tag = stream.read_u8().await?;
            announced.push(Self::media_from_tag(tag)?);
        }

        tracing::info!(address = %self.address, streams = announced.len(), "source connected");
        self.stream = Some(stream);
        Ok(announced)
    }

    async fn next_packet(&mut self) -> Result<Option<MediaPacket>, PipelineError> {
        let stream = self.stream.as_mut().ok_or(PipelineError::Transport {
            reason: "source is not connected".to_string(),
        })?;

        let tag = match stream.read_u8().await {
            Ok(tag) => tag,
            Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        let media = Self::media_from_tag(tag)?;
        let flags = stream.read_u8().await?;
        let pts = stream.read_u64().await?;
        let len = stream.read_u32().await? as usize;

        let mut payload = vec![0u8; len];
        stream.read_exact(&mut payload).await?;

        Ok(Some(MediaPacket {
            media,
            keyframe: flags & 0x01 != 0,
            pts,
            payload: Bytes::from(payload),
        }))
    }
}

/// One step of a scripted source session
#[derive(Debug, Clone)]
pub enum ScriptedStep {
    /// Deliver one packet
    Packet(MediaPacket),
    /// Sleep before the next step
    Delay(Duration),
    /// Fail with a transport error
    TransportError(String),
}

/// In-memory source replaying a canned session
#[derive(Debug, Clone, Default)]
pub struct ScriptedSource {
    announcements: Vec<MediaType>,
    steps: VecDeque<ScriptedStep>,
    connect_delay: Option<Duration>,
}

impl ScriptedSource {
    /// Create an empty scripted source
    pub fn new() -> Self {
        Self::default()
    }

    /// Announce a sub-stream of the given media type on connect
    pub fn announce(mut self, media: MediaType) -> Self {
        self.announcements.push(media);
        self
    }

    /// Append a packet to the session
    pub fn packet(mut self, packet: MediaPacket) -> Self {
        self.steps.push_back(ScriptedStep::Packet(packet));
        self
    }

    /// Append a delay before the next step
    pub fn delay(mut self, duration: Duration) -> Self {
        self.steps.push_back(ScriptedStep::Delay(duration));
        self
    }

    /// Fail with a transport error at this point of the session
    pub fn transport_error(mut self, reason: impl Into<String>) -> Self {
        self.steps
            .push_back(ScriptedStep::TransportError(reason.into()));
        self
    }

    /// Delay connection establishment (for latency budget tests)
    pub fn connect_delay(mut self, duration: Duration) -> Self {
        self.connect_delay = Some(duration);
        self
    }

    /// Turn this script into a factory that replays it on every `play()`
    pub fn into_factory(self) -> SourceFactory {
        Arc::new(move || Box::new(self.clone()))
    }
}

#[async_trait]
impl MediaSource for ScriptedSource {
    async fn connect(&mut self) -> Result<Vec<MediaType>, PipelineError> {
        if let Some(delay) = self.connect_delay {
            tokio::time::sleep(delay).await;
        }
        Ok(self.announcements.clone())
    }

    async fn next_packet(&mut self) -> Result<Option<MediaPacket>, PipelineError> {
        loop {
            match self.steps.pop_front() {
                Some(ScriptedStep::Packet(packet)) => return Ok(Some(packet)),
                Some(ScriptedStep::Delay(duration)) => tokio::time::sleep(duration).await,
                Some(ScriptedStep::TransportError(reason)) => {
                    return Err(PipelineError::Transport { reason })
                }
                None => return Ok(None),
            }
        }
    }
}
