//! Arena-owned stream graph and graph builder
//!
//! The graph owns every processing stage for one pipeline instance: a source
//! stage plus, per requested media type, an immutable sub-chain
//! depacketize → parse → decode → sink. The source stage is added unlinked;
//! its outputs are only known once the connection is negotiated, at which
//! point the dynamic router connects announced sub-streams to branch entry
//! pads.
//!
//! Every graph carries a generation id. Stage handles and route requests are
//! tagged with the generation they were minted under, so anything referring
//! to a torn-down graph is statically distinguishable from a live reference
//! and can be discarded instead of dereferenced.

use crate::config::PipelineConfig;
use crate::error::{FaultKind, PipelineError};
use crate::media::{Codec, MediaFrame, MediaPacket, MediaType};
use crate::source::StreamHandle;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

/// Generation ids are process-wide so handles from two graphs never collide.
static NEXT_GENERATION: AtomicU64 = AtomicU64::new(1);

/// Kind of a processing stage
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StageKind {
    /// Network source
    Source,
    /// Sub-stream depacketizer
    Depacketizer,
    /// Elementary stream parser
    Parser,
    /// Decoder
    Decoder,
    /// Render/audio sink
    Sink,
}

impl fmt::Display for StageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StageKind::Source => write!(f, "source"),
            StageKind::Depacketizer => write!(f, "depacketizer"),
            StageKind::Parser => write!(f, "parser"),
            StageKind::Decoder => write!(f, "decoder"),
            StageKind::Sink => write!(f, "sink"),
        }
    }
}

/// Generation-tagged handle to a stage in the arena
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct StageId {
    index: usize,
    /// Generation of the graph this handle was minted under
    pub generation: u64,
}

/// One processing stage owned by the graph
#[derive(Debug, Clone, PartialEq)]
pub struct Stage {
    /// Handle of this stage
    pub id: StageId,
    /// Stage kind
    pub kind: StageKind,
    /// Media type of the branch this stage belongs to (source has none)
    pub media: Option<MediaType>,
    /// Element name, unique within the graph
    pub name: String,
    /// Downstream stage this one is linked to
    pub downstream: Option<StageId>,
    /// Number of buffers this stage has processed
    pub processed: u64,
}

/// One decode branch: entry pad plus its linked stage chain
#[derive(Debug, Clone, PartialEq)]
pub struct Branch {
    /// Media type this branch decodes
    pub media: MediaType,
    /// Codec this branch decodes
    pub codec: Codec,
    /// Entry pad (the depacketizer) a routed sub-stream connects to
    pub entry: StageId,
    parser: StageId,
    decoder: StageId,
    sink: StageId,
    connected: Option<StreamHandle>,
}

impl Branch {
    /// Whether a sub-stream has been connected to this branch's entry pad
    pub fn is_connected(&self) -> bool {
        self.connected.is_some()
    }
}

/// Arena of stages for one pipeline instance
#[derive(Debug, Clone, PartialEq)]
pub struct StreamGraph {
    generation: u64,
    stages: Vec<Stage>,
    source: StageId,
    branches: Vec<Branch>,
}

impl StreamGraph {
    /// Generation id of this graph instance
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Resolve a stage handle, rejecting handles from other generations
    pub fn stage(&self, id: StageId) -> Option<&Stage> {
        if id.generation != self.generation {
            return None;
        }
        self.stages.get(id.index)
    }

    /// Handle of the source stage
    pub fn source(&self) -> StageId {
        self.source
    }

    /// Branch for the given media type, if one was built
    pub fn branch(&self, media: MediaType) -> Option<&Branch> {
        self.branches.iter().find(|b| b.media == media)
    }

    /// Whether a branch was built for the given media type
    pub fn has_branch(&self, media: MediaType) -> bool {
        self.branch(media).is_some()
    }

    /// Connect an announced sub-stream to the branch's entry pad
    ///
    /// Fails if the handle is stale or no branch exists; the router is
    /// expected to have filtered both cases already.
    pub(crate) fn connect_branch(
        &mut self,
        media: MediaType,
        handle: StreamHandle,
    ) -> Result<(), PipelineError> {
        if handle.generation != self.generation {
            return Err(PipelineError::Route {
                media,
                reason: format!(
                    "stream handle generation {} does not match graph generation {}",
                    handle.generation, self.generation
                ),
            });
        }
        let source = self.source;
        let branch = self
            .branches
            .iter_mut()
            .find(|b| b.media == media)
            .ok_or_else(|| PipelineError::Route {
                media,
                reason: "no branch built for this media type".to_string(),
            })?;
        let entry = branch.entry;
        branch.connected = Some(handle);
        // Linking the source pad to the branch entry completes the chain.
        self.stages[source.index].downstream = Some(entry);
        Ok(())
    }

    /// Run one packet through its branch's stage chain
    ///
    /// Packets for media types without a connected branch are dropped.
    /// Returns the decoded frame once the chain completes; decode failures
    /// surface as [`FaultKind::DecodeError`].
    pub fn process_packet(
        &mut self,
        packet: MediaPacket,
    ) -> Result<Option<MediaFrame>, FaultKind> {
        let (codec, entry, parser, decoder, sink) = match self.branch(packet.media) {
            Some(b) if b.is_connected() => (b.codec, b.entry, b.parser, b.decoder, b.sink),
            _ => return Ok(None),
        };

        self.bump(self.source);

        // Depacketizer: strip transport framing, reject empty buffers.
        if packet.payload.is_empty() {
            return Err(FaultKind::DecodeError);
        }
        self.bump(entry);

        // Parser: validate elementary stream sync.
        let header_len = parse_sync(codec, &packet.payload)?;
        self.bump(parser);

        // Decoder: produce the raw frame past the codec header.
        let frame = MediaFrame {
            media: packet.media,
            keyframe: packet.keyframe,
            pts: packet.pts,
            payload: packet.payload.slice(header_len..),
        };
        self.bump(decoder);
        self.bump(sink);

        Ok(Some(frame))
    }

    /// Stop and unlink every stage, in sink-to-source order
    ///
    /// After teardown the graph holds no links and no connected branches;
    /// the instance is only good for dropping.
    pub fn teardown(&mut self) {
        for branch in &mut self.branches {
            branch.connected = None;
        }
        for stage in self.stages.iter_mut().rev() {
            stage.downstream = None;
        }
        tracing::debug!(generation = self.generation, "stream graph torn down");
    }

    fn bump(&mut self, id: StageId) {
        self.stages[id.index].processed += 1;
    }

    fn add_stage(
        &mut self,
        kind: StageKind,
        media: Option<MediaType>,
        name: String,
    ) -> StageId {
        let id = StageId {
            index: self.stages.len(),
            generation: self.generation,
        };
        self.stages.push(Stage {
            id,
            kind,
            media,
            name,
            downstream: None,
            processed: 0,
        });
        id
    }
}

/// Validate codec sync bytes and return the codec header length to strip
fn parse_sync(codec: Codec, payload: &bytes::Bytes) -> Result<usize, FaultKind> {
    match codec {
        Codec::Aac => {
            // ADTS: 0xFFF sync plus a 7 byte fixed header.
            if payload.len() > 7 && payload[0] == 0xFF && payload[1] & 0xF0 == 0xF0 {
                Ok(7)
            } else {
                Err(FaultKind::DecodeError)
            }
        }
        Codec::Pcm => {
            if payload.len() % 2 == 0 {
                Ok(0)
            } else {
                Err(FaultKind::DecodeError)
            }
        }
        Codec::H264 => {
            // Annex B start code, three or four bytes.
            if payload.len() > 4 && payload[..3] == [0, 0, 1] {
                Ok(3)
            } else if payload.len() > 5 && payload[..4] == [0, 0, 0, 1] {
                Ok(4)
            } else {
                Err(FaultKind::DecodeError)
            }
        }
        Codec::Opus => Err(FaultKind::DecodeError),
    }
}

/// Builds fully linked stream graphs from a pipeline configuration
#[derive(Debug)]
pub struct GraphBuilder;

impl GraphBuilder {
    /// Construct the graph for one pipeline instance
    ///
    /// The source stage is created with the connection parameters and left
    /// unlinked; each requested branch is constructed and linked end to end.
    /// Any linking failure is fatal: a partially linked graph is never
    /// returned.
    pub fn build(config: &PipelineConfig) -> Result<StreamGraph, PipelineError> {
        if config.branches.is_empty() {
            return Err(PipelineError::Build {
                stage: StageKind::Source,
                reason: "no media branches requested".to_string(),
            });
        }

        let generation = NEXT_GENERATION.fetch_add(1, Ordering::Relaxed);
        let mut graph = StreamGraph {
            generation,
            stages: Vec::new(),
            source: StageId {
                index: 0,
                generation,
            },
            branches: Vec::new(),
        };

        let source = graph.add_stage(
            StageKind::Source,
            None,
            format!("source:{}", config.address),
        );
        graph.source = source;

        for branch_config in &config.branches {
            let media = branch_config.media;
            let codec = branch_config.codec;

            if graph.has_branch(media) {
                return Err(PipelineError::Build {
                    stage: StageKind::Depacketizer,
                    reason: format!("duplicate branch for {media}"),
                });
            }
            if codec.media() != media {
                return Err(PipelineError::Build {
                    stage: StageKind::Depacketizer,
                    reason: format!("codec {codec} cannot carry {media}"),
                });
            }
            if !codec.has_decoder() {
                return Err(PipelineError::Build {
                    stage: StageKind::Decoder,
                    reason: format!("no decoder registered for {codec}"),
                });
            }

            let entry = graph.add_stage(
                StageKind::Depacketizer,
                Some(media),
                format!("{media}_depay"),
            );
            let parser =
                graph.add_stage(StageKind::Parser, Some(media), format!("{media}_parse"));
            let decoder = graph.add_stage(
                StageKind::Decoder,
                Some(media),
                format!("{media}_decode_{codec}"),
            );
            let sink = graph.add_stage(StageKind::Sink, Some(media), format!("{media}_sink"));

            // Link the immutable part of the chain. The entry pad stays
            // unlinked from the source until the router connects it.
            graph.stages[entry.index].downstream = Some(parser);
            graph.stages[parser.index].downstream = Some(decoder);
            graph.stages[decoder.index].downstream = Some(sink);

            graph.branches.push(Branch {
                media,
                codec,
                entry,
                parser,
                decoder,
                sink,
                connected: None,
            });
        }

        tracing::debug!(
            generation,
            branches = graph.branches.len(),
            address = %config.address,
            "stream graph built"
        );
        Ok(graph)
    }
}
