//! Late-bound routing of announced sub-streams
//!
//! The source only learns which sub-streams exist after the connection is
//! negotiated. Each announcement is resolved against the graph on the
//! controller's serialized execution context and the outcome is returned as
//! an explicit [`RouteEvent`] value rather than mutating shared state from
//! a callback.

use crate::graph::StreamGraph;
use crate::media::MediaType;
use crate::source::StreamHandle;

/// Why an announcement was ignored
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IgnoreReason {
    /// No branch was built for this media type (e.g. audio-only mode)
    NoBranch,
    /// The branch entry pad is already connected; duplicate announcements
    /// from protocol retransmits are a no-op
    AlreadyConnected,
}

/// Outcome of resolving one sub-stream announcement
#[derive(Debug, Clone, PartialEq)]
pub enum RouteEvent {
    /// The sub-stream was connected to its branch entry pad
    Connected {
        /// Media type of the connected branch
        media: MediaType,
        /// Handle of the connected sub-stream
        handle: StreamHandle,
    },
    /// The announcement was deliberately ignored
    Ignored {
        /// Media type of the announcement
        media: MediaType,
        /// Why it was ignored
        reason: IgnoreReason,
    },
    /// Connecting failed; non-fatal, sibling streams proceed
    Failed {
        /// Media type of the announcement
        media: MediaType,
        /// Failure reason
        reason: String,
    },
    /// The announcement carried a stale generation and was discarded
    Stale {
        /// Generation the announcement was minted under
        generation: u64,
    },
}

/// Resolves announcements against the live graph, exactly once per branch
#[derive(Debug, Default)]
pub struct DynamicRouter {
    /// Announcements that resulted in a connection
    pub connected: u64,
    /// Announcements that were ignored or discarded
    pub ignored: u64,
}

impl DynamicRouter {
    /// Create a router with zeroed counters
    pub fn new() -> Self {
        Self::default()
    }

    /// Resolve one announcement against the graph
    pub fn on_stream_announced(
        &mut self,
        graph: &mut StreamGraph,
        media: MediaType,
        handle: StreamHandle,
    ) -> RouteEvent {
        if handle.generation != graph.generation() {
            self.ignored += 1;
            return RouteEvent::Stale {
                generation: handle.generation,
            };
        }

        match graph.branch(media) {
            None => {
                self.ignored += 1;
                RouteEvent::Ignored {
                    media,
                    reason: IgnoreReason::NoBranch,
                }
            }
            Some(branch) if branch.is_connected() => {
                self.ignored += 1;
                RouteEvent::Ignored {
                    media,
                    reason: IgnoreReason::AlreadyConnected,
                }
            }
            Some(_) => match graph.connect_branch(media, handle) {
                Ok(()) => {
                    self.connected += 1;
                    RouteEvent::Connected { media, handle }
                }
                Err(e) => RouteEvent::Failed {
                    media,
                    reason: e.to_string(),
                },
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PipelineConfig;
    use crate::graph::GraphBuilder;

    fn audio_graph() -> StreamGraph {
        GraphBuilder::build(&PipelineConfig::audio_monitor("10.0.0.12:8554")).unwrap()
    }

    #[test]
    fn announcement_without_branch_is_a_noop() {
        let mut graph = audio_graph();
        let before = graph.clone();
        let mut router = DynamicRouter::new();

        let handle = StreamHandle::new(graph.generation());
        let event = router.on_stream_announced(&mut graph, MediaType::Video, handle);
        assert_eq!(
            event,
            RouteEvent::Ignored {
                media: MediaType::Video,
                reason: IgnoreReason::NoBranch,
            }
        );
        // Graph is structurally untouched.
        assert_eq!(graph, before);
    }

    #[test]
    fn duplicate_announcements_connect_once() {
        let mut graph = audio_graph();
        let mut router = DynamicRouter::new();

        let first = StreamHandle::new(graph.generation());
        let second = StreamHandle::new(graph.generation());
        assert!(matches!(
            router.on_stream_announced(&mut graph, MediaType::Audio, first),
            RouteEvent::Connected { .. }
        ));
        assert_eq!(
            router.on_stream_announced(&mut graph, MediaType::Audio, second),
            RouteEvent::Ignored {
                media: MediaType::Audio,
                reason: IgnoreReason::AlreadyConnected,
            }
        );
        assert_eq!(router.connected, 1);
        assert_eq!(router.ignored, 1);
    }

    #[test]
    fn stale_generation_is_discarded() {
        let stale_graph = audio_graph();
        let mut live_graph = audio_graph();
        let mut router = DynamicRouter::new();

        let stale = StreamHandle::new(stale_graph.generation());
        let event = router.on_stream_announced(&mut live_graph, MediaType::Audio, stale);
        assert_eq!(
            event,
            RouteEvent::Stale {
                generation: stale_graph.generation(),
            }
        );
        assert!(!live_graph.branch(MediaType::Audio).unwrap().is_connected());
    }
}
