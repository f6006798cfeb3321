//! Render surface binding
//!
//! The video sink writes decoded frames into an opaque display handle owned
//! by the display layer; the pipeline only ever holds a non-owning
//! reference, released on `unbind_surface()` or `stop()`. A secondary
//! picture-in-picture surface may mirror the same frames; the mirror is
//! allowed to drop its oldest frames under backpressure, the primary
//! surface never is.

use crate::media::MediaFrame;
use tokio::sync::{broadcast, mpsc};

/// Ring depth of the picture-in-picture mirror
const PIP_MIRROR_DEPTH: usize = 8;

/// Opaque, non-owning reference to a platform display surface
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RenderSurfaceHandle(pub u64);

/// Live binding between the video sink and a display surface
///
/// Dropping the binding releases the handle; the surface itself always
/// stays owned by the display layer. The binding must be cleared before
/// the surface is deallocated or the pipeline is torn down, in that order.
#[derive(Debug)]
pub struct SurfaceBinding {
    handle: RenderSurfaceHandle,
    primary: mpsc::UnboundedSender<MediaFrame>,
    mirror: Option<broadcast::Sender<MediaFrame>>,
}

impl SurfaceBinding {
    /// Bind a surface, returning the binding and the primary frame stream
    pub fn bind(handle: RenderSurfaceHandle) -> (Self, mpsc::UnboundedReceiver<MediaFrame>) {
        let (primary, frames) = mpsc::unbounded_channel();
        (
            Self {
                handle,
                primary,
                mirror: None,
            },
            frames,
        )
    }

    /// Handle this binding refers to
    pub fn handle(&self) -> RenderSurfaceHandle {
        self.handle
    }

    /// Attach a picture-in-picture mirror of the primary frame stream
    ///
    /// The mirror rides a fixed-depth ring: a lagging consumer loses the
    /// oldest frames, never stalling the decode path.
    pub fn attach_mirror(&mut self) -> broadcast::Receiver<MediaFrame> {
        match &self.mirror {
            Some(tx) => tx.subscribe(),
            None => {
                let (tx, rx) = broadcast::channel(PIP_MIRROR_DEPTH);
                self.mirror = Some(tx);
                rx
            }
        }
    }

    /// Deliver one decoded frame to the surface (and mirror, if attached)
    pub fn deliver(&self, frame: &MediaFrame) {
        // A closed primary just means the display went away first; frame
        // delivery must not fail the decode path.
        let _ = self.primary.send(frame.clone());
        if let Some(mirror) = &self.mirror {
            let _ = mirror.send(frame.clone());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::media::MediaType;
    use bytes::Bytes;

    fn frame(pts: u64) -> MediaFrame {
        MediaFrame {
            media: MediaType::Video,
            keyframe: false,
            pts,
            payload: Bytes::from_static(&[0xAB]),
        }
    }

    #[tokio::test]
    async fn primary_surface_receives_every_frame() {
        let (binding, mut frames) = SurfaceBinding::bind(RenderSurfaceHandle(1));
        for pts in 0..100 {
            binding.deliver(&frame(pts));
        }
        for pts in 0..100 {
            assert_eq!(frames.recv().await.unwrap().pts, pts);
        }
    }

    #[tokio::test]
    async fn lagging_mirror_drops_oldest_frames() {
        let (mut binding, _frames) = SurfaceBinding::bind(RenderSurfaceHandle(1));
        let mut mirror = binding.attach_mirror();

        // Overrun the mirror ring without draining it.
        for pts in 0..(PIP_MIRROR_DEPTH as u64 * 4) {
            binding.deliver(&frame(pts));
        }

        match mirror.recv().await {
            Err(broadcast::error::RecvError::Lagged(skipped)) => {
                assert!(skipped > 0);
            }
            other => panic!("expected lag, got {other:?}"),
        }
        // After the lag report the newest frames are still there.
        let next = mirror.recv().await.unwrap();
        assert!(next.pts >= PIP_MIRROR_DEPTH as u64);
    }

    #[tokio::test]
    async fn delivery_survives_closed_primary() {
        let (binding, frames) = SurfaceBinding::bind(RenderSurfaceHandle(1));
        drop(frames);
        binding.deliver(&frame(0));
    }
}
