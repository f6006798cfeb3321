//! Audio output route monitoring
//!
//! The platform audio session reports where sound currently goes; the
//! mediator pauses the monitor on the built-in speaker (feedback and
//! battery drain) and resumes it on external routes.

use tokio::sync::watch;
use tracing::info;

/// Where device audio output is currently routed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AudioRoute {
    /// The device's built-in speaker
    BuiltInSpeaker,
    /// Wired headphones or headset
    Headphones,
    /// Any Bluetooth audio profile
    Bluetooth,
    /// USB audio device
    UsbAudio,
    /// AirPlay destination
    AirPlay,
    /// Anything the taxonomy doesn't name
    Other,
}

impl AudioRoute {
    /// Whether the route leaves the device
    pub fn is_external(&self) -> bool {
        !matches!(self, AudioRoute::BuiltInSpeaker)
    }

    /// Human-readable route name
    pub fn describe(&self) -> &'static str {
        match self {
            AudioRoute::BuiltInSpeaker => "Built-in Speaker",
            AudioRoute::Headphones => "Headphones",
            AudioRoute::Bluetooth => "Bluetooth",
            AudioRoute::UsbAudio => "USB Audio Device",
            AudioRoute::AirPlay => "AirPlay",
            AudioRoute::Other => "Unknown",
        }
    }
}

/// Publishes the current output route through a watch channel
///
/// Platform integration calls [`OutputRouteMonitor::set`] on every route
/// change notification; consumers subscribe and see the latest value.
#[derive(Debug)]
pub struct OutputRouteMonitor {
    tx: watch::Sender<AudioRoute>,
}

impl OutputRouteMonitor {
    /// Create a monitor reporting the given initial route
    pub fn new(initial: AudioRoute) -> Self {
        let (tx, _) = watch::channel(initial);
        Self { tx }
    }

    /// Record a route change
    pub fn set(&self, route: AudioRoute) {
        if *self.tx.borrow() != route {
            info!(route = route.describe(), "audio output route changed");
            let _ = self.tx.send(route);
        }
    }

    /// Current route
    pub fn current(&self) -> AudioRoute {
        *self.tx.borrow()
    }

    /// Subscribe to route changes
    pub fn subscribe(&self) -> watch::Receiver<AudioRoute> {
        self.tx.subscribe()
    }
}

impl Default for OutputRouteMonitor {
    fn default() -> Self {
        Self::new(AudioRoute::Other)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_the_speaker_is_internal() {
        assert!(!AudioRoute::BuiltInSpeaker.is_external());
        for route in [
            AudioRoute::Headphones,
            AudioRoute::Bluetooth,
            AudioRoute::UsbAudio,
            AudioRoute::AirPlay,
            AudioRoute::Other,
        ] {
            assert!(route.is_external());
        }
    }

    #[tokio::test]
    async fn subscribers_see_route_changes() {
        let monitor = OutputRouteMonitor::new(AudioRoute::Bluetooth);
        let mut rx = monitor.subscribe();
        monitor.set(AudioRoute::BuiltInSpeaker);
        rx.changed().await.unwrap();
        assert_eq!(*rx.borrow(), AudioRoute::BuiltInSpeaker);
    }

    #[tokio::test]
    async fn repeated_set_of_same_route_is_silent() {
        let monitor = OutputRouteMonitor::new(AudioRoute::Bluetooth);
        let mut rx = monitor.subscribe();
        monitor.set(AudioRoute::Bluetooth);
        assert!(!rx.has_changed().unwrap());
    }
}
