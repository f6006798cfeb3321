//! Pipeline event channel
//!
//! A single-producer/single-consumer channel carrying notifications from the
//! pipeline's background execution context to the controller's state
//! machine. Events are delivered in emission order and never dropped;
//! consecutive identical state-change events are coalesced into one at the
//! sending side.

use crate::controller::PipelineState;
use crate::error::FaultKind;
use tokio::sync::mpsc;

/// One notification from the pipeline's execution context
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineEvent {
    /// The pipeline moved to a new state
    StateChanged(PipelineState),
    /// A runtime fault occurred
    Fault(FaultKind),
}

/// Create a fresh event channel
///
/// A channel lives exactly as long as one graph instance; `stop()` releases
/// it and the next `play()` gets a new one.
pub fn channel() -> (EventSender, EventReceiver) {
    let (tx, rx) = mpsc::unbounded_channel();
    (
        EventSender {
            tx,
            last_state: None,
        },
        EventReceiver { rx },
    )
}

/// Producing side of the event channel
#[derive(Debug)]
pub struct EventSender {
    tx: mpsc::UnboundedSender<PipelineEvent>,
    last_state: Option<PipelineState>,
}

impl EventSender {
    /// Emit an event, coalescing repeats of the same state change
    pub fn send(&mut self, event: PipelineEvent) {
        match event {
            PipelineEvent::StateChanged(state) => {
                if self.last_state == Some(state) {
                    return;
                }
                self.last_state = Some(state);
            }
            PipelineEvent::Fault(_) => {
                // A fault breaks any run of identical state changes.
                self.last_state = None;
            }
        }
        // The receiver outlives every producer except during teardown,
        // where losing a notification is fine.
        let _ = self.tx.send(event);
    }
}

/// Consuming side of the event channel
#[derive(Debug)]
pub struct EventReceiver {
    rx: mpsc::UnboundedReceiver<PipelineEvent>,
}

impl EventReceiver {
    /// Receive the next event; `None` once the sender is gone
    pub async fn recv(&mut self) -> Option<PipelineEvent> {
        self.rx.recv().await
    }

    /// Non-blocking receive
    pub fn try_recv(&mut self) -> Option<PipelineEvent> {
        self.rx.try_recv().ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn events_arrive_in_emission_order() {
        let (mut tx, mut rx) = channel();
        tx.send(PipelineEvent::StateChanged(PipelineState::Ready));
        tx.send(PipelineEvent::StateChanged(PipelineState::Playing));
        tx.send(PipelineEvent::Fault(FaultKind::EndOfStream));

        assert_eq!(
            rx.try_recv(),
            Some(PipelineEvent::StateChanged(PipelineState::Ready))
        );
        assert_eq!(
            rx.try_recv(),
            Some(PipelineEvent::StateChanged(PipelineState::Playing))
        );
        assert_eq!(rx.try_recv(), Some(PipelineEvent::Fault(FaultKind::EndOfStream)));
        assert_eq!(rx.try_recv(), None);
    }

    #[test]
    fn repeated_state_changes_coalesce() {
        let (mut tx, mut rx) = channel();
        tx.send(PipelineEvent::StateChanged(PipelineState::Playing));
        tx.send(PipelineEvent::StateChanged(PipelineState::Playing));
        tx.send(PipelineEvent::StateChanged(PipelineState::Playing));

        assert_eq!(
            rx.try_recv(),
            Some(PipelineEvent::StateChanged(PipelineState::Playing))
        );
        assert_eq!(rx.try_recv(), None);
    }

    #[test]
    fn fault_breaks_coalescing_run() {
        let (mut tx, mut rx) = channel();
        tx.send(PipelineEvent::StateChanged(PipelineState::Playing));
        tx.send(PipelineEvent::Fault(FaultKind::DecodeError));
        tx.send(PipelineEvent::StateChanged(PipelineState::Playing));

        assert!(rx.try_recv().is_some());
        assert!(rx.try_recv().is_some());
        assert_eq!(
            rx.try_recv(),
            Some(PipelineEvent::StateChanged(PipelineState::Playing))
        );
    }
}
