//! Event types for the Contact Scout push channel
//!
//! Provides the wire protocol shared by the research service and its clients,
//! and the in-process [`EventBus`] that fans envelopes out to channel handlers.

mod progress_types;
mod protocol;

pub use progress_types::{
    CompletionPayload, ErrorCategory, ErrorPayload, ProgressSnapshot, StageData, StageStatus,
    StageUpdate,
};
pub use protocol::{ChannelMessage, Envelope, MessageKind};

use tokio::sync::broadcast;

/// Central event distribution bus
///
/// Wraps a `tokio::broadcast` channel. Each connected push channel handler
/// subscribes once and filters envelopes by `search_id`.
#[derive(Clone)]
pub struct EventBus {
    tx: broadcast::Sender<Envelope>,
    capacity: usize,
}

impl EventBus {
    /// Creates a new EventBus with specified channel capacity
    ///
    /// # Arguments
    ///
    /// * `capacity` - Number of envelopes to buffer before slow subscribers lag
    ///
    /// # Examples
    ///
    /// ```
    /// use scout_common::events::EventBus;
    ///
    /// let event_bus = EventBus::new(256);
    /// assert_eq!(event_bus.capacity(), 256);
    /// ```
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx, capacity }
    }

    /// Subscribe to all future envelopes
    ///
    /// Envelopes emitted before subscription are not received.
    pub fn subscribe(&self) -> broadcast::Receiver<Envelope> {
        self.tx.subscribe()
    }

    /// Emit an envelope to all subscribers
    ///
    /// Returns `Ok(subscriber_count)` if at least one subscriber exists.
    #[allow(clippy::result_large_err)]
    pub fn emit(&self, envelope: Envelope) -> Result<usize, broadcast::error::SendError<Envelope>> {
        self.tx.send(envelope)
    }

    /// Emit an envelope, ignoring if no subscribers are listening
    pub fn emit_lossy(&self, envelope: Envelope) {
        let _ = self.tx.send(envelope);
    }

    /// Current number of active subscribers
    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }

    /// Channel capacity
    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    #[tokio::test]
    async fn subscribers_receive_emitted_envelopes() {
        let bus = EventBus::new(16);
        let mut rx = bus.subscribe();
        let search_id = Uuid::new_v4();

        let count = bus
            .emit(Envelope::new(search_id, ChannelMessage::Heartbeat))
            .unwrap();
        assert_eq!(count, 1);

        let received = rx.recv().await.unwrap();
        assert_eq!(received.search_id, search_id);
        assert_eq!(received.kind(), MessageKind::Heartbeat);
    }

    #[test]
    fn emit_without_subscribers_errors() {
        let bus = EventBus::new(4);
        assert!(bus
            .emit(Envelope::new(Uuid::new_v4(), ChannelMessage::Heartbeat))
            .is_err());
        // Lossy emit never panics
        bus.emit_lossy(Envelope::new(Uuid::new_v4(), ChannelMessage::Heartbeat));
        assert_eq!(bus.subscriber_count(), 0);
    }
}
