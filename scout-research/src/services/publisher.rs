//! Progress publishing onto the event bus
//!
//! Wraps [`EventBus`] with typed helpers so the orchestrator never builds
//! envelopes by hand. Publishing is lossy: with no channel subscribed, events
//! are dropped and the stored session remains the source of truth.

use scout_common::events::{
    ChannelMessage, CompletionPayload, Envelope, ErrorPayload, EventBus, ProgressSnapshot,
    StageUpdate,
};
use uuid::Uuid;

#[derive(Clone)]
pub struct ProgressPublisher {
    bus: EventBus,
}

impl ProgressPublisher {
    pub fn new(bus: EventBus) -> Self {
        Self { bus }
    }

    pub fn bus(&self) -> &EventBus {
        &self.bus
    }

    fn publish(&self, search_id: Uuid, message: ChannelMessage) {
        tracing::trace!(search_id = %search_id, kind = %message.kind().as_str(), "Publishing");
        self.bus.emit_lossy(Envelope::new(search_id, message));
    }

    pub fn stage(&self, search_id: Uuid, update: StageUpdate) {
        self.publish(search_id, ChannelMessage::StageUpdate(update));
    }

    pub fn progress(&self, search_id: Uuid, snapshot: ProgressSnapshot) {
        self.publish(search_id, ChannelMessage::ProgressUpdate(snapshot));
    }

    pub fn error(&self, search_id: Uuid, error: ErrorPayload) {
        self.publish(search_id, ChannelMessage::Error(error));
    }

    pub fn completion(&self, search_id: Uuid, payload: CompletionPayload) {
        self.publish(search_id, ChannelMessage::Completion(payload));
    }

    /// Terminal frame telling subscribers the run was cancelled
    pub fn cancelled(&self, search_id: Uuid, stats: serde_json::Value) {
        self.publish(
            search_id,
            ChannelMessage::Completion(CompletionPayload::cancelled(stats)),
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use scout_common::events::{ErrorCategory, MessageKind};

    #[tokio::test]
    async fn envelopes_carry_search_id() {
        let bus = EventBus::new(16);
        let mut rx = bus.subscribe();
        let publisher = ProgressPublisher::new(bus);
        let search_id = Uuid::new_v4();

        publisher.error(search_id, ErrorPayload::new(ErrorCategory::Internal, "boom"));

        let envelope = rx.recv().await.unwrap();
        assert_eq!(envelope.search_id, search_id);
        assert_eq!(envelope.kind(), MessageKind::Error);
    }

    #[test]
    fn publishing_without_subscribers_is_harmless() {
        let publisher = ProgressPublisher::new(EventBus::new(4));
        publisher.stage(Uuid::new_v4(), StageUpdate::new("harvesting"));
    }
}
