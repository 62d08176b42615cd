//! [`EventSink`] backed by an [`EventBus`].

use async_trait::async_trait;
use chrono::Utc;
use std::sync::Arc;
use tracker_core::event_bus::{EventBus, EventBusError};
use tracker_core::{CommentEvent, EventSink, PublishError, SerializedEvent};

/// Publishes comment events to a message bus.
///
/// Each event becomes a [`SerializedEvent`] keyed by its ticket id, with a
/// `published_at` timestamp in the metadata. Encoding failures are permanent;
/// every bus failure is treated as transient.
#[derive(Clone)]
pub struct BusEventSink {
    bus: Arc<dyn EventBus>,
}

impl BusEventSink {
    /// Wrap a bus.
    #[must_use]
    pub fn new(bus: Arc<dyn EventBus>) -> Self {
        Self { bus }
    }
}

#[async_trait]
impl EventSink for BusEventSink {
    async fn send(&self, topic: &str, event: &CommentEvent) -> Result<(), PublishError> {
        let metadata = serde_json::json!({
            "published_at": Utc::now().to_rfc3339(),
        });
        let serialized = SerializedEvent::from_event(event, Some(metadata))
            .map_err(|e| PublishError::Permanent(e.to_string()))?;

        self.bus
            .publish(topic, &serialized)
            .await
            .map_err(|e: EventBusError| PublishError::Transient(e.to_string()))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use tracker_core::{CommentId, TicketId, UserId};
    use tracker_testing::InMemoryEventBus;

    #[tokio::test]
    async fn publishes_keyed_envelope_to_topic() {
        let bus = InMemoryEventBus::new();
        let sink = BusEventSink::new(Arc::new(bus.clone()));
        let event = CommentEvent {
            comment_id: CommentId::new(8),
            ticket_id: TicketId::new(3),
            body: "looks good".to_string(),
            author_id: UserId::new(1),
            created_at: Utc::now(),
        };

        sink.send("comment-events", &event).await.unwrap();

        let published = bus.published_to("comment-events");
        assert_eq!(published.len(), 1);
        assert_eq!(published[0].key.as_deref(), Some("3"));
        assert!(published[0].metadata.as_ref().unwrap()["published_at"].is_string());
        let decoded: CommentEvent = published[0].decode(CommentEvent::EVENT_TYPE).unwrap();
        assert_eq!(decoded, event);
    }
}
