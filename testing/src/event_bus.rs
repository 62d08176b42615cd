//! In-process [`EventBus`] for tests.

#![allow(clippy::missing_panics_doc)]

use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Mutex, PoisonError};
use tokio::sync::broadcast;
use tracker_core::SerializedEvent;
use tracker_core::event_bus::{EventBus, EventBusError, EventStream};

const CHANNEL_CAPACITY: usize = 1024;

/// Broadcast-backed bus.
///
/// Every subscriber sees the events published after it subscribed, filtered
/// to its topics. Everything published is also kept for inspection.
#[derive(Clone)]
pub struct InMemoryEventBus {
    sender: broadcast::Sender<(String, SerializedEvent)>,
    published: Arc<Mutex<Vec<(String, SerializedEvent)>>>,
}

impl InMemoryEventBus {
    /// Create an empty bus.
    #[must_use]
    pub fn new() -> Self {
        let (sender, _) = broadcast::channel(CHANNEL_CAPACITY);
        Self {
            sender,
            published: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Everything published so far, as `(topic, event)` pairs.
    #[must_use]
    pub fn published(&self) -> Vec<(String, SerializedEvent)> {
        self.published
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Events published to `topic`.
    #[must_use]
    pub fn published_to(&self, topic: &str) -> Vec<SerializedEvent> {
        self.published()
            .into_iter()
            .filter(|(t, _)| t == topic)
            .map(|(_, event)| event)
            .collect()
    }
}

impl Default for InMemoryEventBus {
    fn default() -> Self {
        Self::new()
    }
}

impl EventBus for InMemoryEventBus {
    fn publish(
        &self,
        topic: &str,
        event: &SerializedEvent,
    ) -> Pin<Box<dyn Future<Output = Result<(), EventBusError>> + Send + '_>> {
        let entry = (topic.to_string(), event.clone());
        Box::pin(async move {
            self.published
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .push(entry.clone());
            // No subscribers is not an error for a bus.
            let _ = self.sender.send(entry);
            Ok(())
        })
    }

    fn subscribe(
        &self,
        topics: &[&str],
    ) -> Pin<Box<dyn Future<Output = Result<EventStream, EventBusError>> + Send + '_>> {
        let topics: Vec<String> = topics.iter().map(ToString::to_string).collect();
        let mut receiver = self.sender.subscribe();

        Box::pin(async move {
            let stream = async_stream::stream! {
                loop {
                    match receiver.recv().await {
                        Ok((topic, event)) if topics.contains(&topic) => {
                            yield Ok(event);
                        }
                        Ok(_) => {}
                        Err(broadcast::error::RecvError::Lagged(skipped)) => {
                            yield Err(EventBusError::TransportError(format!(
                                "subscriber lagged by {skipped} events"
                            )));
                        }
                        Err(broadcast::error::RecvError::Closed) => break,
                    }
                }
            };
            Ok(Box::pin(stream) as EventStream)
        })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use futures::StreamExt;

    fn event(key: &str) -> SerializedEvent {
        SerializedEvent::new(
            "CommentCreated.v1".to_string(),
            Some(key.to_string()),
            vec![1, 2, 3],
            None,
        )
    }

    #[tokio::test]
    async fn subscribers_only_see_their_topics() {
        let bus = InMemoryEventBus::new();
        let mut stream = bus.subscribe(&["comments"]).await.unwrap();

        bus.publish("audit", &event("a")).await.unwrap();
        bus.publish("comments", &event("b")).await.unwrap();

        let received = stream.next().await.unwrap().unwrap();
        assert_eq!(received.key.as_deref(), Some("b"));
        assert_eq!(bus.published().len(), 2);
        assert_eq!(bus.published_to("comments"), vec![event("b")]);
    }
}
