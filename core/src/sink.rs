//! Event sink capability.
//!
//! An [`EventSink`] is where the event publisher hands comment events for
//! delivery. Two implementations ship with the tracker:
//!
//! - `BusEventSink` (in `tracker-runtime`): serializes the event and publishes
//!   it through an [`EventBus`](crate::event_bus::EventBus)
//! - [`RecordingEventSink`]: keeps every invocation in memory so tests and
//!   local runs can verify delivery
//!
//! Which one runs is decided by configuration when the service is wired up.
//!
//! # Design Rules
//!
//! - `send()` may block on network I/O; it is only ever called from the
//!   publisher's delivery worker, never from a request path
//! - Transient failures are reported as [`PublishError::Transient`] and retried
//!   by the publisher
//! - Payloads that cannot be encoded are [`PublishError::Permanent`]

use crate::event::CommentEvent;
use async_trait::async_trait;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use thiserror::Error;
use tokio::sync::watch;

/// Failure to deliver an event to the bus.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PublishError {
    /// The bus was unreachable or slow; retrying may succeed.
    #[error("Transient publish failure: {0}")]
    Transient(String),

    /// The event can never be delivered (e.g. it does not serialize).
    #[error("Permanent publish failure: {0}")]
    Permanent(String),
}

impl PublishError {
    /// Whether the publisher should retry after this error.
    #[must_use]
    pub const fn is_transient(&self) -> bool {
        matches!(self, Self::Transient(_))
    }
}

/// Destination for comment events.
#[async_trait]
pub trait EventSink: Send + Sync {
    /// Deliver one event to `topic`.
    ///
    /// # Errors
    ///
    /// Returns [`PublishError::Transient`] when delivery may succeed on retry
    /// and [`PublishError::Permanent`] when it never will.
    async fn send(&self, topic: &str, event: &CommentEvent) -> Result<(), PublishError>;
}

#[async_trait]
impl<T: EventSink + ?Sized> EventSink for Arc<T> {
    async fn send(&self, topic: &str, event: &CommentEvent) -> Result<(), PublishError> {
        (**self).send(topic, event).await
    }
}

/// A single recorded `send` invocation.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SentEvent {
    /// Topic the event was sent to
    pub topic: String,
    /// The event itself
    pub event: CommentEvent,
}

/// Sink that records every event it receives.
///
/// Cloning shares the underlying record, so a test can keep one handle while
/// the publisher owns another.
#[derive(Clone)]
pub struct RecordingEventSink {
    sent: Arc<Mutex<Vec<SentEvent>>>,
    count: Arc<watch::Sender<usize>>,
}

impl RecordingEventSink {
    /// Creates an empty recording sink.
    #[must_use]
    pub fn new() -> Self {
        let (count, _) = watch::channel(0);
        Self {
            sent: Arc::new(Mutex::new(Vec::new())),
            count: Arc::new(count),
        }
    }

    /// Returns a copy of everything sent so far, in delivery order.
    #[must_use]
    pub fn sent(&self) -> Vec<SentEvent> {
        self.sent
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Returns the recorded events without their topics.
    #[must_use]
    pub fn events(&self) -> Vec<CommentEvent> {
        self.sent().into_iter().map(|s| s.event).collect()
    }

    /// Number of `send` invocations so far.
    #[must_use]
    pub fn len(&self) -> usize {
        *self.count.borrow()
    }

    /// Returns true if nothing has been sent.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Waits until at least `expected` sends were recorded.
    ///
    /// Returns `false` if `timeout` elapses first.
    pub async fn wait_for(&self, expected: usize, timeout: Duration) -> bool {
        let mut rx = self.count.subscribe();
        tokio::time::timeout(timeout, rx.wait_for(|count| *count >= expected))
            .await
            .is_ok_and(|result| result.is_ok())
    }
}

impl Default for RecordingEventSink {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl EventSink for RecordingEventSink {
    async fn send(&self, topic: &str, event: &CommentEvent) -> Result<(), PublishError> {
        self.sent
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(SentEvent {
                topic: topic.to_string(),
                event: event.clone(),
            });
        self.count.send_modify(|count| *count += 1);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{CommentId, TicketId, UserId};
    use chrono::Utc;

    fn event(id: i64) -> CommentEvent {
        CommentEvent {
            comment_id: CommentId::new(id),
            ticket_id: TicketId::new(1),
            body: format!("comment {id}"),
            author_id: UserId::new(1),
            created_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn recording_sink_collects_events_in_order() {
        let sink = RecordingEventSink::new();
        assert!(sink.is_empty());

        sink.send("comment-events", &event(1)).await.ok();
        sink.send("comment-events", &event(2)).await.ok();

        assert_eq!(sink.len(), 2);
        let ids: Vec<i64> = sink.events().iter().map(|e| e.comment_id.get()).collect();
        assert_eq!(ids, vec![1, 2]);
        assert_eq!(sink.sent()[0].topic, "comment-events");
    }

    #[tokio::test]
    async fn wait_for_returns_once_count_is_reached() {
        let sink = RecordingEventSink::new();
        let handle = sink.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            handle.send("t", &event(1)).await.ok();
        });

        assert!(sink.wait_for(1, Duration::from_secs(2)).await);
    }

    #[tokio::test]
    async fn wait_for_times_out() {
        let sink = RecordingEventSink::new();
        assert!(!sink.wait_for(1, Duration::from_millis(20)).await);
    }

    #[test]
    fn only_transient_errors_are_retryable() {
        assert!(PublishError::Transient("down".into()).is_transient());
        assert!(!PublishError::Permanent("bad payload".into()).is_transient());
    }
}
