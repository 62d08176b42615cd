//! Comment event publisher.
//!
//! The ingestion path hands each committed comment's event to
//! [`EventPublisher::publish`] and moves on. A bounded queue decouples the
//! caller from delivery; one worker task drains it and pushes events into the
//! configured [`EventSink`].
//!
//! ```text
//! submit_comment ──publish()──▶ [ bounded mpsc queue ] ──▶ worker ──send()──▶ EventSink
//!                  │ queue full      ▲                       │
//!                  └──▶ overflow task┘                       ├─ Transient: backoff + retry
//!                       (waits for room)                     └─ Permanent: log error, drop
//! ```
//!
//! # Guarantees
//!
//! - **At-least-once**: transient failures are retried per [`RetryPolicy`];
//!   a retried send may duplicate an event the bus already accepted
//! - **FIFO while not saturated**: a single worker preserves enqueue order, so
//!   comments committed on one path are delivered in commit order. Events that
//!   overflowed a full queue may be delivered after later ones
//! - **Never surfaced**: `publish` returns `()`; failures end up in logs and
//!   the `tracker.publisher.*` counters
//!
//! `publish` is synchronous. When the queue is full the event is handed to a
//! detached task that waits for capacity, so a slow sink never holds up the
//! caller and dropping the caller's future cannot lose a committed event.

use crate::retry::{RetryError, RetryPolicy, retry_with_predicate};
use std::sync::{Arc, Mutex, PoisonError};
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tokio::task::JoinHandle;
use tracker_core::{CommentEvent, EventSink, PublishError};

/// Default topic for comment events.
pub const DEFAULT_COMMENT_TOPIC: &str = "comment-events";

/// Default queue capacity.
pub const DEFAULT_QUEUE_CAPACITY: usize = 1024;

/// Publisher settings.
#[derive(Debug, Clone, PartialEq)]
pub struct PublisherConfig {
    /// Topic every comment event is sent to
    pub topic: String,
    /// Events that can wait for delivery before `publish` spills into
    /// overflow tasks
    pub queue_capacity: usize,
    /// Backoff for transient sink failures
    pub retry: RetryPolicy,
}

/// The default retry budget backs off for about 80 seconds before an event
/// is dropped, enough to ride out a broker restart. A longer outage still
/// drops events; raising `retry.max_retries` trades that loss for a backlog
/// that keeps growing in memory while the broker is away.
impl Default for PublisherConfig {
    fn default() -> Self {
        Self {
            topic: DEFAULT_COMMENT_TOPIC.to_string(),
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
            retry: RetryPolicy::default(),
        }
    }
}

/// Handle to the publisher's queue and delivery worker.
pub struct EventPublisher {
    queue: Mutex<Option<mpsc::Sender<CommentEvent>>>,
    worker: Mutex<Option<JoinHandle<()>>>,
    topic: String,
}

impl EventPublisher {
    /// Start the delivery worker on the current Tokio runtime.
    ///
    /// A zero `queue_capacity` is raised to 1.
    #[must_use]
    pub fn spawn(sink: Arc<dyn EventSink>, config: PublisherConfig) -> Self {
        let (tx, rx) = mpsc::channel(config.queue_capacity.max(1));

        tracing::info!(
            topic = %config.topic,
            queue_capacity = config.queue_capacity,
            max_retries = config.retry.max_retries,
            "Event publisher started"
        );

        let worker = tokio::spawn(run_worker(
            rx,
            sink,
            config.topic.clone(),
            config.retry,
        ));

        Self {
            queue: Mutex::new(Some(tx)),
            worker: Mutex::new(Some(worker)),
            topic: config.topic,
        }
    }

    /// Topic events are delivered to.
    #[must_use]
    pub fn topic(&self) -> &str {
        &self.topic
    }

    /// Hand an event over for delivery.
    ///
    /// Never waits. If the queue is full the event is parked on a task that
    /// enqueues it once the worker catches up. If the publisher has been shut
    /// down the event is logged and dropped.
    pub fn publish(&self, event: CommentEvent) {
        let sender = self
            .queue
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();

        let Some(sender) = sender else {
            log_dropped(self.topic(), &event, "publisher is shut down");
            return;
        };

        match sender.try_send(event) {
            Ok(()) => metrics::counter!("tracker.publisher.enqueued").increment(1),
            Err(TrySendError::Full(event)) => self.overflow(sender, event),
            Err(TrySendError::Closed(event)) => {
                log_dropped(self.topic(), &event, "delivery worker has stopped");
            }
        }
    }

    /// Park `event` on a task that holds a sender until the queue has room.
    ///
    /// The task's sender keeps the worker alive, so `shutdown` waits for it.
    fn overflow(&self, sender: mpsc::Sender<CommentEvent>, event: CommentEvent) {
        metrics::counter!("tracker.publisher.backpressure").increment(1);
        tracing::warn!(
            topic = self.topic(),
            comment_id = %event.comment_id,
            ticket_id = %event.ticket_id,
            "Publish queue full, event waits for capacity"
        );

        let topic = self.topic.clone();
        tokio::spawn(async move {
            match sender.send(event).await {
                Ok(()) => metrics::counter!("tracker.publisher.enqueued").increment(1),
                Err(mpsc::error::SendError(event)) => {
                    log_dropped(&topic, &event, "delivery worker has stopped");
                }
            }
        });
    }

    /// Stop accepting events and wait until every queued event was handled.
    pub async fn shutdown(&self) {
        drop(self.queue.lock().unwrap_or_else(PoisonError::into_inner).take());

        let worker = self.worker.lock().unwrap_or_else(PoisonError::into_inner).take();
        if let Some(worker) = worker {
            if let Err(e) = worker.await {
                tracing::error!(error = %e, "Event publisher worker panicked");
            }
        }
    }
}

async fn run_worker(
    mut rx: mpsc::Receiver<CommentEvent>,
    sink: Arc<dyn EventSink>,
    topic: String,
    retry: RetryPolicy,
) {
    while let Some(event) = rx.recv().await {
        deliver(sink.as_ref(), &topic, &retry, &event).await;
    }
    tracing::info!(topic = %topic, "Event publisher stopped");
}

async fn deliver(sink: &dyn EventSink, topic: &str, retry: &RetryPolicy, event: &CommentEvent) {
    let mut attempts = 0_u64;
    let result = retry_with_predicate(
        retry,
        || {
            attempts += 1;
            sink.send(topic, event)
        },
        PublishError::is_transient,
    )
    .await;

    if attempts > 1 {
        metrics::counter!("tracker.publisher.retried").increment(attempts - 1);
    }

    match result {
        Ok(()) => {
            metrics::counter!("tracker.publisher.delivered").increment(1);
            tracing::debug!(
                topic,
                comment_id = %event.comment_id,
                ticket_id = %event.ticket_id,
                attempts,
                "Comment event delivered"
            );
        }
        Err(RetryError::Rejected(err)) => {
            metrics::counter!("tracker.publisher.dropped", "reason" => "permanent").increment(1);
            tracing::error!(
                topic,
                comment_id = %event.comment_id,
                ticket_id = %event.ticket_id,
                error = %err,
                "Comment event can never be delivered"
            );
        }
        Err(RetryError::Exhausted { attempts, last }) => {
            metrics::counter!("tracker.publisher.dropped", "reason" => "exhausted").increment(1);
            tracing::error!(
                topic,
                comment_id = %event.comment_id,
                ticket_id = %event.ticket_id,
                attempts,
                error = %last,
                "Comment event dropped after exhausting retries"
            );
        }
    }
}

fn log_dropped(topic: &str, event: &CommentEvent, reason: &'static str) {
    metrics::counter!("tracker.publisher.dropped", "reason" => "closed").increment(1);
    tracing::error!(
        topic,
        comment_id = %event.comment_id,
        ticket_id = %event.ticket_id,
        reason,
        "Comment event not queued"
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use tracker_core::types::{CommentId, TicketId, UserId};
    use tracker_core::{RecordingEventSink, Utc};
    use tracker_testing::GatedEventSink;

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
    async fn delivers_in_enqueue_order() {
        let sink = RecordingEventSink::new();
        let publisher = EventPublisher::spawn(Arc::new(sink.clone()), PublisherConfig::default());

        for id in 1..=5 {
            publisher.publish(event(id));
        }

        assert!(sink.wait_for(5, Duration::from_secs(2)).await);
        let ids: Vec<i64> = sink.events().iter().map(|e| e.comment_id.get()).collect();
        assert_eq!(ids, vec![1, 2, 3, 4, 5]);
        assert!(sink.sent().iter().all(|s| s.topic == DEFAULT_COMMENT_TOPIC));
    }

    #[tokio::test]
    async fn shutdown_drains_the_queue() {
        let sink = RecordingEventSink::new();
        let publisher = EventPublisher::spawn(
            Arc::new(sink.clone()),
            PublisherConfig {
                queue_capacity: 2,
                ..PublisherConfig::default()
            },
        );

        for id in 1..=4 {
            publisher.publish(event(id));
        }
        publisher.shutdown().await;

        assert_eq!(sink.len(), 4);
    }

    #[tokio::test]
    async fn overflow_is_delivered_before_shutdown_returns() {
        let sink = GatedEventSink::new();
        let publisher = EventPublisher::spawn(
            Arc::new(sink.clone()),
            PublisherConfig {
                queue_capacity: 1,
                ..PublisherConfig::default()
            },
        );

        for id in 1..=4 {
            publisher.publish(event(id));
        }
        sink.open();
        publisher.shutdown().await;

        let mut ids: Vec<i64> = sink
            .delivered()
            .events()
            .iter()
            .map(|e| e.comment_id.get())
            .collect();
        ids.sort_unstable();
        assert_eq!(ids, vec![1, 2, 3, 4]);
    }

    #[tokio::test]
    async fn configured_topic_is_used_for_delivery() {
        let sink = RecordingEventSink::new();
        let publisher = EventPublisher::spawn(
            Arc::new(sink.clone()),
            PublisherConfig {
                topic: "ticket-comments".to_string(),
                ..PublisherConfig::default()
            },
        );
        assert_eq!(publisher.topic(), "ticket-comments");

        publisher.publish(event(1));
        publisher.shutdown().await;

        assert_eq!(sink.sent()[0].topic, "ticket-comments");
    }

    #[tokio::test]
    async fn publish_after_shutdown_is_absorbed() {
        let sink = RecordingEventSink::new();
        let publisher = EventPublisher::spawn(Arc::new(sink.clone()), PublisherConfig::default());
        publisher.shutdown().await;

        publisher.publish(event(1));

        assert!(sink.is_empty());
    }
}
