//! Redpanda event bus for the tracker.
//!
//! [`RedpandaEventBus`] implements [`EventBus`] with rdkafka, so it works
//! against Redpanda or any other Kafka-compatible broker.
//!
//! # Record layout
//!
//! | Kafka field          | Source                                    |
//! |----------------------|-------------------------------------------|
//! | key                  | [`SerializedEvent::key`] (the ticket id)  |
//! | payload              | [`SerializedEvent::data`] (bincode)       |
//! | header `event_type`  | [`SerializedEvent::event_type`]           |
//! | header `metadata`    | [`SerializedEvent::metadata`] as JSON     |
//!
//! Keying by ticket keeps every ticket's comment events on one partition and
//! therefore in order.
//!
//! # Delivery Semantics
//!
//! **At-least-once delivery** with manual offset commits:
//! - Offsets are committed after the event reached the subscriber's channel
//! - If the process crashes before commit, events will be redelivered
//! - Subscribers must be idempotent on the comment id
//!
//! # Example
//!
//! ```no_run
//! use tracker_redpanda::RedpandaEventBus;
//! use tracker_core::event_bus::EventBus;
//! use futures::StreamExt;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let event_bus = RedpandaEventBus::builder()
//!     .brokers("localhost:9092")
//!     .producer_acks("all")
//!     .build()?;
//!
//! let mut stream = event_bus.subscribe(&["comment-events"]).await?;
//! while let Some(result) = stream.next().await {
//!     match result {
//!         Ok(event) => println!("Received: {event}"),
//!         Err(e) => eprintln!("Error: {e}"),
//!     }
//! }
//! # Ok(())
//! # }
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

use rdkafka::config::ClientConfig;
use rdkafka::consumer::{Consumer, StreamConsumer};
use rdkafka::message::{Header, Headers, Message, OwnedHeaders};
use rdkafka::producer::{FutureProducer, FutureRecord};
use rdkafka::util::Timeout;
use std::future::Future;
use std::pin::Pin;
use std::time::Duration;
use tracker_core::SerializedEvent;
use tracker_core::event_bus::{EventBus, EventBusError, EventStream};

/// Header carrying the event type.
pub const EVENT_TYPE_HEADER: &str = "event_type";

/// Header carrying the JSON metadata.
pub const METADATA_HEADER: &str = "metadata";

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(5);
const DEFAULT_BUFFER_SIZE: usize = 1000;

/// Redpanda event bus implementation.
///
/// # Example
///
/// ```no_run
/// use tracker_redpanda::RedpandaEventBus;
///
/// # fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let event_bus = RedpandaEventBus::new("localhost:9092")?;
///
/// let event_bus = RedpandaEventBus::builder()
///     .brokers("localhost:9092,localhost:9093")
///     .producer_acks("all")
///     .timeout(std::time::Duration::from_secs(10))
///     .build()?;
/// # Ok(())
/// # }
/// ```
pub struct RedpandaEventBus {
    producer: FutureProducer,
    brokers: String,
    timeout: Duration,
    consumer_group: Option<String>,
    buffer_size: usize,
    auto_offset_reset: String,
}

impl RedpandaEventBus {
    /// Connect to `brokers` with default settings.
    ///
    /// # Errors
    ///
    /// Returns [`EventBusError::ConnectionFailed`] if the producer cannot be
    /// created.
    pub fn new(brokers: &str) -> Result<Self, EventBusError> {
        Self::builder().brokers(brokers).build()
    }

    /// Create a builder.
    #[must_use]
    pub fn builder() -> RedpandaEventBusBuilder {
        RedpandaEventBusBuilder::default()
    }

    /// Bootstrap servers this bus talks to.
    #[must_use]
    pub fn brokers(&self) -> &str {
        &self.brokers
    }
}

/// Builder for [`RedpandaEventBus`].
#[derive(Debug, Default)]
pub struct RedpandaEventBusBuilder {
    brokers: Option<String>,
    producer_acks: Option<String>,
    timeout: Option<Duration>,
    consumer_group: Option<String>,
    buffer_size: Option<usize>,
    auto_offset_reset: Option<String>,
}

impl RedpandaEventBusBuilder {
    /// Comma-separated bootstrap servers.
    #[must_use]
    pub fn brokers(mut self, brokers: impl Into<String>) -> Self {
        self.brokers = Some(brokers.into());
        self
    }

    /// Producer `acks` setting: `0`, `1` or `all` (default `1`).
    #[must_use]
    pub fn producer_acks(mut self, acks: impl Into<String>) -> Self {
        self.producer_acks = Some(acks.into());
        self
    }

    /// How long a publish may wait for the broker (default 5s).
    #[must_use]
    pub const fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Explicit consumer group; otherwise derived from the topics.
    #[must_use]
    pub fn consumer_group(mut self, consumer_group: impl Into<String>) -> Self {
        self.consumer_group = Some(consumer_group.into());
        self
    }

    /// Events buffered per subscriber (default 1000).
    #[must_use]
    pub const fn buffer_size(mut self, buffer_size: usize) -> Self {
        self.buffer_size = Some(buffer_size);
        self
    }

    /// Where a new consumer group starts: `earliest` or `latest` (default).
    #[must_use]
    pub fn auto_offset_reset(mut self, policy: impl Into<String>) -> Self {
        self.auto_offset_reset = Some(policy.into());
        self
    }

    /// Create the producer.
    ///
    /// # Errors
    ///
    /// Returns [`EventBusError::ConnectionFailed`] if no brokers are set or the
    /// producer cannot be created.
    pub fn build(self) -> Result<RedpandaEventBus, EventBusError> {
        let brokers = self
            .brokers
            .ok_or_else(|| EventBusError::ConnectionFailed("Brokers not configured".to_string()))?;
        let timeout = self.timeout.unwrap_or(DEFAULT_TIMEOUT);
        let acks = self.producer_acks.as_deref().unwrap_or("1");

        let producer: FutureProducer = ClientConfig::new()
            .set("bootstrap.servers", &brokers)
            .set("message.timeout.ms", timeout.as_millis().to_string())
            .set("acks", acks)
            .create()
            .map_err(|e| {
                EventBusError::ConnectionFailed(format!("Failed to create producer: {e}"))
            })?;

        tracing::info!(
            brokers = %brokers,
            acks,
            timeout_ms = u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX),
            "RedpandaEventBus created"
        );

        Ok(RedpandaEventBus {
            producer,
            brokers,
            timeout,
            consumer_group: self.consumer_group,
            buffer_size: self.buffer_size.unwrap_or(DEFAULT_BUFFER_SIZE),
            auto_offset_reset: self
                .auto_offset_reset
                .unwrap_or_else(|| "latest".to_string()),
        })
    }
}

/// Headers for a record carrying `event`.
///
/// # Errors
///
/// Returns [`EventBusError::PublishFailed`] if the metadata cannot be encoded.
fn record_headers(topic: &str, event: &SerializedEvent) -> Result<OwnedHeaders, EventBusError> {
    let mut headers = OwnedHeaders::new().insert(Header {
        key: EVENT_TYPE_HEADER,
        value: Some(event.event_type.as_str()),
    });

    if let Some(metadata) = &event.metadata {
        let json = serde_json::to_string(metadata).map_err(|e| EventBusError::PublishFailed {
            topic: topic.to_string(),
            reason: format!("Failed to encode metadata: {e}"),
        })?;
        headers = headers.insert(Header {
            key: METADATA_HEADER,
            value: Some(json.as_str()),
        });
    }

    Ok(headers)
}

/// Rebuild a [`SerializedEvent`] from the parts of a received record.
///
/// # Errors
///
/// Returns [`EventBusError::DeserializationFailed`] if the payload or the
/// `event_type` header is missing, or the metadata is not JSON.
pub fn event_from_record<'a>(
    key: Option<&[u8]>,
    payload: Option<&[u8]>,
    headers: impl IntoIterator<Item = (&'a str, Option<&'a [u8]>)>,
) -> Result<SerializedEvent, EventBusError> {
    let payload = payload.ok_or_else(|| {
        EventBusError::DeserializationFailed("Message has no payload".to_string())
    })?;

    let mut event_type = None;
    let mut metadata = None;
    for (name, value) in headers {
        match (name, value) {
            (EVENT_TYPE_HEADER, Some(value)) => {
                event_type = Some(String::from_utf8_lossy(value).into_owned());
            }
            (METADATA_HEADER, Some(value)) => {
                metadata = Some(serde_json::from_slice(value).map_err(|e| {
                    EventBusError::DeserializationFailed(format!("Invalid metadata header: {e}"))
                })?);
            }
            _ => {}
        }
    }

    let event_type = event_type.ok_or_else(|| {
        EventBusError::DeserializationFailed(format!("Missing {EVENT_TYPE_HEADER} header"))
    })?;
    let key = key.map(|k| String::from_utf8_lossy(k).into_owned());

    Ok(SerializedEvent::new(event_type, key, payload.to_vec(), metadata))
}

impl EventBus for RedpandaEventBus {
    fn publish(
        &self,
        topic: &str,
        event: &SerializedEvent,
    ) -> Pin<Box<dyn Future<Output = Result<(), EventBusError>> + Send + '_>> {
        let topic = topic.to_string();
        let event = event.clone();
        let timeout = self.timeout;

        Box::pin(async move {
            let headers = record_headers(&topic, &event)?;

            let mut record: FutureRecord<'_, str, [u8]> = FutureRecord::to(&topic)
                .payload(event.data.as_slice())
                .headers(headers);
            if let Some(key) = event.key.as_deref() {
                record = record.key(key);
            }

            match self.producer.send(record, Timeout::After(timeout)).await {
                Ok((partition, offset)) => {
                    tracing::debug!(
                        topic = %topic,
                        partition,
                        offset,
                        event_type = %event.event_type,
                        "Event published"
                    );
                    Ok(())
                }
                Err((kafka_error, _)) => {
                    tracing::warn!(
                        topic = %topic,
                        error = %kafka_error,
                        "Failed to publish event"
                    );
                    Err(EventBusError::PublishFailed {
                        topic,
                        reason: kafka_error.to_string(),
                    })
                }
            }
        })
    }

    fn subscribe(
        &self,
        topics: &[&str],
    ) -> Pin<Box<dyn Future<Output = Result<EventStream, EventBusError>> + Send + '_>> {
        let topics: Vec<String> = topics.iter().map(|s| (*s).to_string()).collect();
        let brokers = self.brokers.clone();
        let consumer_group = self.consumer_group.clone();
        let buffer_size = self.buffer_size;
        let auto_offset_reset = self.auto_offset_reset.clone();

        Box::pin(async move {
            let consumer_group_id = consumer_group.unwrap_or_else(|| {
                let mut sorted_topics = topics.clone();
                sorted_topics.sort();
                format!("tracker-{}", sorted_topics.join("-"))
            });

            let consumer: StreamConsumer = ClientConfig::new()
                .set("bootstrap.servers", &brokers)
                .set("group.id", &consumer_group_id)
                .set("enable.auto.commit", "false")
                .set("auto.offset.reset", &auto_offset_reset)
                .set("session.timeout.ms", "6000")
                .set("enable.partition.eof", "false")
                .create()
                .map_err(|e| EventBusError::SubscriptionFailed {
                    topics: topics.clone(),
                    reason: format!("Failed to create consumer: {e}"),
                })?;

            let topic_refs: Vec<&str> = topics.iter().map(String::as_str).collect();
            consumer
                .subscribe(&topic_refs)
                .map_err(|e| EventBusError::SubscriptionFailed {
                    topics: topics.clone(),
                    reason: format!("Failed to subscribe to topics: {e}"),
                })?;

            tracing::info!(
                topics = ?topics,
                consumer_group = %consumer_group_id,
                buffer_size,
                "Subscribed to topics"
            );

            let (tx, rx) = tokio::sync::mpsc::channel(buffer_size);

            tokio::spawn(async move {
                use futures::StreamExt;
                use rdkafka::consumer::CommitMode;

                let mut stream = consumer.stream();

                while let Some(msg_result) = stream.next().await {
                    let message = match msg_result {
                        Ok(message) => message,
                        Err(e) => {
                            let err = EventBusError::TransportError(format!(
                                "Failed to receive message: {e}"
                            ));
                            if tx.send(Err(err)).await.is_err() {
                                break;
                            }
                            continue;
                        }
                    };

                    let headers: Vec<(&str, Option<&[u8]>)> = message
                        .headers()
                        .map(|h| h.iter().map(|h| (h.key, h.value)).collect())
                        .unwrap_or_default();
                    let event = event_from_record(message.key(), message.payload(), headers);

                    // Receiver dropped: exit without committing.
                    if tx.send(event).await.is_err() {
                        break;
                    }

                    if let Err(e) = consumer.commit_message(&message, CommitMode::Async) {
                        tracing::warn!(
                            topic = message.topic(),
                            partition = message.partition(),
                            offset = message.offset(),
                            error = %e,
                            "Failed to commit offset (message may be redelivered)"
                        );
                    }
                }

                tracing::debug!("Consumer task exiting");
            });

            let stream = async_stream::stream! {
                let mut rx = rx;
                while let Some(result) = rx.recv().await {
                    yield result;
                }
            };

            Ok(Box::pin(stream) as EventStream)
        })
    }
}
