//! Domain events and their wire envelope.
//!
//! Event payloads are serialized with `bincode`; the envelope
//! ([`SerializedEvent`]) carries the event type, an optional partition key and
//! JSON metadata alongside the bytes.
//!
//! # Example
//!
//! ```
//! use tracker_core::event::{Event, SerializedEvent};
//! use serde::{Serialize, Deserialize};
//!
//! #[derive(Clone, Debug, Serialize, Deserialize)]
//! struct TicketClosed { ticket_id: i64 }
//!
//! impl Event for TicketClosed {
//!     fn event_type(&self) -> &'static str { "TicketClosed.v1" }
//!     fn partition_key(&self) -> Option<String> { Some(self.ticket_id.to_string()) }
//! }
//!
//! let envelope = SerializedEvent::from_event(&TicketClosed { ticket_id: 1 }, None).unwrap();
//! assert_eq!(envelope.key.as_deref(), Some("1"));
//! ```

use crate::types::{Comment, CommentId, TicketId, UserId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize, de::DeserializeOwned};
use std::fmt;
use thiserror::Error;

/// Error types for event operations.
#[derive(Error, Debug)]
pub enum EventError {
    /// Failed to serialize event to bytes.
    #[error("Failed to serialize event: {0}")]
    SerializationError(String),

    /// Failed to deserialize event from bytes.
    #[error("Failed to deserialize event: {0}")]
    DeserializationError(String),

    /// Envelope carried an event type the reader does not understand.
    #[error("Unknown event type: {0}")]
    UnknownEventType(String),
}

/// An immutable fact that can be published to the event bus.
///
/// # Event Naming Convention
///
/// `event_type()` returns a stable identifier with a version suffix, e.g.
/// `"CommentCreated.v1"`, so consumers can route and evolve schemas.
pub trait Event: Send + Sync + 'static {
    /// Returns the event type identifier for this event.
    fn event_type(&self) -> &'static str;

    /// Key used to pick a bus partition. Events sharing a key keep their
    /// relative order.
    fn partition_key(&self) -> Option<String> {
        None
    }

    /// Serialize this event to bincode bytes.
    ///
    /// # Errors
    ///
    /// Returns `EventError::SerializationError` if the event cannot be serialized.
    fn to_bytes(&self) -> Result<Vec<u8>, EventError>
    where
        Self: Serialize,
    {
        bincode::serialize(self).map_err(|e| EventError::SerializationError(e.to_string()))
    }

    /// Deserialize an event from bincode bytes.
    ///
    /// # Errors
    ///
    /// Returns `EventError::DeserializationError` if the bytes are corrupted or
    /// belong to a different event schema.
    fn from_bytes(bytes: &[u8]) -> Result<Self, EventError>
    where
        Self: DeserializeOwned + Sized,
    {
        bincode::deserialize(bytes).map_err(|e| EventError::DeserializationError(e.to_string()))
    }
}

/// A serialized event ready for the bus.
#[derive(Clone, Debug, PartialEq)]
pub struct SerializedEvent {
    /// The event type identifier (e.g., "CommentCreated.v1").
    pub event_type: String,

    /// Partition key; `None` lets the bus choose.
    pub key: Option<String>,

    /// The bincode-serialized event data.
    pub data: Vec<u8>,

    /// Optional metadata.
    ///
    /// Common fields:
    /// - `correlation_id`: the HTTP request that produced the event
    /// - `published_at`: when the publisher handed the event to the bus
    pub metadata: Option<serde_json::Value>,
}

impl SerializedEvent {
    /// Create a new serialized event.
    #[must_use]
    pub const fn new(
        event_type: String,
        key: Option<String>,
        data: Vec<u8>,
        metadata: Option<serde_json::Value>,
    ) -> Self {
        Self {
            event_type,
            key,
            data,
            metadata,
        }
    }

    /// Create a serialized event from an [`Event`].
    ///
    /// # Errors
    ///
    /// Returns `EventError::SerializationError` if the event cannot be serialized.
    pub fn from_event<E: Event + Serialize>(
        event: &E,
        metadata: Option<serde_json::Value>,
    ) -> Result<Self, EventError> {
        Ok(Self {
            event_type: event.event_type().to_string(),
            key: event.partition_key(),
            data: event.to_bytes()?,
            metadata,
        })
    }

    /// Decode the payload as `E`, checking the event type first.
    ///
    /// # Errors
    ///
    /// Returns `EventError::UnknownEventType` on a type mismatch and
    /// `EventError::DeserializationError` on corrupt data.
    pub fn decode<E>(&self, expected_type: &str) -> Result<E, EventError>
    where
        E: Event + DeserializeOwned,
    {
        if self.event_type != expected_type {
            return Err(EventError::UnknownEventType(self.event_type.clone()));
        }
        E::from_bytes(&self.data)
    }
}

impl fmt::Display for SerializedEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "SerializedEvent {{ type: {}, key: {}, size: {} bytes }}",
            self.event_type,
            self.key.as_deref().unwrap_or("-"),
            self.data.len()
        )
    }
}

/// Emitted after a comment has been committed.
///
/// Mirrors the persisted [`Comment`]. Consumers may see the same event more
/// than once and must be idempotent on `comment_id`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommentEvent {
    /// Identity of the persisted comment
    pub comment_id: CommentId,
    /// Parent ticket
    pub ticket_id: TicketId,
    /// Comment body
    pub body: String,
    /// Author
    pub author_id: UserId,
    /// Commit timestamp of the comment
    pub created_at: DateTime<Utc>,
}

impl CommentEvent {
    /// Event type identifier on the bus.
    pub const EVENT_TYPE: &'static str = "CommentCreated.v1";
}

impl From<&Comment> for CommentEvent {
    fn from(comment: &Comment) -> Self {
        Self {
            comment_id: comment.id,
            ticket_id: comment.ticket_id,
            body: comment.body.clone(),
            author_id: comment.author_id,
            created_at: comment.created_at,
        }
    }
}

impl Event for CommentEvent {
    fn event_type(&self) -> &'static str {
        Self::EVENT_TYPE
    }

    // Per-ticket ordering on the bus.
    fn partition_key(&self) -> Option<String> {
        Some(self.ticket_id.to_string())
    }
}

#[cfg(test)]
#[allow(clippy::expect_used)]
mod tests {
    use super::*;

    fn comment_event() -> CommentEvent {
        CommentEvent {
            comment_id: CommentId::new(11),
            ticket_id: TicketId::new(3),
            body: "Comment text".to_string(),
            author_id: UserId::new(1),
            created_at: DateTime::parse_from_rfc3339("2025-01-01T00:00:00Z")
                .expect("valid timestamp")
                .with_timezone(&Utc),
        }
    }

    #[test]
    fn comment_event_is_keyed_by_ticket() {
        let serialized =
            SerializedEvent::from_event(&comment_event(), None).expect("serialization should succeed");

        assert_eq!(serialized.event_type, "CommentCreated.v1");
        assert_eq!(serialized.key.as_deref(), Some("3"));
        assert!(!serialized.data.is_empty());
    }

    #[test]
    fn decode_restores_the_event() {
        let event = comment_event();
        let metadata = serde_json::json!({ "correlation_id": "corr-456" });
        let serialized = SerializedEvent::from_event(&event, Some(metadata.clone()))
            .expect("serialization should succeed");

        let decoded: CommentEvent = serialized
            .decode(CommentEvent::EVENT_TYPE)
            .expect("decode should succeed");
        assert_eq!(decoded, event);
        assert_eq!(serialized.metadata, Some(metadata));
    }

    #[test]
    fn decode_rejects_other_event_types() {
        let serialized = SerializedEvent::new("TicketClosed.v1".to_string(), None, vec![1], None);
        let result: Result<CommentEvent, _> = serialized.decode(CommentEvent::EVENT_TYPE);
        assert!(matches!(result, Err(EventError::UnknownEventType(t)) if t == "TicketClosed.v1"));
    }

    #[test]
    fn event_from_comment_mirrors_fields() {
        let comment = Comment {
            id: CommentId::new(5),
            ticket_id: TicketId::new(2),
            body: "hi".to_string(),
            author_id: UserId::new(8),
            created_at: Utc::now(),
        };
        let event = CommentEvent::from(&comment);
        assert_eq!(event.comment_id, comment.id);
        assert_eq!(event.ticket_id, comment.ticket_id);
        assert_eq!(event.body, comment.body);
        assert_eq!(event.author_id, comment.author_id);
        assert_eq!(event.created_at, comment.created_at);
    }

    #[test]
    fn serialized_event_display() {
        let serialized =
            SerializedEvent::new("TestEvent.v1".to_string(), Some("k".to_string()), vec![1, 2, 3], None);
        let display = format!("{serialized}");
        assert!(display.contains("TestEvent.v1"));
        assert!(display.contains("3 bytes"));
    }
}
