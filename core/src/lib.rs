//! # Tracker Core
//!
//! Domain types and capability traits shared by every tracker crate.
//!
//! The crate deliberately contains no I/O. It defines:
//!
//! - **Entities**: tickets, comments, applications, software releases
//!   ([`types`])
//! - **Events**: the `CommentEvent` payload and its wire envelope ([`event`])
//! - **Capabilities**: the seams where the outside world plugs in
//!   - [`storage::Storage`] / [`storage::Transaction`]: relational persistence
//!     with explicit transaction handles
//!   - [`event_bus::EventBus`]: Kafka-compatible publish/subscribe
//!   - [`sink::EventSink`]: where the publisher delivers comment events
//!   - [`tags::TagSource`]: version-control tag lookup for releases
//!
//! ## Write / publish ordering
//!
//! ```text
//! submit ──▶ Transaction ──▶ commit ──▶ EventPublisher ──▶ EventSink ──▶ bus
//!                 │                        (async)
//!                 ▼
//!           readers see the comment as soon as commit returns
//! ```
//!
//! A comment is readable before, or at the latest together with, the delivery
//! of its event. Event delivery never precedes the commit.

#![forbid(unsafe_code)]

pub mod error;
pub mod event;
pub mod event_bus;
pub mod sink;
pub mod storage;
pub mod tags;
pub mod types;

// Re-export commonly used types
pub use chrono::{DateTime, NaiveDate, Utc};
pub use error::StoreError;
pub use event::{CommentEvent, Event, SerializedEvent};
pub use sink::{EventSink, PublishError, RecordingEventSink};
pub use storage::{Storage, Transaction};
pub use tags::{EmptyTagSource, TagSource, TagSourceError};
pub use types::{
    Application, ApplicationId, Comment, CommentId, NewApplication, NewComment, NewRelease,
    NewTicket, ReleaseId, ReleaseView, SoftwareRelease, Ticket, TicketId, UserId,
};
