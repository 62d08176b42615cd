//! # Tracker Runtime
//!
//! The services behind the tracker API.
//!
//! ## Components
//!
//! - [`comments::CommentService`]: comment ingestion and the read path
//! - [`publisher::EventPublisher`]: background, at-least-once delivery of
//!   comment events to an [`EventSink`](tracker_core::EventSink)
//! - [`releases::ReleaseService`]: release creation, application linking and
//!   release/tag correlation
//! - [`tickets::TicketService`], [`applications::ApplicationService`]:
//!   pass-through entities
//! - [`bus_sink::BusEventSink`], [`tag_source::HttpTagSource`]: production
//!   implementations of the core capabilities
//!
//! ## Example
//!
//! ```ignore
//! use tracker_runtime::{PublisherConfig, TrackerServices};
//!
//! let services = TrackerServices::new(storage, sink, tags, PublisherConfig::default());
//! let comment = services.comments.submit_comment(new_comment).await?;
//! services.shutdown().await;
//! ```

use std::sync::Arc;
use tracker_core::{EventSink, Storage, TagSource};

pub mod applications;
pub mod bus_sink;
pub mod comments;
pub mod error;
pub mod metrics;
pub mod publisher;
pub mod releases;
/// Retry logic with exponential backoff
pub mod retry;
pub mod tag_source;
pub mod tickets;

pub use applications::ApplicationService;
pub use bus_sink::BusEventSink;
pub use comments::CommentService;
pub use error::{ServiceError, ServiceResult};
pub use publisher::{EventPublisher, PublisherConfig};
pub use releases::ReleaseService;
pub use retry::RetryPolicy;
pub use tag_source::HttpTagSource;
pub use tickets::TicketService;

/// Every tracker service wired to one storage, one publisher and one tag
/// source.
#[derive(Clone)]
pub struct TrackerServices {
    /// Ticket pass-through
    pub tickets: TicketService,
    /// Comment ingestion and reads
    pub comments: CommentService,
    /// Application pass-through
    pub applications: ApplicationService,
    /// Release correlation
    pub releases: ReleaseService,
    /// The shared comment event publisher
    pub publisher: Arc<EventPublisher>,
}

impl TrackerServices {
    /// Wire the services and start the publisher worker.
    ///
    /// Must be called inside a Tokio runtime.
    #[must_use]
    pub fn new(
        storage: Arc<dyn Storage>,
        sink: Arc<dyn EventSink>,
        tags: Arc<dyn TagSource>,
        publisher_config: PublisherConfig,
    ) -> Self {
        let publisher = Arc::new(EventPublisher::spawn(sink, publisher_config));

        Self {
            tickets: TicketService::new(Arc::clone(&storage)),
            comments: CommentService::new(Arc::clone(&storage), Arc::clone(&publisher)),
            applications: ApplicationService::new(Arc::clone(&storage)),
            releases: ReleaseService::new(storage, tags),
            publisher,
        }
    }

    /// Stop the publisher after delivering every queued event.
    pub async fn shutdown(&self) {
        self.publisher.shutdown().await;
    }
}
