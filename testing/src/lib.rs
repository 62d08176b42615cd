//! # Tracker Testing
//!
//! Test doubles for every tracker capability, so services and the HTTP layer
//! can be exercised without Postgres, Redpanda or a tag service.
//!
//! - [`InMemoryStorage`]: transactional in-memory store
//! - [`InMemoryEventBus`]: broadcast-backed event bus
//! - [`StaticTagSource`]: fixed tag answers, records lookups
//! - [`FlakyEventSink`]: fails on purpose to exercise publisher retries
//! - [`GatedEventSink`]: holds sends until opened, to fill the publish queue
//!
//! ## Example
//!
//! ```ignore
//! use tracker_testing::{InMemoryStorage, StaticTagSource};
//! use tracker_core::RecordingEventSink;
//!
//! let storage = InMemoryStorage::new();
//! let sink = RecordingEventSink::new();
//! let tags = StaticTagSource::new(["billing-2.1.0"]);
//! let services = TrackerServices::new(
//!     Arc::new(storage.clone()),
//!     Arc::new(sink.clone()),
//!     Arc::new(tags.clone()),
//!     PublisherConfig::default(),
//! );
//! ```

pub mod collaborators;
pub mod event_bus;
pub mod storage;

pub use collaborators::{FlakyEventSink, FlakyMode, GatedEventSink, StaticTagSource, TagQuery};
pub use event_bus::InMemoryEventBus;
pub use storage::{InMemoryStorage, InMemoryTransaction};

/// Test helpers.
pub mod helpers {
    use std::future::Future;
    use std::time::Duration;

    /// Install a `tracing` subscriber writing to the test output.
    ///
    /// Honors `RUST_LOG`. Safe to call from every test; only the first call
    /// installs anything.
    pub fn init_tracing() {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(
                tracing_subscriber::EnvFilter::try_from_default_env()
                    .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
            )
            .with_test_writer()
            .try_init();
    }

    /// Poll `check` every 10ms until it returns true or `timeout` elapses.
    ///
    /// Returns the last result of `check`.
    pub async fn eventually<F, Fut>(timeout: Duration, mut check: F) -> bool
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = bool>,
    {
        let deadline = tokio::time::Instant::now() + timeout;
        loop {
            if check().await {
                return true;
            }
            if tokio::time::Instant::now() >= deadline {
                return false;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    }
}

pub use helpers::{eventually, init_tracing};

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    #[tokio::test]
    async fn eventually_polls_until_true() {
        let calls = Arc::new(AtomicUsize::new(0));

        let ok = eventually(Duration::from_secs(1), || {
            let calls = Arc::clone(&calls);
            async move { calls.fetch_add(1, Ordering::SeqCst) >= 2 }
        })
        .await;

        assert!(ok);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn eventually_gives_up() {
        assert!(!eventually(Duration::from_millis(30), || async { false }).await);
    }
}
