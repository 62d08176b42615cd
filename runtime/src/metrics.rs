//! Prometheus metrics.
//!
//! The publisher and services record through the `metrics` facade; this module
//! installs the Prometheus recorder and describes the series so the scrape
//! output carries help text.
//!
//! # Example
//!
//! ```rust,no_run
//! use tracker_runtime::metrics::MetricsRecorder;
//!
//! # fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let recorder = MetricsRecorder::install()?;
//! println!("{}", recorder.render());
//! # Ok(())
//! # }
//! ```

use metrics::describe_counter;
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use thiserror::Error;

/// Errors from metrics setup.
#[derive(Error, Debug)]
pub enum MetricsError {
    /// Failed to install the Prometheus recorder
    #[error("Failed to install metrics recorder: {0}")]
    Install(String),
}

/// Handle to the installed Prometheus recorder.
#[derive(Clone)]
pub struct MetricsRecorder {
    handle: PrometheusHandle,
}

impl MetricsRecorder {
    /// Install the global Prometheus recorder and describe tracker metrics.
    ///
    /// # Errors
    ///
    /// Returns [`MetricsError::Install`] if a recorder is already installed.
    pub fn install() -> Result<Self, MetricsError> {
        let handle = PrometheusBuilder::new()
            .install_recorder()
            .map_err(|e| MetricsError::Install(e.to_string()))?;

        describe_metrics();
        tracing::info!("Prometheus metrics recorder installed");

        Ok(Self { handle })
    }

    /// Current metrics in Prometheus text format.
    #[must_use]
    pub fn render(&self) -> String {
        self.handle.render()
    }
}

fn describe_metrics() {
    describe_counter!(
        "tracker.publisher.enqueued",
        "Comment events accepted onto the publish queue"
    );
    describe_counter!(
        "tracker.publisher.backpressure",
        "Comment events that found the publish queue full and waited for room"
    );
    describe_counter!(
        "tracker.publisher.delivered",
        "Comment events the sink accepted"
    );
    describe_counter!(
        "tracker.publisher.retried",
        "Sink retries after transient failures"
    );
    describe_counter!(
        "tracker.publisher.dropped",
        "Comment events given up on, labelled by reason"
    );
    describe_counter!(
        "tracker.comments.submitted",
        "Comments committed through the ingestion path"
    );
    describe_counter!(
        "tracker.releases.tag_lookups",
        "Tag source lookups, labelled by outcome"
    );
}
