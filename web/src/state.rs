//! Application state for Axum handlers.

use tracker_runtime::TrackerServices;
use tracker_runtime::metrics::MetricsRecorder;

/// State shared by every handler.
#[derive(Clone)]
pub struct AppState {
    /// The tracker services
    pub services: TrackerServices,
    /// Prometheus recorder backing `GET /metrics`, when installed
    pub metrics: Option<MetricsRecorder>,
}

impl AppState {
    /// State without a metrics recorder.
    #[must_use]
    pub const fn new(services: TrackerServices) -> Self {
        Self {
            services,
            metrics: None,
        }
    }

    /// Serve `recorder` on `GET /metrics`.
    #[must_use]
    pub fn with_metrics(mut self, recorder: MetricsRecorder) -> Self {
        self.metrics = Some(recorder);
        self
    }
}
