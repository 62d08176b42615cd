//! Tracker server wiring.
//!
//! [`config`] reads the environment; the functions here turn a
//! [`Config`](config::Config) into the capabilities the services run on.

#![forbid(unsafe_code)]

pub mod config;

use anyhow::Context;
use config::{Config, EventSinkKind};
use std::sync::Arc;
use std::time::Duration;
use tracker_core::event_bus::EventBus;
use tracker_core::{EmptyTagSource, EventSink, RecordingEventSink, TagSource};
use tracker_redpanda::RedpandaEventBus;
use tracker_runtime::{BusEventSink, HttpTagSource};

/// The event sink selected by `EVENT_SINK`.
///
/// # Errors
///
/// Fails when the Redpanda producer cannot be created.
pub fn event_sink(config: &Config) -> anyhow::Result<Arc<dyn EventSink>> {
    match config.sink {
        EventSinkKind::Redpanda => {
            let bus: Arc<dyn EventBus> = Arc::new(
                RedpandaEventBus::builder()
                    .brokers(&config.redpanda.brokers)
                    .producer_acks(&config.redpanda.acks)
                    .timeout(Duration::from_millis(config.redpanda.timeout_ms))
                    .build()
                    .context("Failed to create Redpanda producer")?,
            );
            tracing::info!(brokers = %config.redpanda.brokers, "Publishing comment events to Redpanda");
            Ok(Arc::new(BusEventSink::new(bus)))
        }
        EventSinkKind::Recording => {
            tracing::warn!("EVENT_SINK=recording: comment events stay in memory");
            Ok(Arc::new(RecordingEventSink::new()))
        }
    }
}

/// The tag source for release correlation.
///
/// Without `TAG_SERVICE_URL` every release reports no tags.
///
/// # Errors
///
/// Fails when the HTTP client cannot be built.
pub fn tag_source(config: &Config) -> anyhow::Result<Arc<dyn TagSource>> {
    let Some(url) = &config.tags.service_url else {
        tracing::info!("TAG_SERVICE_URL not set; releases will report no tags");
        return Ok(Arc::new(EmptyTagSource));
    };

    let source = HttpTagSource::new(url.as_str())
        .with_window(config.tags.window_before_days, config.tags.window_after_days)
        .with_timeout(Duration::from_millis(config.tags.timeout_ms))
        .context("Failed to build tag service client")?;
    tracing::info!(tag_service = %url, "Tag service configured");
    Ok(Arc::new(source))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use tracker_core::NaiveDate;

    fn config(vars: &[(&str, &str)]) -> Config {
        Config::from_lookup(|key| {
            vars.iter()
                .find(|(k, _)| *k == key)
                .map(|(_, v)| (*v).to_string())
        })
        .unwrap()
    }

    #[tokio::test]
    async fn no_tag_service_means_no_tags() {
        let tags = tag_source(&config(&[])).unwrap();

        let found = tags
            .tags_in_window(
                NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
                &["billing".to_string()],
            )
            .await
            .unwrap();

        assert!(found.is_empty());
    }

    #[test]
    fn recording_sink_needs_no_broker() {
        assert!(event_sink(&config(&[("EVENT_SINK", "recording")])).is_ok());
    }

    #[test]
    fn tag_service_url_builds_an_http_source() {
        assert!(tag_source(&config(&[("TAG_SERVICE_URL", "http://vcs.internal")])).is_ok());
    }
}
