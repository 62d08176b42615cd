//! Doubles for the tag source and the event sink.

#![allow(clippy::missing_panics_doc)]

use async_trait::async_trait;
use chrono::NaiveDate;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use tokio::sync::watch;
use tracker_core::{
    CommentEvent, EventSink, PublishError, RecordingEventSink, TagSource, TagSourceError,
};

/// One recorded tag lookup.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TagQuery {
    /// Release date the window was anchored at
    pub anchor: NaiveDate,
    /// Repositories asked about
    pub repositories: Vec<String>,
}

/// Tag source that answers with a fixed list and remembers every question.
#[derive(Clone, Debug, Default)]
pub struct StaticTagSource {
    tags: Arc<Mutex<Vec<String>>>,
    failure: Arc<Mutex<Option<TagSourceError>>>,
    queries: Arc<Mutex<Vec<TagQuery>>>,
}

impl StaticTagSource {
    /// Answer every lookup with `tags`.
    #[must_use]
    pub fn new<I, S>(tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            tags: Arc::new(Mutex::new(tags.into_iter().map(Into::into).collect())),
            ..Self::default()
        }
    }

    /// Fail every lookup with `error`.
    #[must_use]
    pub fn failing(error: TagSourceError) -> Self {
        Self {
            failure: Arc::new(Mutex::new(Some(error))),
            ..Self::default()
        }
    }

    /// Replace the answer for subsequent lookups.
    pub fn set_tags<I, S>(&self, tags: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        *self.tags.lock().unwrap_or_else(PoisonError::into_inner) =
            tags.into_iter().map(Into::into).collect();
    }

    /// Every lookup so far, oldest first.
    #[must_use]
    pub fn queries(&self) -> Vec<TagQuery> {
        self.queries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

#[async_trait]
impl TagSource for StaticTagSource {
    async fn tags_in_window(
        &self,
        anchor: NaiveDate,
        repositories: &[String],
    ) -> Result<Vec<String>, TagSourceError> {
        self.queries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(TagQuery {
                anchor,
                repositories: repositories.to_vec(),
            });

        if let Some(error) = self
            .failure
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
        {
            return Err(error);
        }
        Ok(self.tags.lock().unwrap_or_else(PoisonError::into_inner).clone())
    }
}

/// How a [`FlakyEventSink`] misbehaves.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum FlakyMode {
    /// Fail the first `n` sends with a transient error, then succeed.
    TransientFailures(usize),
    /// Fail every send with a permanent error.
    AlwaysPermanent,
    /// Fail every send with a transient error.
    AlwaysTransient,
}

/// Sink that fails on purpose and records the sends that got through.
#[derive(Clone)]
pub struct FlakyEventSink {
    mode: FlakyMode,
    attempts: Arc<AtomicUsize>,
    delivered: RecordingEventSink,
}

impl FlakyEventSink {
    /// Create a sink failing according to `mode`.
    #[must_use]
    pub fn new(mode: FlakyMode) -> Self {
        Self {
            mode,
            attempts: Arc::new(AtomicUsize::new(0)),
            delivered: RecordingEventSink::new(),
        }
    }

    /// Total `send` calls, failed ones included.
    #[must_use]
    pub fn attempts(&self) -> usize {
        self.attempts.load(Ordering::SeqCst)
    }

    /// Record of the sends that succeeded.
    #[must_use]
    pub fn delivered(&self) -> &RecordingEventSink {
        &self.delivered
    }
}

#[async_trait]
impl EventSink for FlakyEventSink {
    async fn send(&self, topic: &str, event: &CommentEvent) -> Result<(), PublishError> {
        let attempt = self.attempts.fetch_add(1, Ordering::SeqCst);

        match self.mode {
            FlakyMode::TransientFailures(n) if attempt < n => Err(PublishError::Transient(
                format!("broker unavailable (attempt {})", attempt + 1),
            )),
            FlakyMode::AlwaysTransient => {
                Err(PublishError::Transient("broker unavailable".to_string()))
            }
            FlakyMode::AlwaysPermanent => {
                Err(PublishError::Permanent("record too large".to_string()))
            }
            FlakyMode::TransientFailures(_) => self.delivered.send(topic, event).await,
        }
    }
}

/// Sink that holds every send until [`GatedEventSink::open`] is called.
///
/// Keeps the publisher worker busy so tests can fill its queue.
#[derive(Clone)]
pub struct GatedEventSink {
    gate: Arc<watch::Sender<bool>>,
    entered: Arc<AtomicUsize>,
    delivered: RecordingEventSink,
}

impl GatedEventSink {
    /// Create a closed gate.
    #[must_use]
    pub fn new() -> Self {
        let (gate, _) = watch::channel(false);
        Self {
            gate: Arc::new(gate),
            entered: Arc::new(AtomicUsize::new(0)),
            delivered: RecordingEventSink::new(),
        }
    }

    /// Let every waiting and future send through.
    pub fn open(&self) {
        self.gate.send_replace(true);
    }

    /// Sends that have started, including those still held at the gate.
    #[must_use]
    pub fn entered(&self) -> usize {
        self.entered.load(Ordering::SeqCst)
    }

    /// Record of the sends that passed the gate.
    #[must_use]
    pub fn delivered(&self) -> &RecordingEventSink {
        &self.delivered
    }
}

impl Default for GatedEventSink {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl EventSink for GatedEventSink {
    async fn send(&self, topic: &str, event: &CommentEvent) -> Result<(), PublishError> {
        self.entered.fetch_add(1, Ordering::SeqCst);

        let mut gate = self.gate.subscribe();
        if gate.wait_for(|open| *open).await.is_err() {
            return Err(PublishError::Transient("gate closed".to_string()));
        }
        self.delivered.send(topic, event).await
    }
}
