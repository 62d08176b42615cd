//! HTTP client for the version-control tag service.

use async_trait::async_trait;
use chrono::{Days, NaiveDate};
use reqwest::Client;
use std::time::Duration;
use tracker_core::{TagSource, TagSourceError};

/// Days before the release date included in the tag window by default.
pub const DEFAULT_WINDOW_BEFORE_DAYS: u64 = 14;

/// Days after the release date included in the tag window by default.
pub const DEFAULT_WINDOW_AFTER_DAYS: u64 = 1;

/// [`TagSource`] that asks a tag service over HTTP.
///
/// Issues `GET {base_url}/tags?since=..&until=..&repository=..` with one
/// `repository` parameter per repository and expects a JSON array of tag
/// names. An empty repository list short-circuits to no tags.
#[derive(Clone, Debug)]
pub struct HttpTagSource {
    base_url: String,
    http_client: Client,
    window_before: Days,
    window_after: Days,
}

impl HttpTagSource {
    /// Create a client for the tag service at `base_url`.
    #[must_use]
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            http_client: Client::new(),
            window_before: Days::new(DEFAULT_WINDOW_BEFORE_DAYS),
            window_after: Days::new(DEFAULT_WINDOW_AFTER_DAYS),
        }
    }

    /// Set the tag window around the release date.
    #[must_use]
    pub fn with_window(mut self, before_days: u64, after_days: u64) -> Self {
        self.window_before = Days::new(before_days);
        self.window_after = Days::new(after_days);
        self
    }

    /// Use a client with the given request timeout.
    ///
    /// # Errors
    ///
    /// Returns [`TagSourceError::Unavailable`] if the client cannot be built.
    pub fn with_timeout(mut self, timeout: Duration) -> Result<Self, TagSourceError> {
        self.http_client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| TagSourceError::Unavailable(e.to_string()))?;
        Ok(self)
    }

    /// First and last day of the window anchored at `anchor`.
    #[must_use]
    pub fn window(&self, anchor: NaiveDate) -> (NaiveDate, NaiveDate) {
        let since = anchor
            .checked_sub_days(self.window_before)
            .unwrap_or(NaiveDate::MIN);
        let until = anchor
            .checked_add_days(self.window_after)
            .unwrap_or(NaiveDate::MAX);
        (since, until)
    }
}

#[async_trait]
impl TagSource for HttpTagSource {
    async fn tags_in_window(
        &self,
        anchor: NaiveDate,
        repositories: &[String],
    ) -> Result<Vec<String>, TagSourceError> {
        if repositories.is_empty() {
            return Ok(Vec::new());
        }

        let (since, until) = self.window(anchor);
        let mut query = vec![
            ("since", since.to_string()),
            ("until", until.to_string()),
        ];
        query.extend(repositories.iter().map(|r| ("repository", r.clone())));

        let response = self
            .http_client
            .get(format!("{}/tags", self.base_url))
            .query(&query)
            .send()
            .await
            .map_err(|e| TagSourceError::Unavailable(e.to_string()))?;

        if !response.status().is_success() {
            return Err(TagSourceError::Unavailable(format!(
                "tag service answered {}",
                response.status()
            )));
        }

        response
            .json::<Vec<String>>()
            .await
            .map_err(|e| TagSourceError::InvalidResponse(e.to_string()))
    }
}
