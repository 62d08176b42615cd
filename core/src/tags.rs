//! Version-control tag lookup.
//!
//! A release view lists the tags cut in the release window for every linked
//! application's repository. The tracker does not speak any VCS protocol: it
//! asks a [`TagSource`] and uses the answer as-is.

use async_trait::async_trait;
use chrono::NaiveDate;
use std::sync::Arc;
use thiserror::Error;

/// Failure to obtain tags from the version-control collaborator.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TagSourceError {
    /// The collaborator could not be reached or answered with an error.
    #[error("Tag source unavailable: {0}")]
    Unavailable(String),

    /// The collaborator answered with something that is not a tag list.
    #[error("Invalid tag source response: {0}")]
    InvalidResponse(String),
}

/// Source of version-control tags.
#[async_trait]
pub trait TagSource: Send + Sync {
    /// Tags created in the window anchored at `anchor` across `repositories`,
    /// in the order the source reports them.
    ///
    /// # Errors
    ///
    /// Returns [`TagSourceError`] if the lookup fails.
    async fn tags_in_window(
        &self,
        anchor: NaiveDate,
        repositories: &[String],
    ) -> Result<Vec<String>, TagSourceError>;
}

#[async_trait]
impl<T: TagSource + ?Sized> TagSource for Arc<T> {
    async fn tags_in_window(
        &self,
        anchor: NaiveDate,
        repositories: &[String],
    ) -> Result<Vec<String>, TagSourceError> {
        (**self).tags_in_window(anchor, repositories).await
    }
}

/// Tag source for deployments without a tag service; reports no tags.
#[derive(Clone, Copy, Debug, Default)]
pub struct EmptyTagSource;

#[async_trait]
impl TagSource for EmptyTagSource {
    async fn tags_in_window(
        &self,
        _anchor: NaiveDate,
        _repositories: &[String],
    ) -> Result<Vec<String>, TagSourceError> {
        Ok(Vec::new())
    }
}
