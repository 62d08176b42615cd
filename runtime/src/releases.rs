//! Release correlation.
//!
//! A [`ReleaseView`] joins two sources the tracker does not control together:
//! the stored release with its linked applications, and the tags the
//! version-control side reports for those applications' repositories around
//! the release date. Nothing is cached; every [`ReleaseService::get_release`]
//! asks the [`TagSource`] again.

use crate::error::{ServiceError, ServiceResult};
use std::sync::Arc;
use tracker_core::storage::{ApplicationRepository, ReleaseRepository};
use tracker_core::{
    ApplicationId, NewRelease, ReleaseId, ReleaseView, SoftwareRelease, Storage, TagSource,
};

/// Creates releases, links applications to them and assembles release views.
#[derive(Clone)]
pub struct ReleaseService {
    storage: Arc<dyn Storage>,
    tags: Arc<dyn TagSource>,
}

impl ReleaseService {
    /// Create a service over `storage`, looking tags up in `tags`.
    #[must_use]
    pub fn new(storage: Arc<dyn Storage>, tags: Arc<dyn TagSource>) -> Self {
        Self { storage, tags }
    }

    /// Store a new release with no applications.
    ///
    /// # Errors
    ///
    /// Returns [`ServiceError::Store`] if the store fails.
    #[tracing::instrument(skip(self))]
    pub async fn create_release(&self, release: NewRelease) -> ServiceResult<SoftwareRelease> {
        let mut tx = self.storage.begin().await?;
        let created = tx.insert_release(&release).await?;
        tx.commit().await?;

        tracing::info!(release_id = %created.id, "Release created");
        Ok(created)
    }

    /// Link an application to a release. Linking the same pair again changes
    /// nothing and succeeds.
    ///
    /// # Errors
    ///
    /// - [`ServiceError::NotFound`] if either the application or the release
    ///   does not exist
    /// - [`ServiceError::Store`] if the store fails
    #[tracing::instrument(skip(self))]
    pub async fn attach_application(
        &self,
        application_id: ApplicationId,
        release_id: ReleaseId,
    ) -> ServiceResult<()> {
        let mut tx = self.storage.begin().await?;

        if tx.load_application(application_id).await?.is_none() {
            return Err(ServiceError::not_found("Application", application_id.get()));
        }
        if tx.load_release(release_id).await?.is_none() {
            return Err(ServiceError::not_found("Release", release_id.get()));
        }

        tx.link_application(application_id, release_id).await?;
        tx.commit().await?;

        tracing::info!("Application linked to release");
        Ok(())
    }

    /// The release with its applications and the tags currently reported for
    /// them, or `None` if the release does not exist.
    ///
    /// The store transaction is closed before the tag source is called.
    ///
    /// # Errors
    ///
    /// - [`ServiceError::Store`] if the store fails
    /// - [`ServiceError::TagSource`] if the tag lookup fails
    #[tracing::instrument(skip(self))]
    pub async fn get_release(&self, release_id: ReleaseId) -> ServiceResult<Option<ReleaseView>> {
        let mut tx = self.storage.begin().await?;
        let Some(mut release) = tx.load_release(release_id).await? else {
            return Ok(None);
        };
        release.applications = tx.applications_for_release(release_id).await?;
        tx.commit().await?;

        let repositories = release.repositories();
        let git_tags = match self
            .tags
            .tags_in_window(release.release_date, &repositories)
            .await
        {
            Ok(tags) => {
                metrics::counter!("tracker.releases.tag_lookups", "outcome" => "ok").increment(1);
                tags
            }
            Err(e) => {
                metrics::counter!("tracker.releases.tag_lookups", "outcome" => "error")
                    .increment(1);
                tracing::warn!(error = %e, "Tag lookup failed");
                return Err(e.into());
            }
        };

        tracing::debug!(
            repositories = repositories.len(),
            tags = git_tags.len(),
            "Release view assembled"
        );
        Ok(Some(ReleaseView::new(release, git_tags)))
    }
}
