//! Application pass-through.

use crate::error::{ServiceError, ServiceResult};
use std::sync::Arc;
use tracker_core::storage::ApplicationRepository;
use tracker_core::{Application, ApplicationId, NewApplication, Storage};

/// Creates and loads applications.
#[derive(Clone)]
pub struct ApplicationService {
    storage: Arc<dyn Storage>,
}

impl ApplicationService {
    /// Create a service over `storage`.
    #[must_use]
    pub fn new(storage: Arc<dyn Storage>) -> Self {
        Self { storage }
    }

    /// Store an application.
    ///
    /// # Errors
    ///
    /// - [`ServiceError::Validation`] if the name is blank
    /// - [`ServiceError::Conflict`] if the name is already taken; the existing
    ///   application is not modified
    /// - [`ServiceError::Store`] if the store fails
    #[tracing::instrument(skip(self, app), fields(name = %app.name))]
    pub async fn create_application(&self, app: NewApplication) -> ServiceResult<Application> {
        if app.name.trim().is_empty() {
            return Err(ServiceError::Validation("name must not be blank".to_string()));
        }

        let mut tx = self.storage.begin().await?;
        let created = tx.insert_application(&app).await?;
        tx.commit().await?;

        tracing::info!(application_id = %created.id, "Application created");
        Ok(created)
    }

    /// Load an application.
    ///
    /// # Errors
    ///
    /// - [`ServiceError::NotFound`] if the application does not exist
    /// - [`ServiceError::Store`] if the store fails
    pub async fn get_application(&self, id: ApplicationId) -> ServiceResult<Application> {
        let mut tx = self.storage.begin().await?;
        let app = tx.load_application(id).await?;
        tx.commit().await?;
        app.ok_or_else(|| ServiceError::not_found("Application", id.get()))
    }
}
