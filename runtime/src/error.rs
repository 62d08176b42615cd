//! Service-level error type.

use thiserror::Error;
use tracker_core::{StoreError, TagSourceError};

/// Errors returned by the tracker services.
///
/// Persistence failures pass through unchanged as [`ServiceError::Store`];
/// publishing failures never appear here.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ServiceError {
    /// A referenced ticket, release or application does not exist.
    #[error("{entity} with id {id} not found")]
    NotFound {
        /// Entity kind (e.g. "Ticket")
        entity: &'static str,
        /// The identifier that was looked up
        id: i64,
    },

    /// A uniqueness rule was violated.
    #[error("{0}")]
    Conflict(String),

    /// The request was rejected before touching storage.
    #[error("{0}")]
    Validation(String),

    /// The store failed.
    #[error(transparent)]
    Store(StoreError),

    /// The version-control tag lookup failed.
    #[error(transparent)]
    TagSource(#[from] TagSourceError),
}

impl ServiceError {
    /// Shorthand for [`ServiceError::NotFound`].
    #[must_use]
    pub const fn not_found(entity: &'static str, id: i64) -> Self {
        Self::NotFound { entity, id }
    }
}

impl From<StoreError> for ServiceError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound { entity, id } => Self::NotFound { entity, id },
            StoreError::Conflict(message) => Self::Conflict(message),
            other @ StoreError::Database(_) => Self::Store(other),
        }
    }
}

/// Convenience alias for service results.
pub type ServiceResult<T> = Result<T, ServiceError>;
