//! Persistence error type.
//!
//! Storage implementations map their driver errors into [`StoreError`]; the
//! services propagate it to their callers unchanged.

use thiserror::Error;

/// Errors raised by a [`Storage`](crate::storage::Storage) implementation.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// A referenced row does not exist.
    #[error("{entity} with id {id} not found")]
    NotFound {
        /// Entity kind (e.g. "Ticket")
        entity: &'static str,
        /// The identifier that was looked up
        id: i64,
    },

    /// A uniqueness constraint was violated.
    #[error("Conflict: {0}")]
    Conflict(String),

    /// Connection, query or transaction failure.
    #[error("Database error: {0}")]
    Database(String),
}

impl StoreError {
    /// Shorthand for [`StoreError::NotFound`].
    #[must_use]
    pub const fn not_found(entity: &'static str, id: i64) -> Self {
        Self::NotFound { entity, id }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn not_found_message_names_entity_and_id() {
        let err = StoreError::not_found("Ticket", 6);
        assert_eq!(err.to_string(), "Ticket with id 6 not found");
    }
}
