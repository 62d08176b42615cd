//! Ticket pass-through.

use crate::error::{ServiceError, ServiceResult};
use std::sync::Arc;
use tracker_core::storage::TicketRepository;
use tracker_core::{NewTicket, Storage, Ticket, TicketId};

/// Creates and loads tickets.
#[derive(Clone)]
pub struct TicketService {
    storage: Arc<dyn Storage>,
}

impl TicketService {
    /// Create a service over `storage`.
    #[must_use]
    pub fn new(storage: Arc<dyn Storage>) -> Self {
        Self { storage }
    }

    /// Store a ticket.
    ///
    /// # Errors
    ///
    /// - [`ServiceError::Validation`] if the title is blank
    /// - [`ServiceError::Store`] if the store fails
    #[tracing::instrument(skip(self, ticket))]
    pub async fn create_ticket(&self, ticket: NewTicket) -> ServiceResult<Ticket> {
        if ticket.title.trim().is_empty() {
            return Err(ServiceError::Validation("title must not be blank".to_string()));
        }

        let mut tx = self.storage.begin().await?;
        let created = tx.insert_ticket(&ticket).await?;
        tx.commit().await?;

        tracing::info!(ticket_id = %created.id, "Ticket created");
        Ok(created)
    }

    /// Load a ticket.
    ///
    /// # Errors
    ///
    /// - [`ServiceError::NotFound`] if the ticket does not exist
    /// - [`ServiceError::Store`] if the store fails
    pub async fn get_ticket(&self, id: TicketId) -> ServiceResult<Ticket> {
        let mut tx = self.storage.begin().await?;
        let ticket = tx.load_ticket(id).await?;
        tx.commit().await?;
        ticket.ok_or_else(|| ServiceError::not_found("Ticket", id.get()))
    }
}
