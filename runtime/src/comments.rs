//! Comment ingestion and the comment read path.

use crate::error::{ServiceError, ServiceResult};
use crate::publisher::EventPublisher;
use std::sync::Arc;
use tracker_core::storage::{CommentRepository, TicketRepository};
use tracker_core::{Comment, CommentEvent, NewComment, Storage, TicketId};

/// Writes comments and reads them back.
///
/// `submit_comment` persists inside one transaction and only hands the event
/// to the publisher once the commit succeeded. `get_comments` reads straight
/// from storage, so a comment is visible as soon as `submit_comment` returns,
/// whatever the state of its event.
#[derive(Clone)]
pub struct CommentService {
    storage: Arc<dyn Storage>,
    publisher: Arc<EventPublisher>,
}

impl CommentService {
    /// Create a service over `storage`, publishing through `publisher`.
    #[must_use]
    pub fn new(storage: Arc<dyn Storage>, publisher: Arc<EventPublisher>) -> Self {
        Self { storage, publisher }
    }

    /// Attach a comment to an existing ticket.
    ///
    /// Returns the persisted comment. Event delivery happens afterwards in the
    /// background and never affects the result.
    ///
    /// # Errors
    ///
    /// - [`ServiceError::Validation`] if the comment text is blank
    /// - [`ServiceError::NotFound`] if the ticket does not exist; nothing is
    ///   written or published
    /// - [`ServiceError::Store`] if the store fails
    #[tracing::instrument(skip(self, comment), fields(ticket_id = %comment.ticket_id))]
    pub async fn submit_comment(&self, comment: NewComment) -> ServiceResult<Comment> {
        if comment.body.trim().is_empty() {
            return Err(ServiceError::Validation(
                "commentText must not be blank".to_string(),
            ));
        }

        let mut tx = self.storage.begin().await?;
        if !tx.ticket_exists(comment.ticket_id).await? {
            tracing::debug!("Rejecting comment for unknown ticket");
            return Err(ServiceError::not_found("Ticket", comment.ticket_id.get()));
        }

        let persisted = tx.insert_comment(&comment).await?;
        tx.commit().await?;

        metrics::counter!("tracker.comments.submitted").increment(1);
        tracing::info!(comment_id = %persisted.id, "Comment stored");

        self.publisher.publish(CommentEvent::from(&persisted));
        Ok(persisted)
    }

    /// Every committed comment of a ticket, oldest first.
    ///
    /// # Errors
    ///
    /// - [`ServiceError::NotFound`] if the ticket does not exist
    /// - [`ServiceError::Store`] if the store fails
    #[tracing::instrument(skip(self))]
    pub async fn get_comments(&self, ticket_id: TicketId) -> ServiceResult<Vec<Comment>> {
        let mut tx = self.storage.begin().await?;
        if !tx.ticket_exists(ticket_id).await? {
            return Err(ServiceError::not_found("Ticket", ticket_id.get()));
        }

        let comments = tx.comments_by_ticket(ticket_id).await?;
        tx.commit().await?;
        Ok(comments)
    }
}
