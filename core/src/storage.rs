//! Relational storage with explicit transaction handles.
//!
//! Services never share an ambient persistence context. Each operation opens a
//! [`Transaction`] from a [`Storage`], works through it, and either commits it
//! or drops it:
//!
//! ```text
//! let mut tx = storage.begin().await?;
//! if !tx.ticket_exists(id).await? {
//!     return Err(..);            // tx dropped here -> rolled back
//! }
//! let comment = tx.insert_comment(&new).await?;
//! tx.commit().await?;            // only now visible to readers
//! ```
//!
//! Dropping a transaction without calling [`Transaction::commit`] discards
//! every change made through it, on every exit path including `?` and panics.
//!
//! The per-entity repository traits are split so each reads as the boundary it
//! models; [`Transaction`] bundles them.

use crate::error::StoreError;
use crate::types::{
    Application, ApplicationId, Comment, NewApplication, NewComment, NewRelease, NewTicket,
    ReleaseId, SoftwareRelease, Ticket, TicketId,
};
use async_trait::async_trait;

/// Convenience alias for storage results.
pub type StoreResult<T> = Result<T, StoreError>;

/// Ticket rows. Tickets are pass-through: created and looked up, nothing more.
#[async_trait]
pub trait TicketRepository: Send {
    /// Insert a ticket and return it with its assigned id.
    async fn insert_ticket(&mut self, ticket: &NewTicket) -> StoreResult<Ticket>;

    /// Load a ticket by id.
    async fn load_ticket(&mut self, id: TicketId) -> StoreResult<Option<Ticket>>;

    /// Existence check used before a comment is written.
    async fn ticket_exists(&mut self, id: TicketId) -> StoreResult<bool>;
}

/// Comment rows.
#[async_trait]
pub trait CommentRepository: Send {
    /// Insert a comment. The caller has already checked the parent ticket.
    async fn insert_comment(&mut self, comment: &NewComment) -> StoreResult<Comment>;

    /// All comments of a ticket in creation order.
    async fn comments_by_ticket(&mut self, ticket_id: TicketId) -> StoreResult<Vec<Comment>>;
}

/// Application rows.
#[async_trait]
pub trait ApplicationRepository: Send {
    /// Insert an application.
    ///
    /// Fails with [`StoreError::Conflict`] if the name is taken; the existing
    /// row is left untouched.
    async fn insert_application(&mut self, app: &NewApplication) -> StoreResult<Application>;

    /// Load an application by id.
    async fn load_application(&mut self, id: ApplicationId) -> StoreResult<Option<Application>>;
}

/// Release rows and the release/application link table.
#[async_trait]
pub trait ReleaseRepository: Send {
    /// Insert a release with no linked applications.
    async fn insert_release(&mut self, release: &NewRelease) -> StoreResult<SoftwareRelease>;

    /// Load a release, or `None`. The returned `applications` is empty; use
    /// [`ReleaseRepository::applications_for_release`] for the links.
    async fn load_release(&mut self, id: ReleaseId) -> StoreResult<Option<SoftwareRelease>>;

    /// Applications linked to a release, ordered by application id.
    async fn applications_for_release(&mut self, id: ReleaseId) -> StoreResult<Vec<Application>>;

    /// Link an application to a release. Linking an already-linked pair is a
    /// no-op.
    async fn link_application(
        &mut self,
        application_id: ApplicationId,
        release_id: ReleaseId,
    ) -> StoreResult<()>;
}

/// A unit of work against the store.
#[async_trait]
pub trait Transaction:
    TicketRepository + CommentRepository + ApplicationRepository + ReleaseRepository + Send
{
    /// Make every change of this transaction durable and visible.
    async fn commit(self: Box<Self>) -> StoreResult<()>;
}

/// Factory for transactions.
#[async_trait]
pub trait Storage: Send + Sync {
    /// Open a transaction.
    async fn begin(&self) -> StoreResult<Box<dyn Transaction>>;
}

#[async_trait]
impl<T: Storage + ?Sized> Storage for std::sync::Arc<T> {
    async fn begin(&self) -> StoreResult<Box<dyn Transaction>> {
        (**self).begin().await
    }
}
