//! In-memory [`Storage`] with real transaction semantics.
//!
//! Transactions are serialized: [`Storage::begin`] takes an exclusive lock and
//! works on a private copy of every table. `commit` writes the copy back;
//! dropping the transaction throws it away. Holding two transactions from the
//! same task therefore deadlocks, which no service does.

#![allow(clippy::missing_panics_doc)]

use async_trait::async_trait;
use chrono::Utc;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};
use tracker_core::storage::{
    ApplicationRepository, CommentRepository, ReleaseRepository, StoreResult, TicketRepository,
};
use tracker_core::{
    Application, ApplicationId, Comment, CommentId, NewApplication, NewComment, NewRelease,
    NewTicket, ReleaseId, SoftwareRelease, Storage, StoreError, Ticket, TicketId, Transaction,
};

#[derive(Clone, Debug, Default)]
struct Tables {
    tickets: BTreeMap<TicketId, Ticket>,
    comments: BTreeMap<CommentId, Comment>,
    applications: BTreeMap<ApplicationId, Application>,
    releases: BTreeMap<ReleaseId, SoftwareRelease>,
    // (release, application)
    links: BTreeSet<(ReleaseId, ApplicationId)>,
    last_id: i64,
}

impl Tables {
    fn next_id(&mut self) -> i64 {
        self.last_id += 1;
        self.last_id
    }
}

/// Store backed by in-process maps.
///
/// Cloning shares the data.
///
/// # Example
///
/// ```
/// use tracker_testing::InMemoryStorage;
/// use tracker_core::storage::TicketRepository;
/// use tracker_core::{NewTicket, Storage};
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let storage = InMemoryStorage::new();
/// let mut tx = storage.begin().await?;
/// tx.insert_ticket(&NewTicket { title: "Printer on fire".into(), description: String::new() })
///     .await?;
/// tx.commit().await?;
/// assert_eq!(storage.ticket_count().await, 1);
/// # Ok(())
/// # }
/// ```
#[derive(Clone, Debug, Default)]
pub struct InMemoryStorage {
    tables: Arc<Mutex<Tables>>,
}

impl InMemoryStorage {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Committed tickets.
    pub async fn ticket_count(&self) -> usize {
        self.tables.lock().await.tickets.len()
    }

    /// Committed comments across all tickets.
    pub async fn comment_count(&self) -> usize {
        self.tables.lock().await.comments.len()
    }

    /// Committed applications.
    pub async fn application_count(&self) -> usize {
        self.tables.lock().await.applications.len()
    }

    /// Committed release/application links.
    pub async fn link_count(&self) -> usize {
        self.tables.lock().await.links.len()
    }
}

#[async_trait]
impl Storage for InMemoryStorage {
    async fn begin(&self) -> StoreResult<Box<dyn Transaction>> {
        let committed = Arc::clone(&self.tables).lock_owned().await;
        let working = (*committed).clone();
        Ok(Box::new(InMemoryTransaction { committed, working }))
    }
}

/// A transaction on [`InMemoryStorage`].
pub struct InMemoryTransaction {
    committed: OwnedMutexGuard<Tables>,
    working: Tables,
}

#[async_trait]
impl TicketRepository for InMemoryTransaction {
    async fn insert_ticket(&mut self, ticket: &NewTicket) -> StoreResult<Ticket> {
        let id = TicketId::new(self.working.next_id());
        let row = Ticket {
            id,
            title: ticket.title.clone(),
            description: ticket.description.clone(),
        };
        self.working.tickets.insert(id, row.clone());
        Ok(row)
    }

    async fn load_ticket(&mut self, id: TicketId) -> StoreResult<Option<Ticket>> {
        Ok(self.working.tickets.get(&id).cloned())
    }

    async fn ticket_exists(&mut self, id: TicketId) -> StoreResult<bool> {
        Ok(self.working.tickets.contains_key(&id))
    }
}

#[async_trait]
impl CommentRepository for InMemoryTransaction {
    async fn insert_comment(&mut self, comment: &NewComment) -> StoreResult<Comment> {
        // Mirrors the foreign key on comments.ticket_id.
        if !self.working.tickets.contains_key(&comment.ticket_id) {
            return Err(StoreError::not_found("Ticket", comment.ticket_id.get()));
        }

        let id = CommentId::new(self.working.next_id());
        let row = Comment {
            id,
            ticket_id: comment.ticket_id,
            body: comment.body.clone(),
            author_id: comment.author_id,
            created_at: Utc::now(),
        };
        self.working.comments.insert(id, row.clone());
        Ok(row)
    }

    async fn comments_by_ticket(&mut self, ticket_id: TicketId) -> StoreResult<Vec<Comment>> {
        Ok(self
            .working
            .comments
            .values()
            .filter(|c| c.ticket_id == ticket_id)
            .cloned()
            .collect())
    }
}

#[async_trait]
impl ApplicationRepository for InMemoryTransaction {
    async fn insert_application(&mut self, app: &NewApplication) -> StoreResult<Application> {
        if self
            .working
            .applications
            .values()
            .any(|existing| existing.name == app.name)
        {
            return Err(StoreError::Conflict(format!(
                "application name '{}' already exists",
                app.name
            )));
        }

        let id = ApplicationId::new(self.working.next_id());
        let row = Application {
            id,
            name: app.name.clone(),
            description: app.description.clone(),
            owner: app.owner.clone(),
        };
        self.working.applications.insert(id, row.clone());
        Ok(row)
    }

    async fn load_application(&mut self, id: ApplicationId) -> StoreResult<Option<Application>> {
        Ok(self.working.applications.get(&id).cloned())
    }
}

#[async_trait]
impl ReleaseRepository for InMemoryTransaction {
    async fn insert_release(&mut self, release: &NewRelease) -> StoreResult<SoftwareRelease> {
        let id = ReleaseId::new(self.working.next_id());
        let row = SoftwareRelease {
            id,
            release_date: release.release_date,
            applications: Vec::new(),
        };
        self.working.releases.insert(id, row.clone());
        Ok(row)
    }

    async fn load_release(&mut self, id: ReleaseId) -> StoreResult<Option<SoftwareRelease>> {
        Ok(self.working.releases.get(&id).cloned())
    }

    async fn applications_for_release(&mut self, id: ReleaseId) -> StoreResult<Vec<Application>> {
        Ok(self
            .working
            .links
            .range((id, ApplicationId::new(i64::MIN))..=(id, ApplicationId::new(i64::MAX)))
            .filter_map(|(_, app_id)| self.working.applications.get(app_id).cloned())
            .collect())
    }

    async fn link_application(
        &mut self,
        application_id: ApplicationId,
        release_id: ReleaseId,
    ) -> StoreResult<()> {
        if !self.working.applications.contains_key(&application_id) {
            return Err(StoreError::not_found("Application", application_id.get()));
        }
        if !self.working.releases.contains_key(&release_id) {
            return Err(StoreError::not_found("Release", release_id.get()));
        }

        self.working.links.insert((release_id, application_id));
        Ok(())
    }
}

#[async_trait]
impl Transaction for InMemoryTransaction {
    async fn commit(self: Box<Self>) -> StoreResult<()> {
        let Self {
            mut committed,
            working,
        } = *self;
        *committed = working;
        Ok(())
    }
}
