//! `PostgreSQL` storage for the tracker.
//!
//! [`PostgresStorage`] implements [`Storage`] over a `PgPool`. Each
//! [`Storage::begin`] opens a database transaction; dropping the returned
//! handle without committing rolls it back.
//!
//! # Example
//!
//! ```ignore
//! use tracker_postgres::{PoolSettings, PostgresStorage};
//!
//! let storage = PostgresStorage::connect("postgres://localhost/tracker", &PoolSettings::default()).await?;
//! storage.migrate().await?;
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use sqlx::postgres::{PgPool, PgPoolOptions};
use sqlx::{FromRow, Postgres};
use std::time::Duration;
use tracker_core::storage::{
    ApplicationRepository, CommentRepository, ReleaseRepository, StoreResult, TicketRepository,
};
use tracker_core::{
    Application, ApplicationId, Comment, NewApplication, NewComment, NewRelease, NewTicket,
    ReleaseId, SoftwareRelease, Storage, StoreError, Ticket, TicketId, Transaction,
};

const UNIQUE_VIOLATION: &str = "23505";

/// Connection pool sizing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PoolSettings {
    /// Upper bound on open connections
    pub max_connections: u32,
    /// Connections kept open while idle
    pub min_connections: u32,
    /// How long to wait for a connection
    pub connect_timeout: Duration,
}

impl Default for PoolSettings {
    fn default() -> Self {
        Self {
            max_connections: 10,
            min_connections: 1,
            connect_timeout: Duration::from_secs(5),
        }
    }
}

/// [`Storage`] backed by `PostgreSQL`.
#[derive(Clone, Debug)]
pub struct PostgresStorage {
    pool: PgPool,
}

impl PostgresStorage {
    /// Connect a pool to `database_url`.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Database`] if the connection fails.
    pub async fn connect(database_url: &str, settings: &PoolSettings) -> StoreResult<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(settings.max_connections)
            .min_connections(settings.min_connections)
            .acquire_timeout(settings.connect_timeout)
            .connect(database_url)
            .await
            .map_err(|e| StoreError::Database(format!("Failed to connect: {e}")))?;

        tracing::info!(
            max_connections = settings.max_connections,
            "Connected to PostgreSQL"
        );
        Ok(Self { pool })
    }

    /// Wrap an existing pool.
    #[must_use]
    pub const fn from_pool(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Apply the schema migrations in `postgres/migrations`.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Database`] if a migration fails.
    pub async fn migrate(&self) -> StoreResult<()> {
        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .map_err(|e| StoreError::Database(format!("Migration failed: {e}")))?;
        Ok(())
    }
}

#[async_trait]
impl Storage for PostgresStorage {
    async fn begin(&self) -> StoreResult<Box<dyn Transaction>> {
        let tx = self
            .pool
            .begin()
            .await
            .map_err(|e| db_error("begin transaction", &e))?;
        Ok(Box::new(PostgresTransaction { tx }))
    }
}

/// An open `PostgreSQL` transaction.
pub struct PostgresTransaction {
    tx: sqlx::Transaction<'static, Postgres>,
}

fn db_error(context: &str, err: &sqlx::Error) -> StoreError {
    if let Some(db) = err.as_database_error() {
        if db.code().as_deref() == Some(UNIQUE_VIOLATION) {
            return StoreError::Conflict(db.message().to_string());
        }
    }
    StoreError::Database(format!("Failed to {context}: {err}"))
}

#[derive(FromRow)]
struct TicketRow {
    id: i64,
    title: String,
    description: String,
}

impl From<TicketRow> for Ticket {
    fn from(row: TicketRow) -> Self {
        Self {
            id: TicketId::new(row.id),
            title: row.title,
            description: row.description,
        }
    }
}

#[derive(FromRow)]
struct CommentRow {
    id: i64,
    ticket_id: i64,
    body: String,
    author_id: i64,
    created_at: DateTime<Utc>,
}

impl From<CommentRow> for Comment {
    fn from(row: CommentRow) -> Self {
        Self {
            id: row.id.into(),
            ticket_id: row.ticket_id.into(),
            body: row.body,
            author_id: row.author_id.into(),
            created_at: row.created_at,
        }
    }
}

#[derive(FromRow)]
struct ApplicationRow {
    id: i64,
    name: String,
    description: String,
    owner: String,
}

impl From<ApplicationRow> for Application {
    fn from(row: ApplicationRow) -> Self {
        Self {
            id: ApplicationId::new(row.id),
            name: row.name,
            description: row.description,
            owner: row.owner,
        }
    }
}

#[derive(FromRow)]
struct ReleaseRow {
    id: i64,
    release_date: NaiveDate,
}

impl From<ReleaseRow> for SoftwareRelease {
    fn from(row: ReleaseRow) -> Self {
        Self {
            id: ReleaseId::new(row.id),
            release_date: row.release_date,
            applications: Vec::new(),
        }
    }
}

#[async_trait]
impl TicketRepository for PostgresTransaction {
    async fn insert_ticket(&mut self, ticket: &NewTicket) -> StoreResult<Ticket> {
        let row: TicketRow = sqlx::query_as(
            "INSERT INTO tickets (title, description) VALUES ($1, $2)
             RETURNING id, title, description",
        )
        .bind(&ticket.title)
        .bind(&ticket.description)
        .fetch_one(&mut *self.tx)
        .await
        .map_err(|e| db_error("insert ticket", &e))?;

        Ok(row.into())
    }

    async fn load_ticket(&mut self, id: TicketId) -> StoreResult<Option<Ticket>> {
        let row: Option<TicketRow> =
            sqlx::query_as("SELECT id, title, description FROM tickets WHERE id = $1")
                .bind(id.get())
                .fetch_optional(&mut *self.tx)
                .await
                .map_err(|e| db_error("load ticket", &e))?;

        Ok(row.map(Into::into))
    }

    async fn ticket_exists(&mut self, id: TicketId) -> StoreResult<bool> {
        let (exists,): (bool,) =
            sqlx::query_as("SELECT EXISTS (SELECT 1 FROM tickets WHERE id = $1)")
                .bind(id.get())
                .fetch_one(&mut *self.tx)
                .await
                .map_err(|e| db_error("check ticket", &e))?;

        Ok(exists)
    }
}

#[async_trait]
impl CommentRepository for PostgresTransaction {
    async fn insert_comment(&mut self, comment: &NewComment) -> StoreResult<Comment> {
        let row: CommentRow = sqlx::query_as(
            "INSERT INTO comments (ticket_id, body, author_id) VALUES ($1, $2, $3)
             RETURNING id, ticket_id, body, author_id, created_at",
        )
        .bind(comment.ticket_id.get())
        .bind(&comment.body)
        .bind(comment.author_id.get())
        .fetch_one(&mut *self.tx)
        .await
        .map_err(|e| db_error("insert comment", &e))?;

        Ok(row.into())
    }

    async fn comments_by_ticket(&mut self, ticket_id: TicketId) -> StoreResult<Vec<Comment>> {
        let rows: Vec<CommentRow> = sqlx::query_as(
            "SELECT id, ticket_id, body, author_id, created_at
             FROM comments WHERE ticket_id = $1 ORDER BY id",
        )
        .bind(ticket_id.get())
        .fetch_all(&mut *self.tx)
        .await
        .map_err(|e| db_error("load comments", &e))?;

        Ok(rows.into_iter().map(Into::into).collect())
    }
}

#[async_trait]
impl ApplicationRepository for PostgresTransaction {
    async fn insert_application(&mut self, app: &NewApplication) -> StoreResult<Application> {
        // DO NOTHING keeps the transaction usable after a duplicate.
        let row: Option<ApplicationRow> = sqlx::query_as(
            "INSERT INTO applications (name, description, owner) VALUES ($1, $2, $3)
             ON CONFLICT (name) DO NOTHING
             RETURNING id, name, description, owner",
        )
        .bind(&app.name)
        .bind(&app.description)
        .bind(&app.owner)
        .fetch_optional(&mut *self.tx)
        .await
        .map_err(|e| db_error("insert application", &e))?;

        row.map(Into::into).ok_or_else(|| {
            StoreError::Conflict(format!("application name '{}' already exists", app.name))
        })
    }

    async fn load_application(&mut self, id: ApplicationId) -> StoreResult<Option<Application>> {
        let row: Option<ApplicationRow> = sqlx::query_as(
            "SELECT id, name, description, owner FROM applications WHERE id = $1",
        )
        .bind(id.get())
        .fetch_optional(&mut *self.tx)
        .await
        .map_err(|e| db_error("load application", &e))?;

        Ok(row.map(Into::into))
    }
}

#[async_trait]
impl ReleaseRepository for PostgresTransaction {
    async fn insert_release(&mut self, release: &NewRelease) -> StoreResult<SoftwareRelease> {
        let row: ReleaseRow = sqlx::query_as(
            "INSERT INTO software_releases (release_date) VALUES ($1)
             RETURNING id, release_date",
        )
        .bind(release.release_date)
        .fetch_one(&mut *self.tx)
        .await
        .map_err(|e| db_error("insert release", &e))?;

        Ok(row.into())
    }

    async fn load_release(&mut self, id: ReleaseId) -> StoreResult<Option<SoftwareRelease>> {
        let row: Option<ReleaseRow> =
            sqlx::query_as("SELECT id, release_date FROM software_releases WHERE id = $1")
                .bind(id.get())
                .fetch_optional(&mut *self.tx)
                .await
                .map_err(|e| db_error("load release", &e))?;

        Ok(row.map(Into::into))
    }

    async fn applications_for_release(&mut self, id: ReleaseId) -> StoreResult<Vec<Application>> {
        let rows: Vec<ApplicationRow> = sqlx::query_as(
            "SELECT a.id, a.name, a.description, a.owner
             FROM applications a
             JOIN release_applications ra ON ra.application_id = a.id
             WHERE ra.release_id = $1
             ORDER BY a.id",
        )
        .bind(id.get())
        .fetch_all(&mut *self.tx)
        .await
        .map_err(|e| db_error("load release applications", &e))?;

        Ok(rows.into_iter().map(Into::into).collect())
    }

    async fn link_application(
        &mut self,
        application_id: ApplicationId,
        release_id: ReleaseId,
    ) -> StoreResult<()> {
        sqlx::query(
            "INSERT INTO release_applications (release_id, application_id) VALUES ($1, $2)
             ON CONFLICT DO NOTHING",
        )
        .bind(release_id.get())
        .bind(application_id.get())
        .execute(&mut *self.tx)
        .await
        .map_err(|e| db_error("link application", &e))?;

        Ok(())
    }
}

#[async_trait]
impl Transaction for PostgresTransaction {
    async fn commit(self: Box<Self>) -> StoreResult<()> {
        self.tx
            .commit()
            .await
            .map_err(|e| db_error("commit", &e))?;
        metrics::counter!("tracker.store.commits").increment(1);
        Ok(())
    }
}
