//! Domain types for the tracker.
//!
//! Identifiers are assigned by the store on insert and serialize as plain JSON
//! numbers. Wire field names follow the public API (`ticketId`, `commentText`,
//! `userId`, `releaseDate`, `gitTags`).

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

// ============================================================================
// Identifiers
// ============================================================================

macro_rules! store_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub i64);

        impl $name {
            /// Wrap a raw store identifier.
            #[must_use]
            pub const fn new(id: i64) -> Self {
                Self(id)
            }

            /// The raw store identifier.
            #[must_use]
            pub const fn get(self) -> i64 {
                self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<i64> for $name {
            fn from(id: i64) -> Self {
                Self(id)
            }
        }
    };
}

store_id!(
    /// Identifier of a [`Ticket`].
    TicketId
);
store_id!(
    /// Identifier of a [`Comment`].
    CommentId
);
store_id!(
    /// Identifier of the user who authored a comment.
    ///
    /// Users live in an external directory; the tracker never resolves them.
    UserId
);
store_id!(
    /// Identifier of an [`Application`].
    ApplicationId
);
store_id!(
    /// Identifier of a [`SoftwareRelease`].
    ReleaseId
);

// ============================================================================
// Tickets
// ============================================================================

/// A ticket. Owned by ticket management; the comment pipeline only checks
/// that it exists.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ticket {
    /// Store-assigned identifier
    pub id: TicketId,
    /// Short title
    pub title: String,
    /// Free-text description
    pub description: String,
}

/// Request to create a ticket.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewTicket {
    /// Short title
    pub title: String,
    /// Free-text description
    #[serde(default)]
    pub description: String,
}

// ============================================================================
// Comments
// ============================================================================

/// A comment attached to a ticket.
///
/// Comments are created once through the ingestion pipeline and never
/// updated or deleted.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Comment {
    /// Store-assigned identifier, increasing in commit order
    pub id: CommentId,
    /// Parent ticket
    pub ticket_id: TicketId,
    /// Comment body
    #[serde(rename = "commentText")]
    pub body: String,
    /// Author
    #[serde(rename = "userId")]
    pub author_id: UserId,
    /// When the comment was persisted
    pub created_at: DateTime<Utc>,
}

/// Request to add a comment to a ticket.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewComment {
    /// Parent ticket; must exist
    pub ticket_id: TicketId,
    /// Comment body
    #[serde(rename = "commentText")]
    pub body: String,
    /// Author
    #[serde(rename = "userId")]
    pub author_id: UserId,
}

impl NewComment {
    /// Convenience constructor.
    #[must_use]
    pub fn new(ticket_id: TicketId, body: impl Into<String>, author_id: UserId) -> Self {
        Self {
            ticket_id,
            body: body.into(),
            author_id,
        }
    }
}

// ============================================================================
// Applications
// ============================================================================

/// An application whose source lives in a version-control repository.
///
/// The application name doubles as its repository name when releases look up
/// tags.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Application {
    /// Store-assigned identifier
    pub id: ApplicationId,
    /// Unique name
    pub name: String,
    /// Free-text description
    pub description: String,
    /// Owning person or team
    pub owner: String,
}

/// Request to create an application.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewApplication {
    /// Unique name
    pub name: String,
    /// Free-text description
    #[serde(default)]
    pub description: String,
    /// Owning person or team
    #[serde(default)]
    pub owner: String,
}

// ============================================================================
// Releases
// ============================================================================

/// A software release and the applications shipped in it.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SoftwareRelease {
    /// Store-assigned identifier
    pub id: ReleaseId,
    /// Day the release ships; anchors the tag window
    pub release_date: NaiveDate,
    /// Linked applications, ordered by application id
    #[serde(default)]
    pub applications: Vec<Application>,
}

/// Request to create a release.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewRelease {
    /// Day the release ships
    pub release_date: NaiveDate,
}

/// A release together with the version-control tags found in its window.
///
/// Never stored. Every query rebuilds it, so two reads may disagree on
/// `git_tags` while the tag source changes underneath.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReleaseView {
    /// The stored release
    #[serde(flatten)]
    pub release: SoftwareRelease,
    /// Tag names reported by the tag source, in the order it returned them
    pub git_tags: Vec<String>,
}

impl ReleaseView {
    /// Pair a release with the tags found for it.
    #[must_use]
    pub const fn new(release: SoftwareRelease, git_tags: Vec<String>) -> Self {
        Self { release, git_tags }
    }

    /// Repository names looked up for this release.
    #[must_use]
    pub fn repositories(&self) -> Vec<String> {
        self.release.repositories()
    }
}

impl SoftwareRelease {
    /// Repository names of the linked applications, in link order.
    #[must_use]
    pub fn repositories(&self) -> Vec<String> {
        self.applications.iter().map(|app| app.name.clone()).collect()
    }
}
