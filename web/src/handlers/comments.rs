//! Comment endpoints:
//! - POST /api/comments/add
//! - GET /api/comments?ticketId=N
//!
//! A 201 from `add` means the comment is committed and readable. The comment
//! event is published afterwards in the background.

use super::location;
use crate::{AppError, AppState, CorrelationId};
use axum::{
    Json,
    extract::{Query, State},
    http::StatusCode,
    response::IntoResponse,
};
use serde::Deserialize;
use tracker_core::{Comment, NewComment, TicketId};

/// Query string of `GET /api/comments`.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommentsQuery {
    /// Ticket whose comments are listed
    pub ticket_id: TicketId,
}

/// Add a comment to a ticket.
///
/// # Errors
///
/// - 404 when the ticket does not exist
/// - 422 for a blank comment
pub async fn add_comment(
    State(state): State<AppState>,
    CorrelationId(correlation_id): CorrelationId,
    Json(request): Json<NewComment>,
) -> Result<impl IntoResponse, AppError> {
    let comment = state.services.comments.submit_comment(request).await?;
    tracing::debug!(
        %correlation_id,
        comment_id = %comment.id,
        "Comment accepted"
    );
    Ok((
        StatusCode::CREATED,
        location(format!("/api/comments?ticketId={}", comment.ticket_id)),
        Json(comment),
    ))
}

/// Every comment of a ticket, oldest first.
///
/// # Errors
///
/// 404 when the ticket does not exist.
pub async fn list_comments(
    State(state): State<AppState>,
    Query(query): Query<CommentsQuery>,
) -> Result<Json<Vec<Comment>>, AppError> {
    Ok(Json(
        state.services.comments.get_comments(query.ticket_id).await?,
    ))
}
