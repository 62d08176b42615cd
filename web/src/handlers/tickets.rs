//! Ticket endpoints:
//! - POST /api/ticket
//! - GET /api/ticket/:id

use super::location;
use crate::{AppError, AppState, WebResult};
use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use tracker_core::{NewTicket, Ticket, TicketId};

/// Create a ticket. Answers 201 with `Location: /api/ticket/{id}`.
///
/// # Errors
///
/// 422 for a blank title.
pub async fn create_ticket(
    State(state): State<AppState>,
    Json(request): Json<NewTicket>,
) -> Result<impl IntoResponse, AppError> {
    let ticket = state.services.tickets.create_ticket(request).await?;
    Ok((
        StatusCode::CREATED,
        location(format!("/api/ticket/{}", ticket.id)),
        Json(ticket),
    ))
}

/// Fetch a ticket.
///
/// # Errors
///
/// 404 when the ticket does not exist.
pub async fn get_ticket(
    State(state): State<AppState>,
    Path(id): Path<TicketId>,
) -> WebResult<Json<Ticket>> {
    Ok(Json(state.services.tickets.get_ticket(id).await?))
}
