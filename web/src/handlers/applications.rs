//! Application endpoints:
//! - POST /api/application
//! - GET /api/application/:id

use super::location;
use crate::{AppError, AppState, WebResult};
use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use tracker_core::{Application, ApplicationId, NewApplication};

/// Register an application.
///
/// # Errors
///
/// - 409 when the name is taken; the existing application is left as is
/// - 422 for a blank name
pub async fn create_application(
    State(state): State<AppState>,
    Json(request): Json<NewApplication>,
) -> Result<impl IntoResponse, AppError> {
    let application = state
        .services
        .applications
        .create_application(request)
        .await?;
    Ok((
        StatusCode::CREATED,
        location(format!("/api/application/{}", application.id)),
        Json(application),
    ))
}

/// Fetch an application.
///
/// # Errors
///
/// 404 when the application does not exist.
pub async fn get_application(
    State(state): State<AppState>,
    Path(id): Path<ApplicationId>,
) -> WebResult<Json<Application>> {
    Ok(Json(state.services.applications.get_application(id).await?))
}
