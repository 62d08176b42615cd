//! Release endpoints:
//! - POST /api/release
//! - PUT /api/release/:release_id/application/:application_id
//! - GET /api/release/:id

use super::location;
use crate::{AppError, AppState};
use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use tracker_core::{ApplicationId, NewRelease, ReleaseId, ReleaseView};

/// Create a release with no applications.
///
/// # Errors
///
/// 500 when the store fails.
pub async fn create_release(
    State(state): State<AppState>,
    Json(request): Json<NewRelease>,
) -> Result<impl IntoResponse, AppError> {
    let release = state.services.releases.create_release(request).await?;
    Ok((
        StatusCode::CREATED,
        location(format!("/api/release/{}", release.id)),
        Json(release),
    ))
}

/// Link an application to a release. Repeating the call is a no-op.
///
/// # Errors
///
/// 404 when the release or the application does not exist.
pub async fn attach_application(
    State(state): State<AppState>,
    Path((release_id, application_id)): Path<(ReleaseId, ApplicationId)>,
) -> Result<StatusCode, AppError> {
    state
        .services
        .releases
        .attach_application(application_id, release_id)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

/// The release, its applications and the tags found around its date.
///
/// # Errors
///
/// - 404 when the release does not exist
/// - 500 when the tag lookup fails
pub async fn get_release(
    State(state): State<AppState>,
    Path(id): Path<ReleaseId>,
) -> Result<Json<ReleaseView>, AppError> {
    state
        .services
        .releases
        .get_release(id)
        .await?
        .map(Json)
        .ok_or_else(|| AppError::not_found("Release", id))
}
