//! Prometheus scrape endpoint.

use crate::{AppError, AppState};
use axum::extract::State;
use axum::http::header;
use axum::response::IntoResponse;

/// `GET /metrics` in the Prometheus text format.
///
/// # Errors
///
/// 503 when the host did not install a recorder.
#[allow(clippy::unused_async)]
pub async fn render(State(state): State<AppState>) -> Result<impl IntoResponse, AppError> {
    let recorder = state
        .metrics
        .as_ref()
        .ok_or_else(|| AppError::unavailable("metrics recorder not installed"))?;

    Ok((
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        recorder.render(),
    ))
}
