//! HTTP API for the tracker.
//!
//! Handlers are thin: they extract the request, call one
//! [`TrackerServices`](tracker_runtime::TrackerServices) operation and map
//! the result (or [`ServiceError`](tracker_runtime::ServiceError)) to a
//! response.
//!
//! # Example
//!
//! ```ignore
//! use tracker_web::{AppState, build_router};
//!
//! let app = build_router(AppState::new(services));
//! let listener = tokio::net::TcpListener::bind("0.0.0.0:8080").await?;
//! axum::serve(listener, app).await?;
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs, clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod error;
pub mod extractors;
pub mod handlers;
pub mod middleware;
pub mod state;

pub use error::AppError;
pub use extractors::CorrelationId;
pub use middleware::{CORRELATION_ID_HEADER, correlation_id_layer};
pub use state::AppState;

use axum::{
    Router,
    routing::{get, post, put},
};
use handlers::{applications, comments, health, metrics, releases, tickets};
use tower_http::trace::TraceLayer;

/// Result type alias for web handlers.
pub type WebResult<T> = Result<T, AppError>;

/// Build the complete router.
///
/// `/health` and `/metrics` sit at the root; everything else lives under
/// `/api`. Every route is traced and gets a correlation id.
pub fn build_router(state: AppState) -> Router {
    let api_routes = Router::new()
        .route("/ticket", post(tickets::create_ticket))
        .route("/ticket/:id", get(tickets::get_ticket))
        .route("/comments", get(comments::list_comments))
        .route("/comments/add", post(comments::add_comment))
        .route("/application", post(applications::create_application))
        .route("/application/:id", get(applications::get_application))
        .route("/release", post(releases::create_release))
        .route("/release/:id", get(releases::get_release))
        .route(
            "/release/:release_id/application/:application_id",
            put(releases::attach_application),
        );

    Router::new()
        .route("/health", get(health::health_check))
        .route("/metrics", get(metrics::render))
        .nest("/api", api_routes)
        .layer(TraceLayer::new_for_http())
        .layer(correlation_id_layer())
        .with_state(state)
}
