//! HTTP request handlers, one module per resource.

pub mod applications;
pub mod comments;
pub mod health;
pub mod metrics;
pub mod releases;
pub mod tickets;

pub use health::health_check;

use axum::http::{HeaderValue, header};

/// `Location` header pointing at a created resource.
pub(crate) fn location(path: String) -> [(header::HeaderName, HeaderValue); 1] {
    let value = HeaderValue::try_from(path).unwrap_or_else(|_| HeaderValue::from_static("/"));
    [(header::LOCATION, value)]
}
