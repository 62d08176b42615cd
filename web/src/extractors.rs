//! Custom Axum extractors.

use crate::middleware::{CORRELATION_ID_HEADER, parse_correlation_id};
use axum::{async_trait, extract::FromRequestParts, http::request::Parts};
use uuid::Uuid;

/// Correlation ID of the current request.
///
/// Taken from the request extensions when the correlation middleware ran,
/// otherwise from the `X-Correlation-ID` header, otherwise freshly generated.
///
/// ```ignore
/// async fn handler(correlation_id: CorrelationId) -> String {
///     format!("Request ID: {}", correlation_id.0)
/// }
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CorrelationId(pub Uuid);

#[async_trait]
impl<S> FromRequestParts<S> for CorrelationId
where
    S: Send + Sync,
{
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let id = parts
            .extensions
            .get::<Uuid>()
            .copied()
            .or_else(|| parse_correlation_id(parts.headers.get(CORRELATION_ID_HEADER)))
            .unwrap_or_else(Uuid::new_v4);

        Ok(Self(id))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use axum::http::Request;

    #[tokio::test]
    async fn prefers_the_middleware_id() {
        let assigned = Uuid::new_v4();
        let (mut parts, ()) = Request::builder()
            .header(CORRELATION_ID_HEADER, Uuid::new_v4().to_string())
            .body(())
            .unwrap()
            .into_parts();
        parts.extensions.insert(assigned);

        let CorrelationId(id) = CorrelationId::from_request_parts(&mut parts, &())
            .await
            .unwrap();

        assert_eq!(id, assigned);
    }

    #[tokio::test]
    async fn falls_back_to_the_header() {
        let sent = Uuid::new_v4();
        let (mut parts, ()) = Request::builder()
            .header(CORRELATION_ID_HEADER, sent.to_string())
            .body(())
            .unwrap()
            .into_parts();

        let CorrelationId(id) = CorrelationId::from_request_parts(&mut parts, &())
            .await
            .unwrap();

        assert_eq!(id, sent);
    }
}
