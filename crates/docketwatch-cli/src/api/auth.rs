//! Shared-secret check on the `X-Api-Key` header.

use axum::body::Body;
use axum::http::Request;
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};

use super::ApiContext;
use super::error::ApiError;

pub const API_KEY_HEADER: &str = "X-Api-Key";

/// Reject requests whose `X-Api-Key` differs from the configured secret.
/// Passes everything through when no secret is configured.
pub async fn require_api_key(req: Request<Body>, next: Next) -> Response {
    let Some(ctx) = req.extensions().get::<ApiContext>() else {
        return ApiError::Internal("missing API context".into()).into_response();
    };
    if let Some(expected) = ctx.api_key.as_deref() {
        let provided = req
            .headers()
            .get(API_KEY_HEADER)
            .and_then(|v| v.to_str().ok());
        if provided != Some(expected) {
            tracing::warn!(path = %req.uri().path(), "rejected request with bad API key");
            return ApiError::Unauthorized.into_response();
        }
    }
    next.run(req).await
}
