//! Rejects requests that do not carry a valid, fresh chat platform signature.

use super::super::state::GuardedRequestVerifier;
use axum::{
    body::Body,
    extract::{Request, State},
    http::{HeaderMap, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use tracing::warn;

pub const TIMESTAMP_HEADER: &str = "x-slack-request-timestamp";
pub const SIGNATURE_HEADER: &str = "x-slack-signature";

/// Slash command payloads are a few hundred bytes.
const MAX_SIGNED_BODY_LENGTH: usize = 64 * 1024;

fn header_str<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers.get(name).and_then(|value| value.to_str().ok())
}

fn forbidden() -> Response {
    (
        StatusCode::FORBIDDEN,
        Json(json!({ "error": "Unsupported command" })),
    )
        .into_response()
}

/// Buffers the raw body, verifies it against the signature headers and hands the
/// same bytes on to the handler.
pub async fn verify_slack_signature(
    State(verifier): State<GuardedRequestVerifier>,
    request: Request,
    next: Next,
) -> Response {
    let (parts, body) = request.into_parts();
    let bytes = match axum::body::to_bytes(body, MAX_SIGNED_BODY_LENGTH).await {
        Ok(bytes) => bytes,
        Err(err) => {
            warn!("Could not buffer signed request body: {}", err);
            return forbidden();
        }
    };

    let verified = verifier.verify(
        header_str(&parts.headers, TIMESTAMP_HEADER),
        header_str(&parts.headers, SIGNATURE_HEADER),
        &bytes,
    );
    if !verified {
        warn!("Rejected unsigned or stale request to {}", parts.uri.path());
        return forbidden();
    }

    next.run(Request::from_parts(parts, Body::from(bytes))).await
}
