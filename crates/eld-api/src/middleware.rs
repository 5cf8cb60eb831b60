//! HTTP middleware: correlation IDs and the idempotency gate. The
//! request-lifecycle pieces follow a plain `from_fn`/`from_fn_with_state`
//! shape; the idempotency middleware delegates the claim/replay/conflict
//! protocol to `eld_core::idempotency::IdempotencyGate` rather than
//! re-implementing it against raw SQL.

use std::sync::Arc;

use axum::body::{to_bytes, Body};
use axum::extract::{Request, State};
use axum::http::{HeaderValue, StatusCode};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use eld_core::idempotency::GateOutcome;
use uuid::Uuid;

use crate::dto::CORRELATION_ID_HEADER;
use crate::error::ApiError;
use crate::state::AppState;

const IDEMPOTENCY_KEY_HEADER: &str = "x-idempotency-key";
const IDEMPOTENCY_REPLAY_HEADER: &str = "x-idempotency-replay";
/// Response bodies larger than this are never cached for replay; the
/// handler's own response still reaches the caller, idempotency just
/// stops applying beyond this size.
const MAX_CACHED_BODY_BYTES: usize = 1024 * 1024;

/// Ensure every request and response carries `X-Correlation-Id`, generating
/// one when the caller omits it. Propagated through `tracing::Span` fields
/// by the caller's instrumentation layer, not here.
pub async fn correlation_id_middleware(mut req: Request, next: Next) -> Response {
    let correlation_id = req
        .headers()
        .get(CORRELATION_ID_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(|s| s.to_string())
        .unwrap_or_else(|| Uuid::new_v4().to_string());

    req.headers_mut().insert(
        CORRELATION_ID_HEADER,
        HeaderValue::from_str(&correlation_id).unwrap_or_else(|_| HeaderValue::from_static("invalid")),
    );

    let mut response = next.run(req).await;
    if let Ok(value) = HeaderValue::from_str(&correlation_id) {
        response.headers_mut().insert(CORRELATION_ID_HEADER, value);
    }
    response
}

/// Wraps the two ingestion handlers (`POST /events`, `POST /events/batch`)
/// with the idempotency protocol. Requests without an
/// `X-Idempotency-Key` header pass through untouched — the key is
/// optional, not required.
pub async fn idempotency_middleware(
    State(state): State<Arc<AppState>>,
    req: Request,
    next: Next,
) -> Result<Response, Response> {
    let idempotency_key = req
        .headers()
        .get(IDEMPOTENCY_KEY_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(|s| s.to_string());

    let Some(idempotency_key) = idempotency_key else {
        return Ok(next.run(req).await);
    };

    let actor = eld_actor::actor_from_headers(req.headers())
        .map_err(|e| ApiError::from(e).into_response())?;
    let actor_id = *actor.id.as_uuid();

    let outcome = state
        .idempotency
        .begin(actor_id, &idempotency_key)
        .await
        .map_err(|e| ApiError::from(e).into_response())?;

    match outcome {
        GateOutcome::Conflict => Err(ApiError::from(eld_core::IngestError::IdempotencyConflict).into_response()),
        GateOutcome::Replay { status, body } => {
            let status = StatusCode::from_u16(status).unwrap_or(StatusCode::OK);
            let body_bytes = serde_json::to_vec(&body).unwrap_or_default();
            let mut response = Response::builder()
                .status(status)
                .header("content-type", "application/json")
                .body(Body::from(body_bytes))
                .unwrap_or_else(|_| Response::new(Body::empty()));
            response
                .headers_mut()
                .insert(IDEMPOTENCY_REPLAY_HEADER, HeaderValue::from_static("true"));
            Ok(response)
        }
        GateOutcome::Proceed { token } => {
            let response = next.run(req).await;
            let (parts, body) = response.into_parts();
            let body_bytes = match to_bytes(body, MAX_CACHED_BODY_BYTES).await {
                Ok(bytes) => bytes,
                Err(_) => {
                    // Body too large to cache. Release the claim instead of
                    // leaving it in_flight until the 60s TTL so a retried
                    // request with the same key is treated as fresh.
                    state.idempotency.abort(token).await.ok();
                    return Ok(Response::from_parts(parts, Body::empty()));
                }
            };
            let status = parts.status.as_u16();
            let json_body: serde_json::Value =
                serde_json::from_slice(&body_bytes).unwrap_or(serde_json::Value::Null);

            if let Err(err) = state.idempotency.complete(token, status, json_body).await {
                tracing::warn!(error = %err, "failed to persist idempotency completion record");
            }

            Ok(Response::from_parts(parts, Body::from(body_bytes)))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn idempotency_key_header_name_is_lowercase() {
        assert_eq!(IDEMPOTENCY_KEY_HEADER, "x-idempotency-key");
    }
}
