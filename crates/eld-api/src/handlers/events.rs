//! Event ingestion handlers: `POST /events`, `POST /events/batch`, and
//! the two scope-read endpoints. Each follows an extractor-then-pipeline-
//! call shape.

use std::sync::Arc;
use std::time::Instant;

use axum::extract::{Path, State};
use axum::http::{HeaderMap, StatusCode};
use axum::Json;
use chrono::NaiveDate;
use eld_actor::RequireActor;
use eld_core::pipeline::SubmissionContext;
use eld_types::FieldError;
use serde::Deserialize;
use uuid::Uuid;

use crate::dto::event::{
    BatchAcceptedItem, BatchEventRequest, BatchEventResponse, BatchRejectedItem, BatchSummary,
    EventAcceptedResponse, EventResponse, GapsResponse, RawEventInput, MAX_BATCH_SIZE,
};
use crate::dto::SuccessEnvelope;
use crate::error::{ApiError, ApiResult};
use crate::state::AppState;

const DEVICE_ID_HEADER: &str = "x-device-id";

/// Resolve the submitting device: the body's `deviceId` wins when present;
/// the `X-Device-Id` header is the tie-break used only when the body
/// omits it.
fn resolve_device_id(body_device_id: Option<Uuid>, headers: &HeaderMap) -> Option<Uuid> {
    body_device_id.or_else(|| {
        headers
            .get(DEVICE_ID_HEADER)
            .and_then(|v| v.to_str().ok())
            .and_then(|s| Uuid::parse_str(s).ok())
    })
}

/// The log-period scope (`device`, `driver`, calendar day) must exist
/// before the pipeline can sequence an event into it, so the handler
/// resolves it ahead of calling `IngestPipeline`. This parses the same
/// timestamp the shape validator parses; a malformed timestamp is
/// reported with the same field error the validator would have produced,
/// just surfaced one layer earlier because the log-period lookup needs
/// the date first.
fn resolve_log_period_date(raw_timestamp: &str) -> Result<NaiveDate, FieldError> {
    chrono::DateTime::parse_from_rfc3339(raw_timestamp)
        .map(|dt| dt.date_naive())
        .map_err(|_| FieldError::new("eventTimestamp", "INVALID_FORMAT", "event timestamp must be ISO-8601"))
}

async fn submit_one(
    state: &AppState,
    mut input: RawEventInput,
    headers: &HeaderMap,
    actor: &RequireActor,
    raw_payload: serde_json::Value,
) -> Result<eld_core::pipeline::IngestedEvent, ApiError> {
    let device_id = resolve_device_id(input.device_id, headers)
        .ok_or_else(|| ApiError::validation(vec![FieldError::new("deviceId", "REQUIRED", "deviceId is required")]))?;
    input.device_id = Some(device_id);

    let log_period_date = resolve_log_period_date(&input.event_timestamp).map_err(|e| ApiError::validation(vec![e]))?;

    let log_period = state
        .db
        .log_periods()
        .find_or_create(device_id, input.driver_id, log_period_date)
        .await?;

    let context = SubmissionContext {
        actor_id: *actor.0.id.as_uuid(),
        source_device_id: Some(device_id),
        source_endpoint: "/events".to_string(),
        ip_address: headers.get("x-forwarded-for").and_then(|v| v.to_str().ok()).map(String::from),
        user_agent: headers.get("user-agent").and_then(|v| v.to_str().ok()).map(String::from),
    };

    Ok(state
        .pipeline
        .ingest_one(input, raw_payload, &context, log_period.id, log_period_date)
        .await?)
}

pub async fn create_event(
    State(state): State<Arc<AppState>>,
    actor: RequireActor,
    headers: HeaderMap,
    Json(input): Json<RawEventInput>,
) -> ApiResult<(StatusCode, Json<SuccessEnvelope<EventAcceptedResponse>>)> {
    let raw_payload = serde_json::to_value(&input).unwrap_or(serde_json::Value::Null);
    let ingested = submit_one(&state, input, &headers, &actor, raw_payload).await?;
    Ok((
        StatusCode::CREATED,
        Json(SuccessEnvelope::new(EventAcceptedResponse::from(&ingested.event))),
    ))
}

pub async fn create_event_batch(
    State(state): State<Arc<AppState>>,
    actor: RequireActor,
    headers: HeaderMap,
    Json(request): Json<BatchEventRequest>,
) -> ApiResult<(StatusCode, Json<BatchEventResponse>)> {
    let start = Instant::now();
    if request.events.is_empty() {
        return Err(ApiError::bad_request("events must contain at least one event"));
    }
    if request.events.len() > MAX_BATCH_SIZE {
        return Err(ApiError::bad_request(format!(
            "batch exceeds the maximum of {MAX_BATCH_SIZE} events"
        )));
    }

    // All events in a batch share one scope: the batch-level `deviceId`
    // (falling back to the header) resolves the log-period once up front.
    // Per-event `deviceId` is still honored by the pipeline's sequencer,
    // but the scope the batch is filed under is fixed for the request.
    let batch_device_id = resolve_device_id(request.device_id, &headers);

    let first_driver_id = request.events[0].driver_id;
    let device_id = batch_device_id
        .or_else(|| request.events[0].device_id)
        .ok_or_else(|| ApiError::validation(vec![FieldError::new("deviceId", "REQUIRED", "deviceId is required")]))?;

    let mut inputs = Vec::with_capacity(request.events.len());
    let mut raw_payloads = Vec::with_capacity(request.events.len());
    let mut log_period_date = None;
    for mut event in request.events {
        if event.device_id.is_none() {
            event.device_id = Some(device_id);
        }
        if log_period_date.is_none() {
            log_period_date = Some(
                resolve_log_period_date(&event.event_timestamp)
                    .map_err(|e| ApiError::validation(vec![e]))?,
            );
        }
        raw_payloads.push(serde_json::to_value(&event).unwrap_or(serde_json::Value::Null));
        inputs.push(event);
    }
    let log_period_date = log_period_date.expect("at least one event validated above");

    let log_period = state
        .db
        .log_periods()
        .find_or_create(device_id, first_driver_id, log_period_date)
        .await?;

    let context = SubmissionContext {
        actor_id: *actor.0.id.as_uuid(),
        source_device_id: Some(device_id),
        source_endpoint: "/events/batch".to_string(),
        ip_address: headers.get("x-forwarded-for").and_then(|v| v.to_str().ok()).map(String::from),
        user_agent: headers.get("user-agent").and_then(|v| v.to_str().ok()).map(String::from),
    };

    let total = inputs.len();
    let results = state
        .pipeline
        .ingest_batch(inputs, raw_payloads, &context, log_period.id, log_period_date)
        .await;

    let mut accepted = Vec::new();
    let mut rejected = Vec::new();
    for (index, result) in results.into_iter().enumerate() {
        match result {
            Ok(ingested) => accepted.push(BatchAcceptedItem {
                index,
                event_id: ingested.event.id,
                sequence_id: ingested.event.sequence_id,
                chain_hash: ingested.event.chain_hash,
                event_type: ingested.event.event_type as u8,
            }),
            Err(err) => {
                let api_err = ApiError::from(err);
                rejected.push(BatchRejectedItem {
                    index,
                    error: api_err.body,
                })
            }
        }
    }

    let status = if rejected.is_empty() {
        StatusCode::CREATED
    } else if accepted.is_empty() {
        StatusCode::BAD_REQUEST
    } else {
        StatusCode::MULTI_STATUS
    };

    let summary = BatchSummary {
        total,
        accepted: accepted.len(),
        rejected: rejected.len(),
        processing_time_ms: start.elapsed().as_millis() as u64,
    };

    Ok((status, Json(BatchEventResponse { accepted, rejected, summary })))
}

#[derive(Debug, Deserialize)]
pub struct ScopePath {
    pub device: Uuid,
    pub log_date: NaiveDate,
}

pub async fn list_scope_events(
    State(state): State<Arc<AppState>>,
    _actor: RequireActor,
    Path(scope): Path<ScopePath>,
) -> ApiResult<Json<SuccessEnvelope<Vec<EventResponse>>>> {
    let log_period = state.db.log_periods().find(scope.device, scope.log_date).await?;
    let Some(log_period) = log_period else {
        return Ok(Json(SuccessEnvelope::new(Vec::new())));
    };
    let events = state.db.events().list_by_scope(scope.device, log_period.id).await?;
    Ok(Json(SuccessEnvelope::new(events.into_iter().map(EventResponse::from).collect())))
}

pub async fn scope_gaps(
    State(state): State<Arc<AppState>>,
    _actor: RequireActor,
    Path(scope): Path<ScopePath>,
) -> ApiResult<Json<SuccessEnvelope<GapsResponse>>> {
    let log_period = state.db.log_periods().find(scope.device, scope.log_date).await?;
    let Some(log_period) = log_period else {
        return Ok(Json(SuccessEnvelope::new(GapsResponse { gaps: Vec::new() })));
    };
    let gaps = state.db.events().find_gaps(scope.device, log_period.id).await?;
    Ok(Json(SuccessEnvelope::new(GapsResponse { gaps })))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn body_device_id_wins_over_header() {
        let body_id = Uuid::new_v4();
        let header_id = Uuid::new_v4();
        let mut headers = HeaderMap::new();
        headers.insert(DEVICE_ID_HEADER, HeaderValue::from_str(&header_id.to_string()).unwrap());
        assert_eq!(resolve_device_id(Some(body_id), &headers), Some(body_id));
    }

    #[test]
    fn header_is_tie_break_when_body_omits_device() {
        let header_id = Uuid::new_v4();
        let mut headers = HeaderMap::new();
        headers.insert(DEVICE_ID_HEADER, HeaderValue::from_str(&header_id.to_string()).unwrap());
        assert_eq!(resolve_device_id(None, &headers), Some(header_id));
    }

    #[test]
    fn neither_source_yields_none() {
        assert_eq!(resolve_device_id(None, &HeaderMap::new()), None);
    }

    #[test]
    fn malformed_timestamp_surfaces_same_field_error_as_shape_layer() {
        let err = resolve_log_period_date("not-a-timestamp").unwrap_err();
        assert_eq!(err.field, "eventTimestamp");
    }
}
