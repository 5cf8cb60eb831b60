//! Admin DLQ surface: list, stats, single-entry detail, retry, and
//! discard. Gated behind `RequireAdminActor` — trusts the role the auth
//! collaborator already verified, without re-deriving it.

use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::Json;
use eld_actor::RequireAdminActor;
use uuid::Uuid;

use crate::dto::dlq::{
    parse_status_filter, DlqDiscardRequest, DlqEntryDetail, DlqEntrySummary, DlqListQuery,
    DlqRetryResponse, DlqStatCount, DlqStatsResponse,
};
use crate::dto::SuccessEnvelope;
use crate::error::{ApiError, ApiResult};
use crate::state::AppState;

pub async fn list_dlq(
    State(state): State<Arc<AppState>>,
    _admin: RequireAdminActor,
    Query(query): Query<DlqListQuery>,
) -> ApiResult<Json<SuccessEnvelope<Vec<DlqEntrySummary>>>> {
    let status = parse_status_filter(query.status.as_deref()).map_err(ApiError::bad_request)?;
    let entries = state
        .dlq
        .list(status, query.source_device_id, query.source_endpoint.as_deref(), query.limit, query.offset)
        .await?;
    Ok(Json(SuccessEnvelope::new(entries.into_iter().map(DlqEntrySummary::from).collect())))
}

pub async fn dlq_stats(
    State(state): State<Arc<AppState>>,
    _admin: RequireAdminActor,
) -> ApiResult<Json<SuccessEnvelope<DlqStatsResponse>>> {
    let counts = state.dlq.stats().await?;
    let pending = counts
        .iter()
        .find(|c| c.status == "pending")
        .map(|c| c.count)
        .unwrap_or(0);
    Ok(Json(SuccessEnvelope::new(DlqStatsResponse {
        counts: counts
            .into_iter()
            .map(|c| DlqStatCount { status: c.status, count: c.count })
            .collect(),
        pending,
        threshold_exceeded: pending >= state.config.dlq.pending_alert_threshold,
    })))
}

pub async fn get_dlq_entry(
    State(state): State<Arc<AppState>>,
    _admin: RequireAdminActor,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<SuccessEnvelope<DlqEntryDetail>>> {
    let entry = state.dlq.get(id).await?;
    Ok(Json(SuccessEnvelope::new(DlqEntryDetail::from(entry))))
}

/// Retry a dead-lettered event: replays the original submission through
/// the ordinary ingestion pipeline. Succeeds or fails exactly like the
/// original request would have; the DLQ entry's status reflects the
/// outcome either way.
pub async fn retry_dlq_entry(
    State(state): State<Arc<AppState>>,
    admin: RequireAdminActor,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<DlqRetryResponse>> {
    let entry = state.dlq.begin_retry(id).await?;

    let replay_result = replay_entry(&state, &entry).await;

    match replay_result {
        Ok(ingested) => {
            state
                .dlq
                .retry_succeeded(id, *admin.0.id.as_uuid(), ingested.event.id)
                .await?;
            Ok(Json(DlqRetryResponse {
                success: true,
                event_id: Some(ingested.event.id),
                sequence_id: Some(ingested.event.sequence_id),
                chain_hash: Some(ingested.event.chain_hash),
                error: None,
            }))
        }
        Err(err) => {
            state.dlq.retry_failed(id, &err.to_string()).await?;
            Ok(Json(DlqRetryResponse {
                success: false,
                event_id: None,
                sequence_id: None,
                chain_hash: None,
                error: Some(err.to_string()),
            }))
        }
    }
}

async fn replay_entry(
    state: &AppState,
    entry: &eld_db::models::DbDlqEntry,
) -> Result<eld_core::pipeline::IngestedEvent, eld_core::IngestError> {
    let input: eld_core::validator::RawEventInput =
        serde_json::from_value(entry.original_payload.clone())
            .map_err(|e| eld_core::IngestError::Integrity(format!("dlq payload no longer parses: {e}")))?;

    let device_id = entry
        .source_device_id
        .or(input.device_id)
        .ok_or_else(|| eld_core::IngestError::Integrity("dlq entry has no recoverable device id".to_string()))?;

    let log_period_date = chrono::DateTime::parse_from_rfc3339(&input.event_timestamp)
        .map(|dt| dt.date_naive())
        .map_err(|_| eld_core::IngestError::Integrity("dlq payload has an unparsable timestamp".to_string()))?;

    let log_period = state
        .db
        .log_periods()
        .find_or_create(device_id, input.driver_id, log_period_date)
        .await?;

    let context = eld_core::pipeline::SubmissionContext {
        actor_id: entry.source_device_id.unwrap_or(device_id),
        source_device_id: Some(device_id),
        source_endpoint: entry.source_endpoint.clone(),
        ip_address: None,
        user_agent: None,
    };

    state
        .pipeline
        .ingest_one(input, entry.original_payload.clone(), &context, log_period.id, log_period_date)
        .await
}

pub async fn discard_dlq_entry(
    State(state): State<Arc<AppState>>,
    admin: RequireAdminActor,
    Path(id): Path<Uuid>,
    Json(request): Json<DlqDiscardRequest>,
) -> ApiResult<Json<SuccessEnvelope<()>>> {
    state
        .dlq
        .discard(id, *admin.0.id.as_uuid(), request.notes.as_deref())
        .await?;
    Ok(Json(SuccessEnvelope::new(())))
}
