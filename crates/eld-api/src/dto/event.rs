//! Event submission and read-model DTOs. The single-event submission
//! body is `eld_core`'s own `RawEventInput` — the wire shape already
//! lives at the validator boundary, so the HTTP layer only adds the
//! envelope around it rather than re-declaring the same fields.

use chrono::{DateTime, NaiveDate, Utc};
pub use eld_core::validator::RawEventInput;
use eld_db::models::DbEvent;
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use utoipa::ToSchema;

use crate::error::ErrorBody;

/// Batch submissions are capped at this many events per request.
pub const MAX_BATCH_SIZE: usize = 100;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchEventRequest {
    pub events: Vec<RawEventInput>,
    pub device_id: Option<Uuid>,
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct EventAcceptedResponse {
    pub event_id: Uuid,
    pub sequence_id: i32,
    pub chain_hash: String,
}

impl From<&DbEvent> for EventAcceptedResponse {
    fn from(event: &DbEvent) -> Self {
        Self {
            event_id: event.id,
            sequence_id: event.sequence_id,
            chain_hash: event.chain_hash.clone(),
        }
    }
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct BatchAcceptedItem {
    pub index: usize,
    pub event_id: Uuid,
    pub sequence_id: i32,
    pub chain_hash: String,
    pub event_type: u8,
}

/// Not `ToSchema`: `ErrorBody` carries `eld_types::FieldError`, which lives
/// in a crate with no `utoipa` dependency (deliberately kept free of the
/// web-framework annotation layer).
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchRejectedItem {
    pub index: usize,
    pub error: ErrorBody,
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct BatchSummary {
    pub total: usize,
    pub accepted: usize,
    pub rejected: usize,
    pub processing_time_ms: u64,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchEventResponse {
    pub accepted: Vec<BatchAcceptedItem>,
    pub rejected: Vec<BatchRejectedItem>,
    pub summary: BatchSummary,
}

/// Read-model projection of an event row, for the scope listing endpoint.
#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct EventResponse {
    pub id: Uuid,
    pub device_id: Uuid,
    pub driver_id: Uuid,
    pub vehicle_id: Uuid,
    pub log_period_id: Uuid,
    pub sequence_id: i32,
    pub event_type: i16,
    pub event_sub_type: i16,
    pub record_status: i16,
    pub record_origin: i16,
    pub event_date: NaiveDate,
    pub event_timestamp: DateTime<Utc>,
    pub odometer_tenths: i64,
    pub engine_hours_tenths: i64,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub location_description: Option<String>,
    pub content_hash: String,
    pub chain_hash: String,
    pub previous_chain_hash: String,
    pub version: i32,
}

impl From<DbEvent> for EventResponse {
    fn from(event: DbEvent) -> Self {
        Self {
            id: event.id,
            device_id: event.device_id,
            driver_id: event.driver_id,
            vehicle_id: event.vehicle_id,
            log_period_id: event.log_period_id,
            sequence_id: event.sequence_id,
            event_type: event.event_type,
            event_sub_type: event.event_sub_type,
            record_status: event.record_status,
            record_origin: event.record_origin,
            event_date: event.event_date,
            event_timestamp: event.event_timestamp,
            odometer_tenths: event.odometer_tenths,
            engine_hours_tenths: event.engine_hours_tenths,
            latitude: event.latitude,
            longitude: event.longitude,
            location_description: event.location_description,
            content_hash: event.content_hash,
            chain_hash: event.chain_hash,
            previous_chain_hash: event.previous_chain_hash,
            version: event.version,
        }
    }
}

#[derive(Debug, Serialize, ToSchema)]
pub struct GapsResponse {
    pub gaps: Vec<i32>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn max_batch_size_matches_spec() {
        assert_eq!(MAX_BATCH_SIZE, 100);
    }
}
