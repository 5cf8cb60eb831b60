//! Row types for every table, mapped with `sqlx::FromRow`. These are the
//! storage-layer shapes; `eld-core` translates them into domain types at
//! the pipeline boundary.

use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct DbEvent {
    pub id: Uuid,
    pub carrier_id: Uuid,
    pub driver_id: Uuid,
    pub vehicle_id: Uuid,
    pub device_id: Uuid,
    pub log_period_id: Uuid,
    pub sequence_id: i32,
    pub event_type: i16,
    pub event_sub_type: i16,
    pub record_status: i16,
    pub record_origin: i16,
    pub event_date: NaiveDate,
    pub event_time: NaiveTime,
    pub tz_offset_minutes: i32,
    pub event_timestamp: DateTime<Utc>,
    pub odometer_tenths: i64,
    pub engine_hours_tenths: i64,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub location_description: Option<String>,
    pub malfunction_indicator: bool,
    pub diagnostic_indicator: bool,
    pub content_hash: String,
    pub chain_hash: String,
    pub previous_chain_hash: String,
    pub version: i32,
    pub superseded_event_id: Option<Uuid>,
    pub original_event_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct DbLogPeriod {
    pub id: Uuid,
    pub device_id: Uuid,
    pub driver_id: Uuid,
    pub log_date: NaiveDate,
    pub status: String,
    pub event_count: i32,
    pub certified_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct DbIdempotencyRecord {
    pub actor_id: Uuid,
    pub idempotency_key: String,
    pub status: String,
    pub response_status: Option<i32>,
    pub response_body: Option<serde_json::Value>,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct DbVaultRecord {
    pub id: Uuid,
    pub raw_payload: serde_json::Value,
    pub received_at: DateTime<Utc>,
    pub source_device_id: Option<Uuid>,
    pub actor_id: Uuid,
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
    pub batch_id: Option<Uuid>,
    pub batch_index: Option<i32>,
    pub status: String,
    pub event_id: Option<Uuid>,
    pub error_message: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct DbDlqEntry {
    pub id: Uuid,
    pub original_payload: serde_json::Value,
    pub failure_reason: String,
    pub retry_count: i32,
    pub first_failed_at: DateTime<Utc>,
    pub last_failed_at: DateTime<Utc>,
    pub status: String,
    pub source_endpoint: String,
    pub source_device_id: Option<Uuid>,
    pub batch_index: Option<i32>,
    pub vault_record_id: Option<Uuid>,
    pub resolved_by: Option<Uuid>,
    pub resolved_at: Option<DateTime<Utc>>,
    pub resolution_notes: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct DlqStatusCounts {
    pub status: String,
    pub count: i64,
}
