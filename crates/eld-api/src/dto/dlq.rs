//! Admin DLQ surface DTOs.

use chrono::{DateTime, Utc};
use eld_db::models::DbDlqEntry;
use eld_types::DlqStatus;
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use utoipa::ToSchema;

/// List/stats query filters. `status` is validated against the closed
/// `DlqStatus` vocabulary at the handler boundary rather than accepted as
/// a free string.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DlqListQuery {
    pub status: Option<String>,
    pub source_device_id: Option<Uuid>,
    pub source_endpoint: Option<String>,
    #[serde(default = "default_limit")]
    pub limit: i64,
    #[serde(default)]
    pub offset: i64,
}

fn default_limit() -> i64 {
    50
}

/// List entries. Responses omit the large `original_payload` field;
/// fetch a single entry for the full payload.
#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct DlqEntrySummary {
    pub id: Uuid,
    pub failure_reason: String,
    pub retry_count: i32,
    pub first_failed_at: DateTime<Utc>,
    pub last_failed_at: DateTime<Utc>,
    pub status: String,
    pub source_endpoint: String,
    pub source_device_id: Option<Uuid>,
    pub batch_index: Option<i32>,
    pub vault_record_id: Option<Uuid>,
}

impl From<DbDlqEntry> for DlqEntrySummary {
    fn from(entry: DbDlqEntry) -> Self {
        Self {
            id: entry.id,
            failure_reason: entry.failure_reason,
            retry_count: entry.retry_count,
            first_failed_at: entry.first_failed_at,
            last_failed_at: entry.last_failed_at,
            status: entry.status,
            source_endpoint: entry.source_endpoint,
            source_device_id: entry.source_device_id,
            batch_index: entry.batch_index,
            vault_record_id: entry.vault_record_id,
        }
    }
}

/// Single-entry detail view, including the original payload.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DlqEntryDetail {
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

impl From<DbDlqEntry> for DlqEntryDetail {
    fn from(entry: DbDlqEntry) -> Self {
        Self {
            id: entry.id,
            original_payload: entry.original_payload,
            failure_reason: entry.failure_reason,
            retry_count: entry.retry_count,
            first_failed_at: entry.first_failed_at,
            last_failed_at: entry.last_failed_at,
            status: entry.status,
            source_endpoint: entry.source_endpoint,
            source_device_id: entry.source_device_id,
            batch_index: entry.batch_index,
            vault_record_id: entry.vault_record_id,
            resolved_by: entry.resolved_by,
            resolved_at: entry.resolved_at,
            resolution_notes: entry.resolution_notes,
        }
    }
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct DlqStatCount {
    pub status: String,
    pub count: i64,
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct DlqStatsResponse {
    pub counts: Vec<DlqStatCount>,
    pub pending: i64,
    pub threshold_exceeded: bool,
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct DlqRetryResponse {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub event_id: Option<Uuid>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sequence_id: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub chain_hash: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DlqDiscardRequest {
    pub notes: Option<String>,
}

/// Parse the query's free-string status filter against the closed
/// vocabulary, rejecting anything else at the handler boundary.
pub fn parse_status_filter(raw: Option<&str>) -> Result<Option<DlqStatus>, String> {
    match raw {
        None => Ok(None),
        Some(s) => DlqStatus::parse(s)
            .map(Some)
            .ok_or_else(|| format!("'{s}' is not a valid dlq status")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_status_filter_accepts_known_values() {
        assert_eq!(parse_status_filter(Some("pending")), Ok(Some(DlqStatus::Pending)));
    }

    #[test]
    fn parse_status_filter_rejects_unknown_values() {
        assert!(parse_status_filter(Some("bogus")).is_err());
    }

    #[test]
    fn parse_status_filter_passes_through_absence() {
        assert_eq!(parse_status_filter(None), Ok(None));
    }
}
