//! Chain Appender: the serialization point of the pipeline.
//! Computes `content_hash`/`chain_hash`, holds the scope's advisory lock
//! for the read-head-then-insert transaction, and retries the whole
//! transaction through the retry wrapper on transient conflict.

use chrono::{NaiveDate, NaiveTime};
use eld_db::repos::{ChainHead, EventRepo, NewDbEvent};
use eld_db::models::DbEvent;
use sha2::{Digest, Sha256};
use uuid::Uuid;

use crate::error::IngestError;
use crate::retry::{ingest_error_is_transient, retry, RetryPolicy};
use crate::sequencer::Sequencer;

/// The event fields that participate in the content hash, in the pinned
/// canonical order (DESIGN.md Open Question 1):
/// `device_id || event_type || event_sub_type || log_period_date ||
/// event_date || event_time || sequence_id || odometer_tenths ||
/// engine_hours_tenths`.
#[derive(Debug, Clone)]
pub struct CanonicalEventFields {
    pub device_id: Uuid,
    pub event_type: i16,
    pub event_sub_type: i16,
    pub log_period_date: NaiveDate,
    pub event_date: NaiveDate,
    pub event_time: NaiveTime,
    pub sequence_id: i32,
    pub odometer_tenths: i64,
    pub engine_hours_tenths: i64,
}

impl CanonicalEventFields {
    fn canonical_string(&self) -> String {
        format!(
            "{}|{}|{}|{}|{}|{}|{}|{}|{}",
            self.device_id,
            self.event_type,
            self.event_sub_type,
            self.log_period_date.format("%Y-%m-%d"),
            self.event_date.format("%Y-%m-%d"),
            self.event_time.format("%H:%M:%S"),
            self.sequence_id,
            self.odometer_tenths,
            self.engine_hours_tenths,
        )
    }
}

fn sha256_hex(input: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(input.as_bytes());
    hex::encode(hasher.finalize())
}

pub fn compute_content_hash(fields: &CanonicalEventFields) -> String {
    sha256_hex(&fields.canonical_string())
}

pub fn compute_chain_hash(content_hash: &str, previous_chain_hash: &str) -> String {
    sha256_hex(&format!("{content_hash}{previous_chain_hash}"))
}

/// Deterministic genesis value for a scope with no prior active events.
pub fn genesis_chain_hash(device_id: Uuid, log_period_id: Uuid) -> String {
    sha256_hex(&format!("genesis:{device_id}:{log_period_id}"))
}

/// How the appender should obtain the sequence id for this append, resolved
/// inside the scope's locked transaction rather than by the caller ahead
/// of time — see `ChainAppender::append_once`.
#[derive(Debug, Clone, Copy)]
pub enum SequenceRequest {
    /// Allocate the next free sequence id in the scope.
    Auto,
    /// Use this client-supplied id, after verifying it is in range and not
    /// already active in the scope.
    ClientSupplied(u32),
}

/// Everything the appender needs beyond the hashed fields to build the row.
#[derive(Debug, Clone)]
pub struct AppendRequest {
    pub carrier_id: Uuid,
    pub driver_id: Uuid,
    pub vehicle_id: Uuid,
    pub device_id: Uuid,
    pub log_period_id: Uuid,
    pub log_period_date: NaiveDate,
    pub sequence: SequenceRequest,
    pub event_type: i16,
    pub event_sub_type: i16,
    pub record_status: i16,
    pub record_origin: i16,
    pub event_date: NaiveDate,
    pub event_time: NaiveTime,
    pub tz_offset_minutes: i32,
    pub event_timestamp: chrono::DateTime<chrono::Utc>,
    pub odometer_tenths: i64,
    pub engine_hours_tenths: i64,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub location_description: Option<String>,
    pub malfunction_indicator: bool,
    pub diagnostic_indicator: bool,
}

pub struct ChainAppender {
    events: EventRepo,
    retry_policy: RetryPolicy,
}

impl ChainAppender {
    pub fn new(events: EventRepo, retry_policy: RetryPolicy) -> Self {
        Self { events, retry_policy }
    }

    /// Append one validated event to its scope's chain, allocating or
    /// verifying its sequence id inside the same locked transaction as the
    /// chain-head read and insert. Retried as a whole on a transient
    /// database error; each attempt re-resolves the sequence id fresh
    /// under a freshly-acquired lock, so a retry never replays a stale
    /// allocation.
    pub async fn append(&self, request: AppendRequest) -> Result<DbEvent, IngestError> {
        retry(&self.retry_policy, "chain_append", ingest_error_is_transient, || {
            self.append_once(request.clone())
        })
        .await
    }

    async fn append_once(&self, request: AppendRequest) -> Result<DbEvent, IngestError> {
        let mut tx = self.events.begin().await?;
        EventRepo::lock_scope(&mut tx, request.device_id, request.log_period_id).await?;

        let sequence_id = match request.sequence {
            SequenceRequest::Auto => Sequencer::allocate_tx(&mut tx, request.device_id, request.log_period_id).await?,
            SequenceRequest::ClientSupplied(candidate) => {
                Sequencer::verify_client_supplied_tx(&mut tx, request.device_id, request.log_period_id, candidate).await?
            }
        }
        .get() as i32;

        let previous_chain_hash = match EventRepo::chain_head(&mut tx, request.device_id, request.log_period_id).await? {
            Some(head) => head.chain_hash,
            None => genesis_chain_hash(request.device_id, request.log_period_id),
        };

        let fields = CanonicalEventFields {
            device_id: request.device_id,
            event_type: request.event_type,
            event_sub_type: request.event_sub_type,
            log_period_date: request.log_period_date,
            event_date: request.event_date,
            event_time: request.event_time,
            sequence_id,
            odometer_tenths: request.odometer_tenths,
            engine_hours_tenths: request.engine_hours_tenths,
        };
        let content_hash = compute_content_hash(&fields);
        let chain_hash = compute_chain_hash(&content_hash, &previous_chain_hash);

        let row = EventRepo::insert_active(
            &mut tx,
            NewDbEvent {
                carrier_id: request.carrier_id,
                driver_id: request.driver_id,
                vehicle_id: request.vehicle_id,
                device_id: request.device_id,
                log_period_id: request.log_period_id,
                sequence_id,
                event_type: request.event_type,
                event_sub_type: request.event_sub_type,
                record_status: request.record_status,
                record_origin: request.record_origin,
                event_date: request.event_date,
                event_time: request.event_time,
                tz_offset_minutes: request.tz_offset_minutes,
                event_timestamp: request.event_timestamp,
                odometer_tenths: request.odometer_tenths,
                engine_hours_tenths: request.engine_hours_tenths,
                latitude: request.latitude,
                longitude: request.longitude,
                location_description: request.location_description,
                malfunction_indicator: request.malfunction_indicator,
                diagnostic_indicator: request.diagnostic_indicator,
                content_hash,
                chain_hash,
                previous_chain_hash,
                version: 1,
                superseded_event_id: None,
                original_event_id: None,
            },
        )
        .await?;

        tx.commit().await?;
        Ok(row)
    }
}

/// A detected break in the hash chain, surfaced loudly rather than
/// silently repaired.
#[derive(Debug, Clone)]
pub struct ChainBreak {
    pub event_id: Uuid,
    pub sequence_id: i32,
    pub expected_previous_chain_hash: String,
    pub actual_previous_chain_hash: String,
}

/// Walk a scope in sequence order and re-derive every `chain_hash`.
/// Returns the first break found, if any.
pub fn verify_chain(device_id: Uuid, log_period_id: Uuid, events: &[DbEvent]) -> Option<ChainBreak> {
    let mut expected_previous = genesis_chain_hash(device_id, log_period_id);
    for event in events {
        if event.previous_chain_hash != expected_previous {
            return Some(ChainBreak {
                event_id: event.id,
                sequence_id: event.sequence_id,
                expected_previous_chain_hash: expected_previous,
                actual_previous_chain_hash: event.previous_chain_hash.clone(),
            });
        }
        let fields = CanonicalEventFields {
            device_id: event.device_id,
            event_type: event.event_type,
            event_sub_type: event.event_sub_type,
            log_period_date: event.event_date,
            event_date: event.event_date,
            event_time: event.event_time,
            sequence_id: event.sequence_id,
            odometer_tenths: event.odometer_tenths,
            engine_hours_tenths: event.engine_hours_tenths,
        };
        let recomputed_content_hash = compute_content_hash(&fields);
        let recomputed_chain_hash = compute_chain_hash(&recomputed_content_hash, &event.previous_chain_hash);
        if recomputed_chain_hash != event.chain_hash {
            return Some(ChainBreak {
                event_id: event.id,
                sequence_id: event.sequence_id,
                expected_previous_chain_hash: recomputed_chain_hash,
                actual_previous_chain_hash: event.chain_hash.clone(),
            });
        }
        expected_previous = event.chain_hash.clone();
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fields(sequence_id: i32) -> CanonicalEventFields {
        CanonicalEventFields {
            device_id: Uuid::nil(),
            event_type: 1,
            event_sub_type: 3,
            log_period_date: NaiveDate::from_ymd_opt(2026, 2, 15).unwrap(),
            event_date: NaiveDate::from_ymd_opt(2026, 2, 15).unwrap(),
            event_time: NaiveTime::from_hms_opt(12, 0, 0).unwrap(),
            sequence_id,
            odometer_tenths: 10_000,
            engine_hours_tenths: 1_000,
        }
    }

    #[test]
    fn content_hash_is_deterministic() {
        assert_eq!(compute_content_hash(&fields(1)), compute_content_hash(&fields(1)));
    }

    #[test]
    fn content_hash_differs_on_sequence() {
        assert_ne!(compute_content_hash(&fields(1)), compute_content_hash(&fields(2)));
    }

    #[test]
    fn chain_hash_links_to_previous() {
        let device = Uuid::new_v4();
        let period = Uuid::new_v4();
        let genesis = genesis_chain_hash(device, period);
        let content1 = compute_content_hash(&fields(1));
        let chain1 = compute_chain_hash(&content1, &genesis);
        let content2 = compute_content_hash(&fields(2));
        let chain2 = compute_chain_hash(&content2, &chain1);
        assert_ne!(chain1, chain2);
        assert_eq!(compute_chain_hash(&content2, &chain1), chain2);
    }

    #[test]
    fn genesis_hash_is_scope_specific() {
        let device = Uuid::new_v4();
        let period_a = Uuid::new_v4();
        let period_b = Uuid::new_v4();
        assert_ne!(genesis_chain_hash(device, period_a), genesis_chain_hash(device, period_b));
    }
}
