//! The top-level ingestion pipeline: Vault Writer → Idempotency Gate →
//! Validator → Sequencer → Chain Appender → DLQ Router, composed into
//! single-event and batch entry points.

use std::time::Instant;

use eld_db::models::DbEvent;
use eld_db::repos::VaultRepo;
use eld_db::Database;
use eld_types::RecordOrigin;
use uuid::Uuid;

use crate::chain::{AppendRequest, ChainAppender, SequenceRequest};
use crate::config::IngestConfig;
use crate::dlq::DlqService;
use crate::error::IngestError;
use crate::retry::RetryPolicy;
use crate::validator::{self, CrossReferenceChecker, RawEventInput};

/// Everything the pipeline needs to identify who is submitting and where
/// to file the raw payload, separate from the event body itself.
#[derive(Debug, Clone)]
pub struct SubmissionContext {
    pub actor_id: Uuid,
    pub source_device_id: Option<Uuid>,
    pub source_endpoint: String,
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
}

/// A successfully ingested event plus the vault record it was written
/// from, for callers that need both (e.g. to report `vaultRecordId` back
/// to the client).
#[derive(Debug, Clone)]
pub struct IngestedEvent {
    pub event: DbEvent,
    pub vault_record_id: Uuid,
}

pub struct IngestPipeline {
    vault: VaultRepo,
    appender: ChainAppender,
    cross_reference: CrossReferenceChecker,
    dlq: DlqService,
    config: IngestConfig,
}

impl IngestPipeline {
    pub fn new(db: &Database, config: IngestConfig) -> Self {
        let retry_policy = RetryPolicy::from(&config.retry);
        Self {
            vault: db.vault(),
            appender: ChainAppender::new(db.events(), retry_policy),
            cross_reference: CrossReferenceChecker::new(db.reference()),
            dlq: DlqService::new(db.dlq(), config.dlq.clone()),
            config,
        }
    }

    /// Ingest a single event: write to the vault, validate, sequence, and
    /// append to the chain. A validation failure is returned directly to
    /// the caller and never reaches the DLQ; an ingestion-stage failure
    /// after a successful validation is routed to the DLQ before the
    /// error is returned.
    pub async fn ingest_one(
        &self,
        input: RawEventInput,
        raw_payload: serde_json::Value,
        context: &SubmissionContext,
        log_period_id: Uuid,
        log_period_date: chrono::NaiveDate,
    ) -> Result<IngestedEvent, IngestError> {
        let vault_record = self
            .vault
            .insert(
                raw_payload.clone(),
                context.source_device_id,
                context.actor_id,
                context.ip_address.clone(),
                context.user_agent.clone(),
                None,
                None,
            )
            .await
            .map_err(IngestError::from)?;

        let result = self
            .validate_and_append(&input, log_period_id, log_period_date)
            .await;

        match result {
            Ok(event) => {
                // Fire-and-forget: the event already landed, and the
                // response should not wait on annotating the vault record.
                self.spawn_mark_processed(vault_record.id, event.id);
                metrics::counter!("eld_ingest.events.ingested").increment(1);
                Ok(IngestedEvent {
                    event,
                    vault_record_id: vault_record.id,
                })
            }
            Err(err) => {
                self.route_failure(&err, vault_record.id, raw_payload, context, None);
                Err(err)
            }
        }
    }

    /// Ingest a batch: each event independently runs vault write, batch
    /// monotonicity validation (against its siblings), sequencing, and
    /// chain append. One event's failure does not block its siblings —
    /// the caller gets a 207 multi-status response describing each.
    pub async fn ingest_batch(
        &self,
        inputs: Vec<RawEventInput>,
        raw_payloads: Vec<serde_json::Value>,
        context: &SubmissionContext,
        log_period_id: Uuid,
        log_period_date: chrono::NaiveDate,
    ) -> Vec<Result<IngestedEvent, IngestError>> {
        let batch_id = Uuid::new_v4();
        let vault_records = match self
            .vault
            .insert_batch(batch_id, context.actor_id, context.source_device_id, raw_payloads.clone())
            .await
        {
            Ok(records) => records,
            Err(err) => {
                let mapped = IngestError::from(err);
                return inputs.iter().map(|_| Err(clone_ingest_error(&mapped))).collect();
            }
        };

        let mode = self.config.validator.cross_reference_mode;
        let validated = validator::validate_batch(&inputs, &self.cross_reference, mode).await;

        let mut results = Vec::with_capacity(inputs.len());
        for (index, outcome) in validated.into_iter().enumerate() {
            let vault_record = &vault_records[index];
            match outcome {
                Err(field_errors) => {
                    let err = IngestError::Validation(field_errors);
                    self.spawn_mark_rejected(vault_record.id, err.to_string());
                    metrics::counter!("eld_ingest.events.rejected").increment(1);
                    results.push(Err(err));
                }
                Ok(shape) => {
                    let result = self.sequence_and_append(&shape, log_period_id, log_period_date).await;
                    match result {
                        Ok(event) => {
                            self.spawn_mark_processed(vault_record.id, event.id);
                            metrics::counter!("eld_ingest.events.ingested").increment(1);
                            results.push(Ok(IngestedEvent {
                                event,
                                vault_record_id: vault_record.id,
                            }));
                        }
                        Err(err) => {
                            self.route_failure(
                                &err,
                                vault_record.id,
                                raw_payloads[index].clone(),
                                context,
                                Some(index as i32),
                            );
                            results.push(Err(err));
                        }
                    }
                }
            }
        }
        results
    }

    async fn validate_and_append(
        &self,
        input: &RawEventInput,
        log_period_id: Uuid,
        log_period_date: chrono::NaiveDate,
    ) -> Result<DbEvent, IngestError> {
        let mode = self.config.validator.cross_reference_mode;
        let shape = validator::validate_single(input, &self.cross_reference, mode)
            .await
            .map_err(IngestError::Validation)?;
        self.sequence_and_append(&shape, log_period_id, log_period_date).await
    }

    async fn sequence_and_append(
        &self,
        shape: &validator::ValidatedShape,
        log_period_id: Uuid,
        log_period_date: chrono::NaiveDate,
    ) -> Result<DbEvent, IngestError> {
        let device_id = shape.device_id.ok_or_else(|| {
            IngestError::Validation(vec![eld_types::FieldError::new(
                "deviceId",
                "REQUIRED",
                "deviceId is required to allocate a sequence",
            )])
        })?;

        let sequence = match shape.event_sequence_id {
            Some(candidate) => SequenceRequest::ClientSupplied(candidate),
            None => SequenceRequest::Auto,
        };

        let request = AppendRequest {
            carrier_id: shape.carrier_id,
            driver_id: shape.driver_id,
            vehicle_id: shape.vehicle_id,
            device_id,
            log_period_id,
            log_period_date,
            sequence,
            event_type: shape.event_type.code() as i16,
            event_sub_type: shape.event_sub_type as i16,
            record_status: shape.record_status.code() as i16,
            record_origin: record_origin_code(shape.record_origin),
            event_date: shape.event_timestamp.date_naive(),
            event_time: shape.event_timestamp.time(),
            tz_offset_minutes: shape.event_timestamp.offset().local_minus_utc() / 60,
            event_timestamp: shape.event_timestamp.with_timezone(&chrono::Utc),
            odometer_tenths: shape.odometer_tenths,
            engine_hours_tenths: shape.engine_hours_tenths,
            latitude: shape.latitude,
            longitude: shape.longitude,
            location_description: shape.location_description.clone(),
            malfunction_indicator: shape.malfunction_indicator,
            diagnostic_indicator: shape.diagnostic_indicator,
        };

        let started = Instant::now();
        let result = self.appender.append(request).await;
        metrics::histogram!("eld_ingest.chain.append_latency_ms").record(started.elapsed().as_secs_f64() * 1000.0);
        result
    }

    /// Only route genuine ingestion failures to the DLQ; a validation
    /// rejection is the client's problem, not ours. Both the vault
    /// annotation and the DLQ write are dispatched as background tasks —
    /// the response may already be on the wire before either completes.
    fn route_failure(
        &self,
        err: &IngestError,
        vault_record_id: Uuid,
        raw_payload: serde_json::Value,
        context: &SubmissionContext,
        batch_index: Option<i32>,
    ) {
        if !err.is_ingestion_failure() {
            self.spawn_mark_rejected(vault_record_id, err.to_string());
            metrics::counter!("eld_ingest.events.rejected").increment(1);
            return;
        }

        self.spawn_mark_failed(vault_record_id, err.to_string());
        self.spawn_dlq_add(
            raw_payload,
            err.to_string(),
            context.source_endpoint.clone(),
            context.source_device_id,
            batch_index,
            vault_record_id,
        );
    }

    fn spawn_mark_processed(&self, vault_record_id: Uuid, event_id: Uuid) {
        let vault = self.vault.clone();
        tokio::spawn(async move {
            if let Err(err) = vault.mark_processed(vault_record_id, event_id).await {
                tracing::warn!(error = %err, %vault_record_id, "failed to mark vault record processed");
            }
        });
    }

    fn spawn_mark_rejected(&self, vault_record_id: Uuid, reason: String) {
        let vault = self.vault.clone();
        tokio::spawn(async move {
            if let Err(err) = vault.mark_rejected(vault_record_id, &reason).await {
                tracing::warn!(error = %err, %vault_record_id, "failed to mark vault record rejected");
            }
        });
    }

    fn spawn_mark_failed(&self, vault_record_id: Uuid, reason: String) {
        let vault = self.vault.clone();
        tokio::spawn(async move {
            if let Err(err) = vault.mark_failed(vault_record_id, &reason).await {
                tracing::warn!(error = %err, %vault_record_id, "failed to mark vault record failed");
            }
        });
    }

    fn spawn_dlq_add(
        &self,
        raw_payload: serde_json::Value,
        failure_reason: String,
        source_endpoint: String,
        source_device_id: Option<Uuid>,
        batch_index: Option<i32>,
        vault_record_id: Uuid,
    ) {
        let dlq = self.dlq.clone();
        tokio::spawn(async move {
            match dlq
                .add(raw_payload, &failure_reason, &source_endpoint, source_device_id, batch_index, Some(vault_record_id))
                .await
            {
                Ok(_) => metrics::counter!("eld_ingest.events.deadlettered").increment(1),
                Err(err) => tracing::error!(error = %err, "failed to route failed ingestion to dlq"),
            }
        });
    }
}

fn record_origin_code(origin: RecordOrigin) -> i16 {
    origin.code() as i16
}

/// `IngestError` doesn't implement `Clone` (its `Database` variant wraps a
/// non-`Clone` `sqlx::Error` by way of `eld_db::DbError`); batch callers
/// that need to report the same root cause against every sibling instead
/// rebuild an equivalent error from its display text.
fn clone_ingest_error(err: &IngestError) -> IngestError {
    IngestError::IngestionExhausted(err.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn record_origin_code_roundtrips() {
        assert_eq!(record_origin_code(RecordOrigin::Driver), 2);
    }
}
