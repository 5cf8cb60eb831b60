//! Dead-letter queue service: thin orchestration over
//! `eld_db::repos::DlqRepo` that adds depth alerting and the retry/discard
//! workflow an operator drives from the admin surface.

use eld_db::models::{DbDlqEntry, DlqStatusCounts};
use eld_db::repos::DlqRepo;
use eld_types::DlqStatus;
use uuid::Uuid;

use crate::config::DlqConfig;
use crate::error::IngestError;

#[derive(Clone)]
pub struct DlqService {
    repo: DlqRepo,
    config: DlqConfig,
}

impl DlqService {
    pub fn new(repo: DlqRepo, config: DlqConfig) -> Self {
        Self { repo, config }
    }

    /// Route a failed event to the DLQ and check whether its depth has
    /// crossed the alert threshold. Only ingestion failures should ever
    /// reach this — the pipeline checks `IngestError::is_ingestion_failure`
    /// before calling it.
    pub async fn add(
        &self,
        original_payload: serde_json::Value,
        failure_reason: &str,
        source_endpoint: &str,
        source_device_id: Option<Uuid>,
        batch_index: Option<i32>,
        vault_record_id: Option<Uuid>,
    ) -> Result<DbDlqEntry, IngestError> {
        let entry = self
            .repo
            .add_entry(
                original_payload,
                failure_reason,
                source_endpoint,
                source_device_id,
                batch_index,
                vault_record_id,
            )
            .await?;

        let pending = self.repo.count_pending().await?;
        if pending >= self.config.pending_alert_threshold {
            tracing::error!(
                pending,
                threshold = self.config.pending_alert_threshold,
                "dlq pending depth at or above alert threshold"
            );
            metrics::gauge!("eld_ingest.dlq.pending_depth").set(pending as f64);
        }

        Ok(entry)
    }

    pub async fn get(&self, id: Uuid) -> Result<DbDlqEntry, IngestError> {
        Ok(self.repo.get_by_id(id).await?)
    }

    pub async fn list(
        &self,
        status: Option<DlqStatus>,
        source_device_id: Option<Uuid>,
        source_endpoint: Option<&str>,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<DbDlqEntry>, IngestError> {
        let status = status.map(|s| s.as_str());
        Ok(self
            .repo
            .list(status, source_device_id, source_endpoint, limit, offset)
            .await?)
    }

    pub async fn stats(&self) -> Result<Vec<DlqStatusCounts>, IngestError> {
        Ok(self.repo.status_counts().await?)
    }

    /// Mark an entry `retrying`, hand its payload back to the caller (the
    /// pipeline re-runs ingestion), and record the outcome. The caller owns
    /// re-running the pipeline; this only manages the DLQ entry's state.
    pub async fn begin_retry(&self, id: Uuid) -> Result<DbDlqEntry, IngestError> {
        let entry = self.repo.get_by_id(id).await?;
        self.repo.set_status(id, DlqStatus::Retrying.as_str()).await?;
        Ok(entry)
    }

    pub async fn retry_succeeded(&self, id: Uuid, resolved_by: Uuid, new_event_id: Uuid) -> Result<(), IngestError> {
        self.repo
            .mark_resolved(id, resolved_by, &format!("resolved via automatic retry, new event {new_event_id}"))
            .await?;
        Ok(())
    }

    pub async fn retry_failed(&self, id: Uuid, failure_reason: &str) -> Result<(), IngestError> {
        self.repo.record_retry_failure(id, failure_reason).await?;
        Ok(())
    }

    pub async fn discard(&self, id: Uuid, resolved_by: Uuid, notes: Option<&str>) -> Result<(), IngestError> {
        self.repo.mark_discarded(id, resolved_by, notes).await?;
        Ok(())
    }

    pub async fn pending_count(&self) -> Result<i64, IngestError> {
        Ok(self.repo.count_pending().await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_alert_threshold_is_one_hundred() {
        assert_eq!(DlqConfig::default().pending_alert_threshold, 100);
    }
}
