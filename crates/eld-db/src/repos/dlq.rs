//! Dead-letter queue repository: `add_entry`/`list_pending`/
//! `mark_resolved`/`mark_discarded`/`count_pending`, plus the filters and
//! stats the admin surface needs.

use sqlx::PgPool;
use uuid::Uuid;

use crate::error::{DbError, DbResult};
use crate::models::{DbDlqEntry, DlqStatusCounts};

#[derive(Clone)]
pub struct DlqRepo {
    pool: PgPool,
}

impl DlqRepo {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn add_entry(
        &self,
        original_payload: serde_json::Value,
        failure_reason: &str,
        source_endpoint: &str,
        source_device_id: Option<Uuid>,
        batch_index: Option<i32>,
        vault_record_id: Option<Uuid>,
    ) -> DbResult<DbDlqEntry> {
        let row = sqlx::query_as::<_, DbDlqEntry>(
            r#"
            INSERT INTO dlq_entries (
                id, original_payload, failure_reason, retry_count,
                first_failed_at, last_failed_at, status, source_endpoint,
                source_device_id, batch_index, vault_record_id
            ) VALUES (
                gen_random_uuid(), $1, $2, 0, NOW(), NOW(), 'pending', $3, $4, $5, $6
            )
            RETURNING *
            "#,
        )
        .bind(original_payload)
        .bind(failure_reason)
        .bind(source_endpoint)
        .bind(source_device_id)
        .bind(batch_index)
        .bind(vault_record_id)
        .fetch_one(&self.pool)
        .await?;
        tracing::warn!(
            dlq_id = %row.id,
            endpoint = source_endpoint,
            reason = failure_reason,
            "event routed to dead-letter queue"
        );
        metrics::counter!("eld_ingest.dlq.added").increment(1);
        Ok(row)
    }

    pub async fn get_by_id(&self, id: Uuid) -> DbResult<DbDlqEntry> {
        sqlx::query_as::<_, DbDlqEntry>("SELECT * FROM dlq_entries WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| DbError::NotFound(format!("dlq entry {id}")))
    }

    pub async fn list(
        &self,
        status: Option<&str>,
        source_device_id: Option<Uuid>,
        source_endpoint: Option<&str>,
        limit: i64,
        offset: i64,
    ) -> DbResult<Vec<DbDlqEntry>> {
        let rows = sqlx::query_as::<_, DbDlqEntry>(
            r#"
            SELECT * FROM dlq_entries
            WHERE ($1::text IS NULL OR status = $1)
                AND ($2::uuid IS NULL OR source_device_id = $2)
                AND ($3::text IS NULL OR source_endpoint = $3)
            ORDER BY first_failed_at ASC
            LIMIT $4 OFFSET $5
            "#,
        )
        .bind(status)
        .bind(source_device_id)
        .bind(source_endpoint)
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    pub async fn list_pending(&self, limit: i64) -> DbResult<Vec<DbDlqEntry>> {
        self.list(Some("pending"), None, None, limit, 0).await
    }

    /// Transition an entry to `status`, but only from `pending` — retry and
    /// discard both apply to pending entries only, so a concurrent or
    /// repeated call against an entry already `resolved`/`discarded`/
    /// `retrying` must fail instead of double-processing it.
    pub async fn set_status(&self, id: Uuid, status: &str) -> DbResult<()> {
        let result = sqlx::query("UPDATE dlq_entries SET status = $2 WHERE id = $1 AND status = 'pending'")
            .bind(id)
            .bind(status)
            .execute(&self.pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(self.not_found_or_conflict(id).await);
        }
        Ok(())
    }

    /// Reset a `retrying` entry back to `pending` after a failed retry
    /// attempt, recording the new failure context.
    pub async fn record_retry_failure(&self, id: Uuid, failure_reason: &str) -> DbResult<()> {
        let result = sqlx::query(
            r#"
            UPDATE dlq_entries
            SET status = 'pending', retry_count = retry_count + 1,
                failure_reason = $2, last_failed_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(id)
        .bind(failure_reason)
        .execute(&self.pool)
        .await?;
        if result.rows_affected() == 0 {
            return Err(DbError::NotFound(format!("dlq entry {id}")));
        }
        Ok(())
    }

    pub async fn mark_resolved(&self, id: Uuid, resolved_by: Uuid, notes: &str) -> DbResult<()> {
        let result = sqlx::query(
            r#"
            UPDATE dlq_entries
            SET status = 'resolved', resolved_by = $2, resolved_at = NOW(), resolution_notes = $3
            WHERE id = $1
            "#,
        )
        .bind(id)
        .bind(resolved_by)
        .bind(notes)
        .execute(&self.pool)
        .await?;
        if result.rows_affected() == 0 {
            return Err(DbError::NotFound(format!("dlq entry {id}")));
        }
        metrics::counter!("eld_ingest.dlq.resolved").increment(1);
        Ok(())
    }

    /// Discard a `pending` entry. Like `set_status`, guarded to `pending`
    /// so an already-resolved or already-discarded entry is rejected
    /// instead of silently re-discarded.
    pub async fn mark_discarded(&self, id: Uuid, resolved_by: Uuid, notes: Option<&str>) -> DbResult<()> {
        let result = sqlx::query(
            r#"
            UPDATE dlq_entries
            SET status = 'discarded', resolved_by = $2, resolved_at = NOW(), resolution_notes = $3
            WHERE id = $1 AND status = 'pending'
            "#,
        )
        .bind(id)
        .bind(resolved_by)
        .bind(notes)
        .execute(&self.pool)
        .await?;
        if result.rows_affected() == 0 {
            return Err(self.not_found_or_conflict(id).await);
        }
        tracing::warn!(dlq_id = %id, "dlq entry discarded");
        metrics::counter!("eld_ingest.dlq.discarded").increment(1);
        Ok(())
    }

    /// Distinguish "entry doesn't exist" from "entry exists but isn't
    /// pending" for a guarded update that affected zero rows.
    async fn not_found_or_conflict(&self, id: Uuid) -> DbError {
        match self.get_by_id(id).await {
            Ok(entry) => DbError::Conflict(format!("dlq entry {id} is not pending (status: {})", entry.status)),
            Err(_) => DbError::NotFound(format!("dlq entry {id}")),
        }
    }

    pub async fn count_pending(&self) -> DbResult<i64> {
        let row: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM dlq_entries WHERE status = 'pending'")
            .fetch_one(&self.pool)
            .await?;
        Ok(row.0)
    }

    pub async fn status_counts(&self) -> DbResult<Vec<DlqStatusCounts>> {
        let rows = sqlx::query_as::<_, DlqStatusCounts>(
            "SELECT status, COUNT(*) as count FROM dlq_entries GROUP BY status",
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }
}

