//! Raw vault repository: insert plus status-transition pattern. Writes
//! are append-only except for the four status-transition columns,
//! enforced at the schema layer by a trigger (`migrations/0001_init.sql`).

use sqlx::PgPool;
use uuid::Uuid;

use crate::error::{DbError, DbResult};
use crate::models::DbVaultRecord;

#[derive(Clone)]
pub struct VaultRepo {
    pool: PgPool,
}

impl VaultRepo {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn insert(
        &self,
        raw_payload: serde_json::Value,
        source_device_id: Option<Uuid>,
        actor_id: Uuid,
        ip_address: Option<String>,
        user_agent: Option<String>,
        batch_id: Option<Uuid>,
        batch_index: Option<i32>,
    ) -> DbResult<DbVaultRecord> {
        let row = sqlx::query_as::<_, DbVaultRecord>(
            r#"
            INSERT INTO vault_records (
                id, raw_payload, received_at, source_device_id, actor_id,
                ip_address, user_agent, batch_id, batch_index, status
            ) VALUES (
                gen_random_uuid(), $1, NOW(), $2, $3, $4, $5, $6, $7, 'received'
            )
            RETURNING *
            "#,
        )
        .bind(raw_payload)
        .bind(source_device_id)
        .bind(actor_id)
        .bind(ip_address)
        .bind(user_agent)
        .bind(batch_id)
        .bind(batch_index)
        .fetch_one(&self.pool)
        .await?;
        Ok(row)
    }

    /// Batch insert in a single round-trip.
    pub async fn insert_batch(
        &self,
        batch_id: Uuid,
        actor_id: Uuid,
        source_device_id: Option<Uuid>,
        payloads: Vec<serde_json::Value>,
    ) -> DbResult<Vec<DbVaultRecord>> {
        let mut tx = self.pool.begin().await?;
        let mut rows = Vec::with_capacity(payloads.len());
        for (index, payload) in payloads.into_iter().enumerate() {
            let row = sqlx::query_as::<_, DbVaultRecord>(
                r#"
                INSERT INTO vault_records (
                    id, raw_payload, received_at, source_device_id, actor_id,
                    batch_id, batch_index, status
                ) VALUES (
                    gen_random_uuid(), $1, NOW(), $2, $3, $4, $5, 'received'
                )
                RETURNING *
                "#,
            )
            .bind(payload)
            .bind(source_device_id)
            .bind(actor_id)
            .bind(batch_id)
            .bind(index as i32)
            .fetch_one(&mut *tx)
            .await?;
            rows.push(row);
        }
        tx.commit().await?;
        Ok(rows)
    }

    /// Fire-and-forget status transition. Failures here are logged by the
    /// caller, never surfaced to the HTTP response.
    pub async fn mark_processed(&self, id: Uuid, event_id: Uuid) -> DbResult<()> {
        self.transition(id, "processed", Some(event_id), None).await
    }

    pub async fn mark_rejected(&self, id: Uuid, error_message: &str) -> DbResult<()> {
        self.transition(id, "rejected", None, Some(error_message)).await
    }

    pub async fn mark_failed(&self, id: Uuid, error_message: &str) -> DbResult<()> {
        self.transition(id, "failed", None, Some(error_message)).await
    }

    async fn transition(
        &self,
        id: Uuid,
        status: &str,
        event_id: Option<Uuid>,
        error_message: Option<&str>,
    ) -> DbResult<()> {
        let result = sqlx::query(
            r#"
            UPDATE vault_records
            SET status = $2, event_id = COALESCE($3, event_id), error_message = COALESCE($4, error_message)
            WHERE id = $1
            "#,
        )
        .bind(id)
        .bind(status)
        .bind(event_id)
        .bind(error_message)
        .execute(&self.pool)
        .await?;
        if result.rows_affected() == 0 {
            return Err(DbError::NotFound(format!("vault record {id}")));
        }
        Ok(())
    }

    pub async fn find_by_id(&self, id: Uuid) -> DbResult<DbVaultRecord> {
        sqlx::query_as::<_, DbVaultRecord>("SELECT * FROM vault_records WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| DbError::NotFound(format!("vault record {id}")))
    }
}
