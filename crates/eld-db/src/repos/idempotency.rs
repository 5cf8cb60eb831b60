//! Durable idempotency record store. This backs the replay-after-TTL path;
//! the hot path for the SETNX protocol itself lives in `crate::cache`. The
//! two are kept in sync by `eld-core`'s idempotency gate: the cache is the
//! fast path, this table is the record of truth an operator can audit.

use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use crate::error::DbResult;
use crate::models::DbIdempotencyRecord;

pub struct IdempotencyRepo {
    pool: PgPool,
}

impl IdempotencyRepo {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn upsert_in_flight(
        &self,
        actor_id: Uuid,
        idempotency_key: &str,
        expires_at: DateTime<Utc>,
    ) -> DbResult<DbIdempotencyRecord> {
        let row = sqlx::query_as::<_, DbIdempotencyRecord>(
            r#"
            INSERT INTO idempotency_records (actor_id, idempotency_key, status, created_at, expires_at)
            VALUES ($1, $2, 'in_flight', NOW(), $3)
            ON CONFLICT (actor_id, idempotency_key) DO UPDATE
                SET status = 'in_flight', created_at = NOW(), expires_at = $3,
                    response_status = NULL, response_body = NULL
            RETURNING *
            "#,
        )
        .bind(actor_id)
        .bind(idempotency_key)
        .bind(expires_at)
        .fetch_one(&self.pool)
        .await?;
        Ok(row)
    }

    pub async fn complete(
        &self,
        actor_id: Uuid,
        idempotency_key: &str,
        response_status: i32,
        response_body: serde_json::Value,
        expires_at: DateTime<Utc>,
    ) -> DbResult<()> {
        sqlx::query(
            r#"
            UPDATE idempotency_records
            SET status = 'completed', response_status = $3, response_body = $4, expires_at = $5
            WHERE actor_id = $1 AND idempotency_key = $2
            "#,
        )
        .bind(actor_id)
        .bind(idempotency_key)
        .bind(response_status)
        .bind(response_body)
        .bind(expires_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn find(&self, actor_id: Uuid, idempotency_key: &str) -> DbResult<Option<DbIdempotencyRecord>> {
        let row = sqlx::query_as::<_, DbIdempotencyRecord>(
            "SELECT * FROM idempotency_records WHERE actor_id = $1 AND idempotency_key = $2",
        )
        .bind(actor_id)
        .bind(idempotency_key)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row)
    }

    pub async fn delete(&self, actor_id: Uuid, idempotency_key: &str) -> DbResult<()> {
        sqlx::query("DELETE FROM idempotency_records WHERE actor_id = $1 AND idempotency_key = $2")
            .bind(actor_id)
            .bind(idempotency_key)
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}
