//! Append-only event store. The chain-head read and the insert are kept
//! as separate transaction-scoped functions so `eld-core`'s chain
//! appender can hold the advisory lock across both without the repo
//! knowing about hashing.

use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use sqlx::{PgPool, Postgres, Transaction};
use uuid::Uuid;

use crate::error::{DbError, DbResult};
use crate::models::DbEvent;

/// Fields needed to append one active event. `content_hash`, `chain_hash`,
/// and `previous_chain_hash` are computed by the caller (the chain
/// appender), not by this repo — the repo only persists them.
#[derive(Debug, Clone)]
pub struct NewDbEvent {
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
}

/// The tip of the hash chain for a scope, or the genesis marker when the
/// scope has no active events yet.
#[derive(Debug, Clone)]
pub struct ChainHead {
    pub chain_hash: String,
}

pub struct EventRepo {
    pool: PgPool,
}

impl EventRepo {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    pub async fn begin(&self) -> DbResult<Transaction<'_, Postgres>> {
        Ok(self.pool.begin().await?)
    }

    /// Acquire a transaction-scoped advisory lock on `(device, log_period)`.
    /// Released automatically on commit or rollback. This is the chain
    /// appender's serialization point.
    pub async fn lock_scope(
        tx: &mut Transaction<'_, Postgres>,
        device_id: Uuid,
        log_period_id: Uuid,
    ) -> DbResult<()> {
        let key = scope_lock_key(device_id, log_period_id);
        sqlx::query("SELECT pg_advisory_xact_lock($1)")
            .bind(key)
            .execute(&mut **tx)
            .await?;
        Ok(())
    }

    /// Read the chain hash of the most recent active event in scope, inside
    /// the already-locked transaction. `None` means the scope is empty and
    /// the caller must use the genesis value.
    pub async fn chain_head(
        tx: &mut Transaction<'_, Postgres>,
        device_id: Uuid,
        log_period_id: Uuid,
    ) -> DbResult<Option<ChainHead>> {
        let row: Option<(String,)> = sqlx::query_as(
            r#"
            SELECT chain_hash FROM events
            WHERE device_id = $1 AND log_period_id = $2 AND record_status = 1
            ORDER BY sequence_id DESC
            LIMIT 1
            "#,
        )
        .bind(device_id)
        .bind(log_period_id)
        .fetch_optional(&mut **tx)
        .await?;
        Ok(row.map(|(chain_hash,)| ChainHead { chain_hash }))
    }

    /// Read the current maximum sequence id for a scope inside the
    /// already-locked transaction. Must only be called after
    /// `lock_scope` — reading this on the pool instead would race with
    /// another request's concurrent insert into the same scope.
    pub async fn max_sequence_tx(
        tx: &mut Transaction<'_, Postgres>,
        device_id: Uuid,
        log_period_id: Uuid,
    ) -> DbResult<Option<i32>> {
        let row: (Option<i32>,) = sqlx::query_as(
            r#"
            SELECT MAX(sequence_id) FROM events
            WHERE device_id = $1 AND log_period_id = $2 AND record_status = 1
            "#,
        )
        .bind(device_id)
        .bind(log_period_id)
        .fetch_one(&mut **tx)
        .await?;
        Ok(row.0)
    }

    /// Check whether a client-supplied sequence id is already active in a
    /// scope, inside the already-locked transaction. Same race rationale
    /// as `max_sequence_tx`.
    pub async fn sequence_in_use_tx(
        tx: &mut Transaction<'_, Postgres>,
        device_id: Uuid,
        log_period_id: Uuid,
        sequence_id: i32,
    ) -> DbResult<bool> {
        let row: (bool,) = sqlx::query_as(
            r#"
            SELECT EXISTS(
                SELECT 1 FROM events
                WHERE device_id = $1 AND log_period_id = $2
                    AND sequence_id = $3 AND record_status = 1
            )
            "#,
        )
        .bind(device_id)
        .bind(log_period_id)
        .bind(sequence_id)
        .fetch_one(&mut **tx)
        .await?;
        Ok(row.0)
    }

    /// Insert the new active row inside the locked transaction.
    pub async fn insert_active(
        tx: &mut Transaction<'_, Postgres>,
        new_event: NewDbEvent,
    ) -> DbResult<DbEvent> {
        let row: DbEvent = sqlx::query_as(
            r#"
            INSERT INTO events (
                id, carrier_id, driver_id, vehicle_id, device_id, log_period_id,
                sequence_id, event_type, event_sub_type, record_status, record_origin,
                event_date, event_time, tz_offset_minutes, event_timestamp,
                odometer_tenths, engine_hours_tenths, latitude, longitude,
                location_description, malfunction_indicator, diagnostic_indicator,
                content_hash, chain_hash, previous_chain_hash, version,
                superseded_event_id, original_event_id, created_at
            ) VALUES (
                gen_random_uuid(), $1, $2, $3, $4, $5,
                $6, $7, $8, $9, $10,
                $11, $12, $13, $14,
                $15, $16, $17, $18,
                $19, $20, $21,
                $22, $23, $24, $25,
                $26, $27, NOW()
            )
            RETURNING *
            "#,
        )
        .bind(new_event.carrier_id)
        .bind(new_event.driver_id)
        .bind(new_event.vehicle_id)
        .bind(new_event.device_id)
        .bind(new_event.log_period_id)
        .bind(new_event.sequence_id)
        .bind(new_event.event_type)
        .bind(new_event.event_sub_type)
        .bind(new_event.record_status)
        .bind(new_event.record_origin)
        .bind(new_event.event_date)
        .bind(new_event.event_time)
        .bind(new_event.tz_offset_minutes)
        .bind(new_event.event_timestamp)
        .bind(new_event.odometer_tenths)
        .bind(new_event.engine_hours_tenths)
        .bind(new_event.latitude)
        .bind(new_event.longitude)
        .bind(new_event.location_description)
        .bind(new_event.malfunction_indicator)
        .bind(new_event.diagnostic_indicator)
        .bind(new_event.content_hash)
        .bind(new_event.chain_hash)
        .bind(new_event.previous_chain_hash)
        .bind(new_event.version)
        .bind(new_event.superseded_event_id)
        .bind(new_event.original_event_id)
        .fetch_one(&mut **tx)
        .await
        .map_err(|e| match &e {
            sqlx::Error::Database(db_err) if db_err.code().as_deref() == Some("23505") => {
                DbError::Duplicate(format!("sequence already active in scope: {db_err}"))
            }
            _ => DbError::from(e),
        })?;
        Ok(row)
    }

    pub async fn find_by_id(&self, id: Uuid) -> DbResult<DbEvent> {
        sqlx::query_as::<_, DbEvent>("SELECT * FROM events WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| DbError::NotFound(format!("event {id}")))
    }

    pub async fn list_by_scope(&self, device_id: Uuid, log_period_id: Uuid) -> DbResult<Vec<DbEvent>> {
        let rows = sqlx::query_as::<_, DbEvent>(
            r#"
            SELECT * FROM events
            WHERE device_id = $1 AND log_period_id = $2 AND record_status = 1
            ORDER BY sequence_id ASC
            "#,
        )
        .bind(device_id)
        .bind(log_period_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    /// Sorted list of missing sequence IDs in `[1, max(used)]` for a scope.
    pub async fn find_gaps(&self, device_id: Uuid, log_period_id: Uuid) -> DbResult<Vec<i32>> {
        let used: Vec<(i32,)> = sqlx::query_as(
            r#"
            SELECT sequence_id FROM events
            WHERE device_id = $1 AND log_period_id = $2 AND record_status = 1
            ORDER BY sequence_id ASC
            "#,
        )
        .bind(device_id)
        .bind(log_period_id)
        .fetch_all(&self.pool)
        .await?;
        if used.is_empty() {
            return Ok(Vec::new());
        }
        let max = used.last().unwrap().0;
        let used: std::collections::HashSet<i32> = used.into_iter().map(|(s,)| s).collect();
        Ok((1..=max).filter(|s| !used.contains(s)).collect())
    }
}

/// Deterministic 64-bit key for `pg_advisory_xact_lock`, derived from the
/// scope tuple so unrelated scopes never collide on the lock namespace.
fn scope_lock_key(device_id: Uuid, log_period_id: Uuid) -> i64 {
    use std::hash::{Hash, Hasher};
    let mut hasher = std::collections::hash_map::DefaultHasher::new();
    device_id.hash(&mut hasher);
    log_period_id.hash(&mut hasher);
    hasher.finish() as i64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scope_lock_key_is_deterministic_and_scope_specific() {
        let device = Uuid::new_v4();
        let period_a = Uuid::new_v4();
        let period_b = Uuid::new_v4();
        assert_eq!(scope_lock_key(device, period_a), scope_lock_key(device, period_a));
        assert_ne!(scope_lock_key(device, period_a), scope_lock_key(device, period_b));
    }
}
