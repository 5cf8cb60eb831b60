//! Log-period (driver-day) scope repository.

use chrono::NaiveDate;
use sqlx::PgPool;
use uuid::Uuid;

use crate::error::{DbError, DbResult};
use crate::models::DbLogPeriod;

pub struct LogPeriodRepo {
    pool: PgPool,
}

impl LogPeriodRepo {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Find the log-period for `(device, driver, log_date)`, creating it on
    /// demand. Log-periods are never created any other way.
    pub async fn find_or_create(
        &self,
        device_id: Uuid,
        driver_id: Uuid,
        log_date: NaiveDate,
    ) -> DbResult<DbLogPeriod> {
        if let Some(existing) = self.find(device_id, log_date).await? {
            return Ok(existing);
        }
        let row = sqlx::query_as::<_, DbLogPeriod>(
            r#"
            INSERT INTO log_periods (id, device_id, driver_id, log_date, status, event_count, created_at)
            VALUES (gen_random_uuid(), $1, $2, $3, 'active', 0, NOW())
            ON CONFLICT (device_id, log_date) DO UPDATE SET device_id = EXCLUDED.device_id
            RETURNING *
            "#,
        )
        .bind(device_id)
        .bind(driver_id)
        .bind(log_date)
        .fetch_one(&self.pool)
        .await?;
        Ok(row)
    }

    pub async fn find(&self, device_id: Uuid, log_date: NaiveDate) -> DbResult<Option<DbLogPeriod>> {
        let row = sqlx::query_as::<_, DbLogPeriod>(
            "SELECT * FROM log_periods WHERE device_id = $1 AND log_date = $2",
        )
        .bind(device_id)
        .bind(log_date)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row)
    }

    pub async fn find_by_id(&self, id: Uuid) -> DbResult<DbLogPeriod> {
        sqlx::query_as::<_, DbLogPeriod>("SELECT * FROM log_periods WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| DbError::NotFound(format!("log period {id}")))
    }

    pub async fn increment_event_count(&self, id: Uuid) -> DbResult<()> {
        sqlx::query("UPDATE log_periods SET event_count = event_count + 1 WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    pub async fn certify(&self, id: Uuid) -> DbResult<DbLogPeriod> {
        let row = sqlx::query_as::<_, DbLogPeriod>(
            r#"
            UPDATE log_periods
            SET status = CASE WHEN status = 'certified' THEN 'recertified' ELSE 'certified' END,
                certified_at = NOW()
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| DbError::NotFound(format!("log period {id}")))?;
        Ok(row)
    }
}
