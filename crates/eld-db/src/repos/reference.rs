//! Bulk existence checks backing the validator's cross-reference layer.
//! One round-trip per collection.

use sqlx::PgPool;
use std::collections::HashSet;
use uuid::Uuid;

use crate::error::DbResult;

pub struct ReferenceRepo {
    pool: PgPool,
}

impl ReferenceRepo {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn existing_driver_ids(&self, ids: &[Uuid]) -> DbResult<HashSet<Uuid>> {
        if ids.is_empty() {
            return Ok(HashSet::new());
        }
        let rows: Vec<(Uuid,)> = sqlx::query_as("SELECT id FROM drivers WHERE id = ANY($1)")
            .bind(ids)
            .fetch_all(&self.pool)
            .await?;
        Ok(rows.into_iter().map(|(id,)| id).collect())
    }

    pub async fn existing_vehicle_ids(&self, ids: &[Uuid]) -> DbResult<HashSet<Uuid>> {
        if ids.is_empty() {
            return Ok(HashSet::new());
        }
        let rows: Vec<(Uuid,)> = sqlx::query_as("SELECT id FROM vehicles WHERE id = ANY($1)")
            .bind(ids)
            .fetch_all(&self.pool)
            .await?;
        Ok(rows.into_iter().map(|(id,)| id).collect())
    }
}
