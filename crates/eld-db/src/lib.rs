//! Persistence layer for the event ingestion core: Postgres repositories
//! plus the Redis-backed idempotency cache, behind a single `Database`
//! facade.

pub mod cache;
pub mod config;
pub mod error;
pub mod models;
pub mod repos;

use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use std::time::Duration;

pub use cache::{CacheManager, ClaimOutcome};
pub use config::DatabaseConfig;
pub use error::{DbError, DbResult};

use repos::{DlqRepo, EventRepo, IdempotencyRepo, LogPeriodRepo, ReferenceRepo, VaultRepo};

/// Health of the two backing stores.
#[derive(Debug, Clone, serde::Serialize)]
pub struct HealthStatus {
    pub postgres: bool,
    pub redis: bool,
    pub healthy: bool,
}

/// Facade over the connection pools. One instance is built at startup and
/// shared (via `Arc`) across the whole service.
pub struct Database {
    pg: PgPool,
    cache: CacheManager,
}

impl Database {
    pub async fn connect(config: &DatabaseConfig) -> DbResult<Self> {
        let pg = PgPoolOptions::new()
            .max_connections(config.pg_max_connections)
            .min_connections(config.pg_min_connections)
            .acquire_timeout(Duration::from_secs(config.pg_acquire_timeout_secs))
            .connect(&config.postgres_url)
            .await
            .map_err(|e| DbError::Connection(e.to_string()))?;

        let cache = CacheManager::connect(&config.redis_url, config.redis_enabled)?;

        tracing::info!(
            postgres = %config.postgres_url_masked(),
            redis = %config.redis_url_masked(),
            redis_enabled = config.redis_enabled,
            "connected to backing stores"
        );

        Ok(Self { pg, cache })
    }

    /// Build a `Database` with no live Redis, for tests that only need the
    /// fallback cache path.
    pub fn with_pool(pg: PgPool) -> Self {
        Self {
            pg,
            cache: CacheManager::fallback_only(),
        }
    }

    pub async fn migrate(&self) -> DbResult<()> {
        sqlx::migrate!("./migrations")
            .run(&self.pg)
            .await
            .map_err(|e| DbError::Migration(e.to_string()))
    }

    pub async fn health_check(&self) -> HealthStatus {
        let postgres = sqlx::query("SELECT 1").execute(&self.pg).await.is_ok();
        let redis = self.cache.get("health:probe").await.is_ok();
        HealthStatus {
            postgres,
            redis,
            healthy: postgres,
        }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pg
    }

    pub fn cache(&self) -> CacheManager {
        self.cache.clone()
    }

    pub fn events(&self) -> EventRepo {
        EventRepo::new(self.pg.clone())
    }

    pub fn log_periods(&self) -> LogPeriodRepo {
        LogPeriodRepo::new(self.pg.clone())
    }

    pub fn idempotency(&self) -> IdempotencyRepo {
        IdempotencyRepo::new(self.pg.clone())
    }

    pub fn vault(&self) -> VaultRepo {
        VaultRepo::new(self.pg.clone())
    }

    pub fn dlq(&self) -> DlqRepo {
        DlqRepo::new(self.pg.clone())
    }

    pub fn reference(&self) -> ReferenceRepo {
        ReferenceRepo::new(self.pg.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_masking() {
        let config = DatabaseConfig {
            postgres_url: "postgres://user:pw@localhost/db".to_string(),
            redis_url: "redis://:pw@localhost:6379".to_string(),
            redis_enabled: true,
            pg_max_connections: 5,
            pg_min_connections: 1,
            pg_acquire_timeout_secs: 5,
        };
        assert!(!config.postgres_url_masked().contains("pw"));
        assert!(!config.redis_url_masked().contains("pw"));
    }
}
