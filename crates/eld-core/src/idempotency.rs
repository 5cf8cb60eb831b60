//! Idempotency Gate: a claim/replay/conflict protocol exposed as a stage
//! the pipeline calls directly (HTTP routing is out of scope here; the
//! header handling lives in `eld-api`).

use eld_db::repos::IdempotencyRepo;
use eld_db::{CacheManager, ClaimOutcome};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::config::IdempotencyConfig;
use crate::error::IngestError;

#[derive(Debug, Clone, Serialize, Deserialize)]
struct CachedRecord {
    status: String,
    response_status: Option<u16>,
    response_body: Option<serde_json::Value>,
}

/// Outcome of presenting an idempotency key to the gate.
pub enum GateOutcome {
    /// No conflicting record; the caller may run the handler. `token`
    /// must be passed to `complete` or `abort` afterward.
    Proceed { token: IdempotencyToken },
    /// A prior request with this key already completed; replay its
    /// response verbatim.
    Replay { status: u16, body: serde_json::Value },
    /// Another request with this key is currently in flight.
    Conflict,
}

/// Handle identifying the claimed key, to be resolved exactly once.
pub struct IdempotencyToken {
    scoped_key: String,
    actor_id: Uuid,
    idempotency_key: String,
}

pub struct IdempotencyGate {
    cache: CacheManager,
    repo: IdempotencyRepo,
    config: IdempotencyConfig,
}

fn scope_key(actor_id: Uuid, idempotency_key: &str) -> String {
    format!("idem:{actor_id}:{idempotency_key}")
}

impl IdempotencyGate {
    pub fn new(cache: CacheManager, repo: IdempotencyRepo, config: IdempotencyConfig) -> Self {
        Self { cache, repo, config }
    }

    /// Claim the scoped key, or return the cached replay/conflict outcome.
    pub async fn begin(&self, actor_id: Uuid, idempotency_key: &str) -> Result<GateOutcome, IngestError> {
        let scoped_key = scope_key(actor_id, idempotency_key);

        if let Some(raw) = self.cache.get(&scoped_key).await.map_err(IngestError::from)? {
            let cached: CachedRecord = serde_json::from_str(&raw)
                .map_err(|e| IngestError::Database(eld_db::DbError::Serialization(e.to_string())))?;
            return Ok(match cached.status.as_str() {
                "completed" => GateOutcome::Replay {
                    status: cached.response_status.unwrap_or(200),
                    body: cached.response_body.unwrap_or(serde_json::Value::Null),
                },
                _ => GateOutcome::Conflict,
            });
        }

        let claim_value = serde_json::to_string(&CachedRecord {
            status: "in_flight".to_string(),
            response_status: None,
            response_body: None,
        })
        .expect("serializing a fixed-shape record never fails");

        let outcome = self
            .cache
            .claim(&scoped_key, &claim_value, self.config.in_flight_ttl())
            .await
            .map_err(IngestError::from)?;

        match outcome {
            ClaimOutcome::AlreadyHeld => Ok(GateOutcome::Conflict),
            ClaimOutcome::Claimed => {
                let expires_at = chrono::Utc::now()
                    + chrono::Duration::seconds(self.config.in_flight_ttl_secs as i64);
                self.repo
                    .upsert_in_flight(actor_id, idempotency_key, expires_at)
                    .await
                    .map_err(IngestError::from)?;
                Ok(GateOutcome::Proceed {
                    token: IdempotencyToken {
                        scoped_key,
                        actor_id,
                        idempotency_key: idempotency_key.to_string(),
                    },
                })
            }
        }
    }

    /// Step 5: overwrite with `completed`, the final response, and the
    /// full TTL.
    pub async fn complete(
        &self,
        token: IdempotencyToken,
        status: u16,
        body: serde_json::Value,
    ) -> Result<(), IngestError> {
        let record = CachedRecord {
            status: "completed".to_string(),
            response_status: Some(status),
            response_body: Some(body.clone()),
        };
        let serialized = serde_json::to_string(&record)
            .map_err(|e| IngestError::Database(eld_db::DbError::Serialization(e.to_string())))?;
        self.cache
            .set(&token.scoped_key, &serialized, self.config.completed_ttl())
            .await
            .map_err(IngestError::from)?;

        let expires_at = chrono::Utc::now() + chrono::Duration::seconds(self.config.completed_ttl_secs as i64);
        self.repo
            .complete(token.actor_id, &token.idempotency_key, status as i32, body, expires_at)
            .await
            .map_err(IngestError::from)?;
        Ok(())
    }

    /// Step 6: clear the in-flight record so the client may retry with the
    /// same key.
    pub async fn abort(&self, token: IdempotencyToken) -> Result<(), IngestError> {
        self.cache.delete(&token.scoped_key).await.map_err(IngestError::from)?;
        self.repo
            .delete(token.actor_id, &token.idempotency_key)
            .await
            .map_err(IngestError::from)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scope_key_includes_actor_and_client_key() {
        let actor = Uuid::new_v4();
        let key = scope_key(actor, "client-key-1");
        assert_eq!(key, format!("idem:{actor}:client-key-1"));
    }

    #[test]
    fn scope_key_differs_across_actors() {
        let key_a = scope_key(Uuid::new_v4(), "same-key");
        let key_b = scope_key(Uuid::new_v4(), "same-key");
        assert_ne!(key_a, key_b);
    }
}
