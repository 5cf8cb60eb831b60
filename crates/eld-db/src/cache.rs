//! Idempotency cache: Redis-backed with an in-process bounded fallback,
//! using the SETNX-style protocol the idempotency gate needs.

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use deadpool_redis::{redis::AsyncCommands, Config as RedisConfig, Pool as RedisPool, Runtime};

use crate::error::{DbError, DbResult};

/// Entries beyond this count are evicted in insertion order. Bounds memory
/// when the fallback map is the only backing store (single-replica / Redis
/// outage).
const FALLBACK_CAPACITY: usize = 2000;

struct FallbackEntry {
    value: String,
    expires_at: Instant,
}

/// Process-local bounded cache used when Redis is unavailable or
/// disabled. Not shared across replicas.
struct FallbackMap {
    entries: HashMap<String, FallbackEntry>,
    order: VecDeque<String>,
}

impl FallbackMap {
    fn new() -> Self {
        Self {
            entries: HashMap::new(),
            order: VecDeque::new(),
        }
    }

    fn evict_expired(&mut self) {
        let now = Instant::now();
        self.entries.retain(|_, v| v.expires_at > now);
    }

    fn get(&mut self, key: &str) -> Option<String> {
        self.evict_expired();
        self.entries.get(key).map(|e| e.value.clone())
    }

    fn set_nx(&mut self, key: &str, value: &str, ttl: Duration) -> bool {
        self.evict_expired();
        if self.entries.contains_key(key) {
            return false;
        }
        self.insert(key, value, ttl);
        true
    }

    fn set(&mut self, key: &str, value: &str, ttl: Duration) {
        self.evict_expired();
        self.insert(key, value, ttl);
    }

    fn insert(&mut self, key: &str, value: &str, ttl: Duration) {
        if !self.entries.contains_key(key) {
            self.order.push_back(key.to_string());
            while self.order.len() > FALLBACK_CAPACITY {
                if let Some(oldest) = self.order.pop_front() {
                    self.entries.remove(&oldest);
                }
            }
        }
        self.entries.insert(
            key.to_string(),
            FallbackEntry {
                value: value.to_string(),
                expires_at: Instant::now() + ttl,
            },
        );
    }

    fn delete(&mut self, key: &str) {
        self.entries.remove(key);
    }
}

/// Outcome of attempting to atomically claim a key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClaimOutcome {
    /// This call claimed the key; caller proceeds.
    Claimed,
    /// Another holder already owns the key.
    AlreadyHeld,
}

/// Cheap to clone: the Redis pool is itself a handle, and the fallback map
/// is shared behind an `Arc`. One instance is built at startup and handed
/// out by value the way `Database`'s repo accessors hand out pool handles.
#[derive(Clone)]
pub struct CacheManager {
    redis: Option<RedisPool>,
    fallback: Arc<Mutex<FallbackMap>>,
}

impl CacheManager {
    /// Connect to Redis if `redis_url` is `Some` and enabled; otherwise the
    /// manager runs entirely on the in-process fallback.
    pub fn connect(redis_url: &str, enabled: bool) -> DbResult<Self> {
        let redis = if enabled {
            let cfg = RedisConfig::from_url(redis_url);
            let pool = cfg
                .create_pool(Some(Runtime::Tokio1))
                .map_err(|e| DbError::Connection(e.to_string()))?;
            Some(pool)
        } else {
            None
        };
        Ok(Self {
            redis,
            fallback: Arc::new(Mutex::new(FallbackMap::new())),
        })
    }

    pub fn fallback_only() -> Self {
        Self {
            redis: None,
            fallback: Arc::new(Mutex::new(FallbackMap::new())),
        }
    }

    /// Read a value, falling back to the in-process map on any Redis error.
    pub async fn get(&self, key: &str) -> DbResult<Option<String>> {
        if let Some(pool) = &self.redis {
            match self.redis_get(pool, key).await {
                Ok(value) => return Ok(value),
                Err(err) => {
                    tracing::warn!(error = %err, key, "redis get failed, falling back to in-process cache");
                }
            }
        }
        Ok(self.fallback.lock().expect("fallback mutex poisoned").get(key))
    }

    /// SETNX semantics: claim `key` with `value` and `ttl` only if absent.
    pub async fn claim(&self, key: &str, value: &str, ttl: Duration) -> DbResult<ClaimOutcome> {
        if let Some(pool) = &self.redis {
            match self.redis_set_nx(pool, key, value, ttl).await {
                Ok(claimed) => {
                    return Ok(if claimed {
                        ClaimOutcome::Claimed
                    } else {
                        ClaimOutcome::AlreadyHeld
                    })
                }
                Err(err) => {
                    tracing::warn!(error = %err, key, "redis setnx failed, falling back to in-process cache");
                }
            }
        }
        let claimed = self
            .fallback
            .lock()
            .expect("fallback mutex poisoned")
            .set_nx(key, value, ttl);
        Ok(if claimed {
            ClaimOutcome::Claimed
        } else {
            ClaimOutcome::AlreadyHeld
        })
    }

    /// Unconditional overwrite, used to promote an in-flight record to
    /// completed.
    pub async fn set(&self, key: &str, value: &str, ttl: Duration) -> DbResult<()> {
        if let Some(pool) = &self.redis {
            if let Err(err) = self.redis_set(pool, key, value, ttl).await {
                tracing::warn!(error = %err, key, "redis set failed, falling back to in-process cache");
            } else {
                return Ok(());
            }
        }
        self.fallback
            .lock()
            .expect("fallback mutex poisoned")
            .set(key, value, ttl);
        Ok(())
    }

    /// Release a claimed key, used when the handler errors so the caller
    /// may retry with the same idempotency key.
    pub async fn delete(&self, key: &str) -> DbResult<()> {
        if let Some(pool) = &self.redis {
            if let Ok(mut conn) = pool.get().await {
                let _: Result<(), _> = conn.del(key).await;
            }
        }
        self.fallback.lock().expect("fallback mutex poisoned").delete(key);
        Ok(())
    }

    async fn redis_get(&self, pool: &RedisPool, key: &str) -> DbResult<Option<String>> {
        let mut conn = pool.get().await?;
        let value: Option<String> = conn.get(key).await?;
        Ok(value)
    }

    async fn redis_set_nx(&self, pool: &RedisPool, key: &str, value: &str, ttl: Duration) -> DbResult<bool> {
        let mut conn = pool.get().await?;
        let claimed: bool = redis::cmd("SET")
            .arg(key)
            .arg(value)
            .arg("NX")
            .arg("EX")
            .arg(ttl.as_secs())
            .query_async::<_, Option<String>>(&mut conn)
            .await
            .map(|r| r.is_some())?;
        Ok(claimed)
    }

    async fn redis_set(&self, pool: &RedisPool, key: &str, value: &str, ttl: Duration) -> DbResult<()> {
        let mut conn = pool.get().await?;
        let _: () = conn.set_ex(key, value, ttl.as_secs()).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn fallback_claim_is_exclusive() {
        let cache = CacheManager::fallback_only();
        let outcome1 = cache.claim("idem:a:k1", "in_flight", Duration::from_secs(60)).await.unwrap();
        let outcome2 = cache.claim("idem:a:k1", "in_flight", Duration::from_secs(60)).await.unwrap();
        assert_eq!(outcome1, ClaimOutcome::Claimed);
        assert_eq!(outcome2, ClaimOutcome::AlreadyHeld);
    }

    #[tokio::test]
    async fn fallback_expires_claims() {
        let cache = CacheManager::fallback_only();
        cache
            .claim("idem:a:k2", "in_flight", Duration::from_millis(10))
            .await
            .unwrap();
        tokio::time::sleep(Duration::from_millis(30)).await;
        let outcome = cache.claim("idem:a:k2", "in_flight", Duration::from_secs(60)).await.unwrap();
        assert_eq!(outcome, ClaimOutcome::Claimed);
    }

    #[tokio::test]
    async fn fallback_set_overwrites() {
        let cache = CacheManager::fallback_only();
        cache.claim("idem:a:k3", "in_flight", Duration::from_secs(60)).await.unwrap();
        cache.set("idem:a:k3", "completed", Duration::from_secs(86_400)).await.unwrap();
        assert_eq!(cache.get("idem:a:k3").await.unwrap(), Some("completed".to_string()));
    }

    #[tokio::test]
    async fn fallback_delete_releases_claim() {
        let cache = CacheManager::fallback_only();
        cache.claim("idem:a:k4", "in_flight", Duration::from_secs(60)).await.unwrap();
        cache.delete("idem:a:k4").await.unwrap();
        let outcome = cache.claim("idem:a:k4", "in_flight", Duration::from_secs(60)).await.unwrap();
        assert_eq!(outcome, ClaimOutcome::Claimed);
    }

    #[tokio::test]
    async fn fallback_capacity_evicts_oldest() {
        let mut map = FallbackMap::new();
        for i in 0..(FALLBACK_CAPACITY + 10) {
            map.set(&format!("k{i}"), "v", Duration::from_secs(60));
        }
        assert!(map.entries.len() <= FALLBACK_CAPACITY);
        assert!(!map.entries.contains_key("k0"));
    }
}
