//! Pipeline configuration: every ingestion-tunable setting, each with an
//! explicit default.

use serde::{Deserialize, Serialize};
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CrossReferenceMode {
    /// A transient lookup failure does not reject the event. Default —
    /// favors availability.
    FailOpen,
    /// A transient lookup failure rejects the event with a database error
    /// rather than risk admitting an event referencing an entity that
    /// turns out not to exist.
    Strict,
}

impl Default for CrossReferenceMode {
    fn default() -> Self {
        Self::FailOpen
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IdempotencyConfig {
    pub completed_ttl_secs: u64,
    pub in_flight_ttl_secs: u64,
}

impl Default for IdempotencyConfig {
    fn default() -> Self {
        Self {
            completed_ttl_secs: 24 * 60 * 60,
            in_flight_ttl_secs: 60,
        }
    }
}

impl IdempotencyConfig {
    pub fn completed_ttl(&self) -> Duration {
        Duration::from_secs(self.completed_ttl_secs)
    }

    pub fn in_flight_ttl(&self) -> Duration {
        Duration::from_secs(self.in_flight_ttl_secs)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DlqConfig {
    pub pending_alert_threshold: i64,
}

impl Default for DlqConfig {
    fn default() -> Self {
        Self {
            pending_alert_threshold: 100,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryConfig {
    pub max_attempts: u32,
    pub base_delay_ms: u64,
    pub max_delay_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            base_delay_ms: 1_000,
            max_delay_ms: 30_000,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ValidatorConfig {
    pub cross_reference_mode: CrossReferenceMode,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct IngestConfig {
    pub idempotency: IdempotencyConfig,
    pub dlq: DlqConfig,
    pub retry: RetryConfig,
    pub validator: ValidatorConfig,
}
