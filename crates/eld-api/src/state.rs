//! Application state shared across handlers behind an `Arc`-wrapped
//! facade.

use std::sync::Arc;

use eld_core::dlq::DlqService;
use eld_core::idempotency::IdempotencyGate;
use eld_core::{IngestConfig, IngestPipeline};
use eld_db::Database;

#[derive(Clone)]
pub struct AppState {
    pub db: Arc<Database>,
    pub pipeline: Arc<IngestPipeline>,
    pub idempotency: Arc<IdempotencyGate>,
    pub dlq: Arc<DlqService>,
    pub config: Arc<IngestConfig>,
}

impl AppState {
    pub fn new(db: Arc<Database>, config: IngestConfig) -> Self {
        let pipeline = IngestPipeline::new(&db, config.clone());
        let idempotency = IdempotencyGate::new(db.cache(), db.idempotency(), config.idempotency.clone());
        let dlq = DlqService::new(db.dlq(), config.dlq.clone());
        Self {
            db,
            pipeline: Arc::new(pipeline),
            idempotency: Arc::new(idempotency),
            dlq: Arc::new(dlq),
            config: Arc::new(config),
        }
    }
}
