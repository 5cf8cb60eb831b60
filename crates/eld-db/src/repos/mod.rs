mod dlq;
mod event;
mod idempotency;
mod log_period;
mod reference;
mod vault;

pub use dlq::DlqRepo;
pub use event::{ChainHead, EventRepo, NewDbEvent};
pub use idempotency::IdempotencyRepo;
pub use log_period::LogPeriodRepo;
pub use reference::ReferenceRepo;
pub use vault::VaultRepo;
