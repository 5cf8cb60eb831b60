//! Canonical domain types shared across the ingestion core: identity
//! newtypes, event classification, lifecycle status enums, and the
//! error-kind vocabulary used to build each crate's own leaf error enum.

pub mod error;
pub mod event;
pub mod ids;
pub mod status;

pub use error::{ErrorKind, FieldError};
pub use event::{
    EventType, InvalidEventType, InvalidRecordOrigin, InvalidRecordStatus, RecordOrigin,
    RecordStatus, SequenceId, SequenceIdOutOfRange,
};
pub use ids::{
    ActorId, CarrierId, DeviceId, DlqEntryId, DriverId, EventId, LogPeriodId, VaultRecordId,
    VehicleId,
};
pub use status::{DlqStatus, IdempotencyStatus, LogPeriodStatus, VaultStatus};
