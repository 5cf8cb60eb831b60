//! Sequencer: allocates or verifies per-scope sequence IDs.
//!
//! Both operations must run inside the scope's already-locked transaction
//! (see `ChainAppender::append_once`) — reading the current max, or
//! checking a client-supplied candidate for a collision, on the pool and
//! ahead of the lock leaves a window where two concurrent requests to the
//! same scope compute the same sequence id before either has taken the
//! lock.

use sqlx::{Postgres, Transaction};
use uuid::Uuid;

use eld_db::repos::EventRepo;
use eld_types::{SequenceId, SequenceIdOutOfRange};

use crate::error::IngestError;

#[derive(Debug, thiserror::Error)]
pub enum SequencerError {
    #[error("{0}")]
    OutOfRange(#[from] SequenceIdOutOfRange),
    #[error("sequence {0} is already active in this scope")]
    AlreadyInUse(u32),
    #[error(transparent)]
    Database(#[from] eld_db::DbError),
}

impl From<SequencerError> for IngestError {
    fn from(err: SequencerError) -> Self {
        match err {
            SequencerError::Database(e) => IngestError::from(e),
            other => IngestError::Validation(vec![eld_types::FieldError::new(
                "sequenceId",
                "SEQUENCE_INVALID",
                other.to_string(),
            )]),
        }
    }
}

/// Stateless — every operation is tied to the caller's transaction, so
/// there is nothing to hold between calls.
pub struct Sequencer;

impl Sequencer {
    /// Allocate the next sequence number for a scope, inside the caller's
    /// already-locked transaction.
    pub async fn allocate_tx(
        tx: &mut Transaction<'_, Postgres>,
        device_id: Uuid,
        log_period_id: Uuid,
    ) -> Result<SequenceId, SequencerError> {
        let max = EventRepo::max_sequence_tx(tx, device_id, log_period_id).await?;
        let next = max.map(|m| m as u32 + 1).unwrap_or(1);
        Ok(SequenceId::new(next)?)
    }

    /// Validate a client-supplied sequence ID: range plus uniqueness within
    /// the scope, inside the caller's already-locked transaction.
    pub async fn verify_client_supplied_tx(
        tx: &mut Transaction<'_, Postgres>,
        device_id: Uuid,
        log_period_id: Uuid,
        candidate: u32,
    ) -> Result<SequenceId, SequencerError> {
        let sequence_id = SequenceId::new(candidate)?;
        if EventRepo::sequence_in_use_tx(tx, device_id, log_period_id, sequence_id.get() as i32).await? {
            return Err(SequencerError::AlreadyInUse(candidate));
        }
        Ok(sequence_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn out_of_range_maps_to_validation_error() {
        let err: IngestError = SequencerError::OutOfRange(SequenceIdOutOfRange(0)).into();
        assert_eq!(err.kind(), eld_types::ErrorKind::Validation);
    }
}
