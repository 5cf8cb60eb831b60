//! Pipeline-level error taxonomy: `eld_db::DbError` is the leaf, this is
//! the pipeline's own vocabulary, and `eld-api::ApiError` maps it onto
//! HTTP at the outermost layer.

use eld_types::{ErrorKind, FieldError};

#[derive(Debug, thiserror::Error)]
pub enum IngestError {
    #[error("validation failed")]
    Validation(Vec<FieldError>),

    #[error("idempotency conflict: a request with this key is already in flight")]
    IdempotencyConflict,

    #[error("not found: {0}")]
    NotFound(String),

    #[error("database error: {0}")]
    Database(#[from] eld_db::DbError),

    #[error("chain integrity error: {0}")]
    Integrity(String),

    #[error("ingestion failed after retries: {0}")]
    IngestionExhausted(String),
}

impl IngestError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Validation(_) => ErrorKind::Validation,
            Self::IdempotencyConflict => ErrorKind::IdempotencyConflict,
            Self::NotFound(_) => ErrorKind::NotFound,
            Self::Database(e) => e.kind(),
            Self::Integrity(_) => ErrorKind::Integrity,
            Self::IngestionExhausted(_) => ErrorKind::Database,
        }
    }

    /// Whether this failure originated from ingestion (and so belongs in
    /// the DLQ) rather than from validation (a client error that will not
    /// succeed on retry). Only ingestion failures enter the DLQ; validation
    /// failures do not. A `Database` error is only an ingestion failure if
    /// the wrapped `DbError` actually reflects a store-side failure —
    /// `Duplicate`/`Constraint`/`InvalidInput` are client-shaped rejections
    /// that happen to be detected by the database and must follow the same
    /// path as any other validation failure.
    pub fn is_ingestion_failure(&self) -> bool {
        match self {
            Self::Database(db_err) => !matches!(
                db_err,
                eld_db::DbError::Duplicate(_) | eld_db::DbError::Constraint(_) | eld_db::DbError::InvalidInput(_)
            ),
            Self::Integrity(_) | Self::IngestionExhausted(_) => true,
            Self::Validation(_) | Self::IdempotencyConflict | Self::NotFound(_) => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn duplicate_sequence_is_not_an_ingestion_failure() {
        let err = IngestError::Database(eld_db::DbError::Duplicate("sequence already active".to_string()));
        assert_eq!(err.kind(), ErrorKind::Validation);
        assert!(!err.is_ingestion_failure());
    }

    #[test]
    fn connection_error_is_an_ingestion_failure() {
        let err = IngestError::Database(eld_db::DbError::Connection("refused".to_string()));
        assert!(err.is_ingestion_failure());
    }
}
