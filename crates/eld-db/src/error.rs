//! Leaf error type for the persistence layer.

use eld_types::ErrorKind;

#[derive(Debug, thiserror::Error)]
pub enum DbError {
    #[error("connection error: {0}")]
    Connection(String),

    #[error("migration error: {0}")]
    Migration(String),

    #[error("query error: {0}")]
    Query(#[from] sqlx::Error),

    #[error("cache error: {0}")]
    Cache(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("conflict: {0}")]
    Conflict(String),

    #[error("duplicate: {0}")]
    Duplicate(String),

    #[error("constraint violation: {0}")]
    Constraint(String),

    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("serialization error: {0}")]
    Serialization(String),

    #[error("transaction error: {0}")]
    Transaction(String),

    #[error("integrity error: {0}")]
    Integrity(String),
}

impl DbError {
    /// Whether this error is worth retrying through the retry wrapper.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Connection(_) | Self::Transaction(_) => true,
            Self::Query(e) => is_transient_sqlx_error(e),
            _ => false,
        }
    }

    /// The stable error kind this maps onto for the API layer.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::NotFound(_) => ErrorKind::NotFound,
            Self::Conflict(_) => ErrorKind::Conflict,
            Self::Duplicate(_) | Self::Constraint(_) => ErrorKind::Validation,
            Self::InvalidInput(_) => ErrorKind::Validation,
            Self::Integrity(_) => ErrorKind::Integrity,
            _ => ErrorKind::Database,
        }
    }
}

fn is_transient_sqlx_error(err: &sqlx::Error) -> bool {
    match err {
        sqlx::Error::PoolTimedOut | sqlx::Error::Io(_) => true,
        sqlx::Error::Database(db_err) => {
            // Postgres SQLSTATE classes: 40001 serialization_failure,
            // 40P01 deadlock_detected, 08xxx connection exceptions,
            // 53300 too_many_connections.
            match db_err.code().as_deref() {
                Some(code) => {
                    code == "40001"
                        || code == "40P01"
                        || code == "53300"
                        || code.starts_with("08")
                }
                None => false,
            }
        }
        _ => false,
    }
}

impl From<deadpool_redis::PoolError> for DbError {
    fn from(err: deadpool_redis::PoolError) -> Self {
        Self::Cache(err.to_string())
    }
}

impl From<redis::RedisError> for DbError {
    fn from(err: redis::RedisError) -> Self {
        Self::Cache(err.to_string())
    }
}

impl From<serde_json::Error> for DbError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}

pub type DbResult<T> = Result<T, DbError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn connection_and_transaction_errors_are_transient() {
        assert!(DbError::Connection("refused".into()).is_transient());
        assert!(DbError::Transaction("retry".into()).is_transient());
        assert!(!DbError::NotFound("event".into()).is_transient());
    }

    #[test]
    fn not_found_maps_to_not_found_kind() {
        assert_eq!(DbError::NotFound("x".into()).kind(), ErrorKind::NotFound);
        assert_eq!(DbError::Integrity("break".into()).kind(), ErrorKind::Integrity);
    }
}
