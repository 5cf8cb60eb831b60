//! Shared error vocabulary.
//!
//! Every crate in the workspace has its own leaf error enum (`DbError` in
//! `eld-db`, `IngestError` in `eld-core`, `ActorError` in `eld-actor`,
//! `ApiError` in `eld-api`). This module defines the stable error *kinds*
//! and HTTP mapping table so all of them agree on the same vocabulary
//! instead of re-inventing status codes at each layer.

use serde::{Deserialize, Serialize};

/// The stable error kinds from the error handling design, independent of
/// which crate raised them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ErrorKind {
    Validation,
    Authentication,
    Authorization,
    NotFound,
    IdempotencyConflict,
    Conflict,
    RateLimit,
    Database,
    Integrity,
}

impl ErrorKind {
    /// The HTTP status this error kind maps to.
    pub fn http_status(self) -> u16 {
        match self {
            Self::Validation => 400,
            Self::Authentication => 401,
            Self::Authorization => 403,
            Self::NotFound => 404,
            Self::IdempotencyConflict => 409,
            Self::Conflict => 409,
            Self::RateLimit => 429,
            Self::Database => 500,
            Self::Integrity => 500,
        }
    }

    /// The stable machine-readable error code used in response bodies.
    pub fn code(self) -> &'static str {
        match self {
            Self::Validation => "VALIDATION_ERROR",
            Self::Authentication => "AUTHENTICATION_ERROR",
            Self::Authorization => "AUTHORIZATION_ERROR",
            Self::NotFound => "NOT_FOUND",
            Self::IdempotencyConflict => "IDEMPOTENCY_CONFLICT",
            Self::Conflict => "CONFLICT",
            Self::RateLimit => "RATE_LIMIT_ERROR",
            Self::Database => "DATABASE_ERROR",
            Self::Integrity => "INTEGRITY_ERROR",
        }
    }
}

/// A single field-level validation error, as produced by any validator
/// layer and carried unchanged into the API response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldError {
    pub field: String,
    pub code: String,
    pub message: String,
}

impl FieldError {
    pub fn new(field: impl Into<String>, code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            code: code.into(),
            message: message.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn http_status_mapping_matches_design_table() {
        assert_eq!(ErrorKind::Validation.http_status(), 400);
        assert_eq!(ErrorKind::Authentication.http_status(), 401);
        assert_eq!(ErrorKind::Authorization.http_status(), 403);
        assert_eq!(ErrorKind::NotFound.http_status(), 404);
        assert_eq!(ErrorKind::IdempotencyConflict.http_status(), 409);
        assert_eq!(ErrorKind::Conflict.http_status(), 409);
        assert_eq!(ErrorKind::RateLimit.http_status(), 429);
        assert_eq!(ErrorKind::Database.http_status(), 500);
        assert_eq!(ErrorKind::Integrity.http_status(), 500);
    }
}
