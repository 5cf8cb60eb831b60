//! Maps every domain error onto the canonical response envelope via a
//! `From<DomainError> for ApiError` impl per upstream crate.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use eld_types::{ErrorKind, FieldError};
use serde::Serialize;

#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub code: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<Vec<FieldError>>,
}

#[derive(Debug, Serialize)]
pub struct ErrorEnvelope {
    pub success: bool,
    pub error: ErrorBody,
}

#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub body: ErrorBody,
}

pub type ApiResult<T> = Result<T, ApiError>;

impl ApiError {
    pub fn new(status: StatusCode, code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            status,
            body: ErrorBody {
                code: code.into(),
                message: message.into(),
                details: None,
            },
        }
    }

    pub fn validation(details: Vec<FieldError>) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            body: ErrorBody {
                code: ErrorKind::Validation.code().to_string(),
                message: "one or more fields failed validation".to_string(),
                details: Some(details),
            },
        }
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, "BAD_REQUEST", message)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(ErrorEnvelope { success: false, error: self.body })).into_response()
    }
}

impl From<eld_core::IngestError> for ApiError {
    fn from(err: eld_core::IngestError) -> Self {
        match err {
            eld_core::IngestError::Validation(details) => Self::validation(details),
            other => {
                let kind = other.kind();
                let status = StatusCode::from_u16(kind.http_status()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
                Self::new(status, kind.code(), other.to_string())
            }
        }
    }
}

impl From<eld_db::DbError> for ApiError {
    fn from(err: eld_db::DbError) -> Self {
        let kind = err.kind();
        let status = StatusCode::from_u16(kind.http_status()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        Self::new(status, kind.code(), err.to_string())
    }
}

impl From<eld_actor::ActorError> for ApiError {
    fn from(err: eld_actor::ActorError) -> Self {
        let status = match err {
            eld_actor::ActorError::MissingActor | eld_actor::ActorError::InvalidActorHeader => {
                StatusCode::UNAUTHORIZED
            }
            eld_actor::ActorError::Forbidden => StatusCode::FORBIDDEN,
        };
        Self::new(status, ErrorKind::Authentication.code(), err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validation_error_carries_field_details() {
        let err = ApiError::validation(vec![FieldError::new("eventType", "OUT_OF_RANGE", "bad")]);
        assert_eq!(err.status, StatusCode::BAD_REQUEST);
        assert_eq!(err.body.details.unwrap().len(), 1);
    }

    #[test]
    fn idempotency_conflict_maps_to_409() {
        let err: ApiError = eld_core::IngestError::IdempotencyConflict.into();
        assert_eq!(err.status, StatusCode::CONFLICT);
    }
}
