//! Common response envelope shapes: a generic wrapper plus the
//! `{success, data|error}` envelope the ingestion API returns.

use serde::Serialize;
use utoipa::ToSchema;

/// Canonical success envelope wrapping any response payload.
#[derive(Debug, Serialize, ToSchema)]
pub struct SuccessEnvelope<T> {
    pub success: bool,
    pub data: T,
}

impl<T> SuccessEnvelope<T> {
    pub fn new(data: T) -> Self {
        Self { success: true, data }
    }
}

/// Correlation ID header name, generated by middleware when the caller
/// omits it and echoed on every response.
pub const CORRELATION_ID_HEADER: &str = "x-correlation-id";
