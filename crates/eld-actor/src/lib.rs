//! Trust-boundary identity extraction.
//!
//! Credential issuance and verification (JWT/session/API-key validation)
//! are explicitly out of scope — an upstream collaborator terminates
//! those and forwards a verified actor identity on trusted headers. This
//! crate only extracts and types that identity, without performing the
//! verification itself.

use async_trait::async_trait;
use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use eld_types::ActorId;

/// Header carrying the verified actor ID, set by the upstream auth
/// collaborator after credential verification.
pub const ACTOR_ID_HEADER: &str = "x-actor-id";
/// Header carrying the actor's role, set by the same collaborator.
pub const ACTOR_ROLE_HEADER: &str = "x-actor-role";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActorRole {
    Standard,
    Admin,
}

impl ActorRole {
    fn from_header(value: &str) -> Self {
        if value.eq_ignore_ascii_case("admin") {
            Self::Admin
        } else {
            Self::Standard
        }
    }
}

/// A verified actor identity, trusted because it arrived past the auth
/// boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Actor {
    pub id: ActorId,
    pub role: ActorRole,
}

#[derive(Debug, thiserror::Error)]
pub enum ActorError {
    #[error("missing actor identity")]
    MissingActor,
    #[error("invalid actor identity header")]
    InvalidActorHeader,
    #[error("actor lacks required role")]
    Forbidden,
}

impl IntoResponse for ActorError {
    fn into_response(self) -> Response {
        let status = match self {
            Self::MissingActor | Self::InvalidActorHeader => StatusCode::UNAUTHORIZED,
            Self::Forbidden => StatusCode::FORBIDDEN,
        };
        (status, self.to_string()).into_response()
    }
}

/// Extract the verified actor identity from request headers. Public so
/// that `eld-api`'s idempotency middleware (which runs before Axum's
/// per-handler extractors) can identify the actor without duplicating
/// the header-parsing rules.
pub fn actor_from_headers(headers: &HeaderMap) -> Result<Actor, ActorError> {
    let id_header = headers
        .get(ACTOR_ID_HEADER)
        .ok_or(ActorError::MissingActor)?
        .to_str()
        .map_err(|_| ActorError::InvalidActorHeader)?;
    let uuid = uuid::Uuid::parse_str(id_header).map_err(|_| ActorError::InvalidActorHeader)?;
    let role = headers
        .get(ACTOR_ROLE_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(ActorRole::from_header)
        .unwrap_or(ActorRole::Standard);
    Ok(Actor {
        id: ActorId::from_uuid(uuid),
        role,
    })
}

fn extract_actor(parts: &Parts) -> Result<Actor, ActorError> {
    actor_from_headers(&parts.headers)
}

/// Extractor requiring a verified actor; rejects with 401 when absent.
pub struct RequireActor(pub Actor);

#[async_trait]
impl<S> FromRequestParts<S> for RequireActor
where
    S: Send + Sync,
{
    type Rejection = ActorError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        extract_actor(parts).map(RequireActor)
    }
}

/// Extractor requiring a verified actor with the admin role; rejects with
/// 401 when the identity is absent, 403 when present but not admin.
pub struct RequireAdminActor(pub Actor);

#[async_trait]
impl<S> FromRequestParts<S> for RequireAdminActor
where
    S: Send + Sync,
{
    type Rejection = ActorError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let actor = extract_actor(parts)?;
        if actor.role != ActorRole::Admin {
            return Err(ActorError::Forbidden);
        }
        Ok(RequireAdminActor(actor))
    }
}

/// Extractor that never rejects; `None` when no actor header was present.
pub struct OptionalActor(pub Option<Actor>);

#[async_trait]
impl<S> FromRequestParts<S> for OptionalActor
where
    S: Send + Sync,
{
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(OptionalActor(extract_actor(parts).ok()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::Request;

    fn parts_with_headers(headers: &[(&str, &str)]) -> Parts {
        let mut builder = Request::builder();
        for (k, v) in headers {
            builder = builder.header(*k, *v);
        }
        let (parts, _) = builder.body(()).unwrap().into_parts();
        parts
    }

    #[test]
    fn extracts_standard_role_by_default() {
        let id = uuid::Uuid::new_v4();
        let parts = parts_with_headers(&[("x-actor-id", &id.to_string())]);
        let actor = extract_actor(&parts).unwrap();
        assert_eq!(actor.role, ActorRole::Standard);
    }

    #[test]
    fn extracts_admin_role_case_insensitively() {
        let id = uuid::Uuid::new_v4();
        let parts = parts_with_headers(&[("x-actor-id", &id.to_string()), ("x-actor-role", "ADMIN")]);
        let actor = extract_actor(&parts).unwrap();
        assert_eq!(actor.role, ActorRole::Admin);
    }

    #[test]
    fn missing_header_is_missing_actor() {
        let parts = parts_with_headers(&[]);
        assert!(matches!(extract_actor(&parts), Err(ActorError::MissingActor)));
    }

    #[test]
    fn malformed_uuid_is_invalid_header() {
        let parts = parts_with_headers(&[("x-actor-id", "not-a-uuid")]);
        assert!(matches!(extract_actor(&parts), Err(ActorError::InvalidActorHeader)));
    }
}
