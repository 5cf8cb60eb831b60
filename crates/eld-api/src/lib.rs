//! HTTP surface for the ELD event ingestion core, split between routing,
//! handlers, and error mapping.

pub mod dto;
pub mod error;
pub mod handlers;
pub mod middleware;
pub mod routes;
pub mod state;

use std::sync::Arc;

use axum::middleware::from_fn;
use axum::Router;

use state::AppState;

/// Assemble the full router. Correlation-ID propagation wraps every
/// route; the idempotency gate is layered onto the two ingestion routes
/// only, inside `routes::api_routes`.
pub fn create_router(state: Arc<AppState>) -> Router {
    routes::api_routes(state.clone())
        .layer(from_fn(middleware::correlation_id_middleware))
        .with_state(state)
}
