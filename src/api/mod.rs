//! HTTP API layer: route handlers, DTOs, router composition, and the
//! OpenAPI document.

pub mod dto;
pub mod handlers;

use axum::Router;
use utoipa::OpenApi;

use crate::app_state::AppState;

/// OpenAPI description of the HTTP surface.
#[derive(Debug, OpenApi)]
#[openapi(
    paths(
        handlers::otp::issue_otp,
        handlers::system::health_handler,
        crate::ws::handler::ws_handler,
    ),
    tags(
        (name = "Auth", description = "Handshake token issuance"),
        (name = "System", description = "Service health"),
        (name = "WebSocket", description = "Relay connections"),
    )
)]
pub struct ApiDoc;

/// Builds the HTTP API router (everything except `/ws`).
pub fn build_router() -> Router<AppState> {
    handlers::routes()
}
