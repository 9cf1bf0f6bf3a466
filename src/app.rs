//! Router assembly shared by the binary and the integration tests.

use std::time::Duration;

use axum::Router;
use axum::http::StatusCode;
use axum::routing::get;
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;

use crate::api;
use crate::app_state::AppState;
use crate::ws::handler::ws_handler;

/// Upper bound on a plain HTTP request. Does not apply to `/ws`, whose
/// lifetime is governed by the keepalive.
pub const HTTP_REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Builds the complete application: HTTP API, `/ws`, tracing, and (with the
/// `swagger-ui` feature) the OpenAPI viewer.
pub fn build_app(state: AppState) -> Router {
    let http = api::build_router().layer(TimeoutLayer::with_status_code(
        StatusCode::REQUEST_TIMEOUT,
        HTTP_REQUEST_TIMEOUT,
    ));

    let router = Router::new().merge(http).route("/ws", get(ws_handler));

    #[cfg(feature = "swagger-ui")]
    let router = {
        use utoipa::OpenApi;
        router.merge(
            utoipa_swagger_ui::SwaggerUi::new("/swagger-ui")
                .url("/api-docs/openapi.json", api::ApiDoc::openapi()),
        )
    };

    router.layer(TraceLayer::new_for_http()).with_state(state)
}
