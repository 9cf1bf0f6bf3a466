//! Token issuance handler.

use axum::extract::{Query, State};
use axum::response::IntoResponse;
use axum::routing::get;
use axum::{Json, Router};

use crate::api::dto::{OtpParams, OtpResponse};
use crate::app_state::AppState;
use crate::error::{ErrorResponse, GatewayError};

/// `GET /otp`: Issue a short-lived handshake token.
///
/// # Errors
///
/// Returns [`GatewayError::InvalidRequest`] for an unusable subject and
/// [`GatewayError::Internal`] if signing fails.
#[utoipa::path(
    get,
    path = "/otp",
    tag = "Auth",
    summary = "Issue a handshake token",
    description = "Returns a signed token valid for the configured TTL. Pass it to `/ws` as `?otp=`.",
    params(OtpParams),
    responses(
        (status = 200, description = "Token issued", body = OtpResponse),
        (status = 400, description = "Invalid subject", body = ErrorResponse),
        (status = 500, description = "Token could not be signed", body = ErrorResponse),
    )
)]
pub async fn issue_otp(
    State(state): State<AppState>,
    Query(params): Query<OtpParams>,
) -> Result<impl IntoResponse, GatewayError> {
    let subject = params.validated_subject().ok_or_else(|| {
        GatewayError::InvalidRequest("subject must be 1 to 64 characters".to_string())
    })?;

    let otp = state.tokens.issue(subject).inspect_err(|e| {
        tracing::error!(error = %e, "failed to generate otp");
    })?;
    tracing::debug!(subject, ttl_secs = state.tokens.ttl().as_secs(), "issued otp");

    Ok(Json(OtpResponse { otp }))
}

/// Token routes.
pub fn routes() -> Router<AppState> {
    Router::new().route("/otp", get(issue_otp))
}
