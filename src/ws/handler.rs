//! Axum WebSocket handshake handler.

use std::sync::Arc;

use axum::extract::ws::WebSocketUpgrade;
use axum::extract::ws::rejection::WebSocketUpgradeRejection;
use axum::extract::{Query, State};
use axum::http::HeaderMap;
use axum::http::header::{AUTHORIZATION, ORIGIN};
use axum::response::{IntoResponse, Response};
use serde::Deserialize;
use tracing::{info, warn};
use utoipa::IntoParams;

use super::OriginPolicy;
use super::connection::run_connection;
use crate::app_state::AppState;
use crate::domain::Connection;
use crate::error::{ErrorResponse, GatewayError};
use crate::service::{Claims, TokenService};

/// Query parameters accepted on the handshake.
#[derive(Debug, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct HandshakeParams {
    /// Token from `GET /otp`. Takes precedence over an `Authorization`
    /// header.
    pub otp: Option<String>,
}

/// `GET /ws`: Validate the handshake token and upgrade to WebSocket.
///
/// The token and origin are checked before the upgrade; a rejected
/// handshake never creates a connection.
///
/// # Errors
///
/// Returns [`GatewayError::Unauthorized`] for a missing or invalid token and
/// [`GatewayError::OriginRejected`] for a disallowed `Origin`.
#[utoipa::path(
    get,
    path = "/ws",
    tag = "WebSocket",
    summary = "Open a relay connection",
    description = "Upgrades to a WebSocket after validating the token passed as `?otp=` or `Authorization: Bearer`. Frames are `{\"type\", \"payload\"}` JSON envelopes.",
    params(HandshakeParams),
    responses(
        (status = 101, description = "Switching protocols"),
        (status = 401, description = "Token missing or invalid", body = ErrorResponse),
        (status = 403, description = "Origin not allowed", body = ErrorResponse),
    )
)]
pub async fn ws_handler(
    State(state): State<AppState>,
    Query(params): Query<HandshakeParams>,
    headers: HeaderMap,
    ws: Result<WebSocketUpgrade, WebSocketUpgradeRejection>,
) -> Result<Response, GatewayError> {
    let claims = authorize_handshake(
        &state.tokens,
        &state.origins,
        &headers,
        params.otp.as_deref(),
    )?;

    let ws = match ws {
        Ok(ws) => ws,
        Err(rejection) => return Ok(rejection.into_response()),
    };

    let settings = state.connection;
    let (connection, outbound) = Connection::new(claims.sub, settings.queue_capacity);
    let hub = Arc::clone(&state.hub);
    info!(conn_id = %connection.id(), subject = connection.subject(), "new connection");

    Ok(ws
        .max_message_size(settings.max_message_bytes)
        .on_failed_upgrade(|e| warn!(error = %e, "websocket upgrade failed"))
        .on_upgrade(move |socket| run_connection(socket, hub, connection, outbound, settings)))
}

/// Validates the presented token, then the request origin.
///
/// # Errors
///
/// Returns [`GatewayError::Unauthorized`] if the token fails validation and
/// [`GatewayError::OriginRejected`] if the origin is not allowed.
pub fn authorize_handshake(
    tokens: &TokenService,
    origins: &OriginPolicy,
    headers: &HeaderMap,
    otp: Option<&str>,
) -> Result<Claims, GatewayError> {
    let claims = tokens
        .validate(presented_token(headers, otp))
        .inspect_err(|e| warn!(error = %e, "handshake token rejected"))?;

    let origin = headers
        .get(ORIGIN)
        .map(|v| v.to_str().unwrap_or("<non-ascii>"));
    if !origins.allows(origin) {
        let origin = origin.unwrap_or_default().to_string();
        warn!(origin, "handshake origin rejected");
        return Err(GatewayError::OriginRejected(origin));
    }

    Ok(claims)
}

/// Picks the token from the query parameter, else from a bearer header.
fn presented_token<'a>(headers: &'a HeaderMap, otp: Option<&'a str>) -> &'a str {
    if let Some(otp) = otp.filter(|t| !t.is_empty()) {
        return otp;
    }
    headers
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(str::trim)
        .unwrap_or_default()
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;
    use crate::error::AuthError;
    use axum::http::HeaderValue;
    use std::time::Duration;

    fn tokens() -> TokenService {
        let Ok(svc) = TokenService::new(b"handshake-secret", Duration::from_secs(300)) else {
            panic!("token service");
        };
        svc
    }

    fn origins() -> OriginPolicy {
        OriginPolicy::new(vec!["http://localhost:8080".to_string()])
    }

    fn token(svc: &TokenService) -> String {
        let Ok(token) = svc.issue("admin") else {
            panic!("issue");
        };
        token
    }

    #[test]
    fn query_token_is_accepted() {
        let svc = tokens();
        let otp = token(&svc);
        let Ok(claims) = authorize_handshake(&svc, &origins(), &HeaderMap::new(), Some(&otp))
        else {
            panic!("valid handshake");
        };
        assert_eq!(claims.sub, "admin");
    }

    #[test]
    fn bearer_header_is_accepted() {
        let svc = tokens();
        let mut headers = HeaderMap::new();
        let Ok(value) = HeaderValue::from_str(&format!("Bearer {}", token(&svc))) else {
            panic!("header value");
        };
        let _ = headers.insert(AUTHORIZATION, value);
        assert!(authorize_handshake(&svc, &origins(), &headers, None).is_ok());
    }

    #[test]
    fn query_token_wins_over_bearer_header() {
        let svc = tokens();
        let otp = token(&svc);
        let mut headers = HeaderMap::new();
        let _ = headers.insert(AUTHORIZATION, HeaderValue::from_static("Bearer garbage"));
        let Ok(claims) = authorize_handshake(&svc, &origins(), &headers, Some(&otp)) else {
            panic!("query token should be used");
        };
        assert_eq!(claims.sub, "admin");
    }

    #[test]
    fn bearer_header_alone_is_validated() {
        let svc = tokens();
        let mut headers = HeaderMap::new();
        let _ = headers.insert(AUTHORIZATION, HeaderValue::from_static("Bearer garbage"));
        let result = authorize_handshake(&svc, &origins(), &headers, None);
        assert!(matches!(
            result,
            Err(GatewayError::Unauthorized(AuthError::MalformedToken(_)))
        ));
    }

    #[test]
    fn missing_token_is_unauthorized() {
        let svc = tokens();
        let result = authorize_handshake(&svc, &origins(), &HeaderMap::new(), None);
        assert!(matches!(
            result,
            Err(GatewayError::Unauthorized(AuthError::MissingToken))
        ));
    }

    #[test]
    fn empty_query_falls_back_to_header() {
        let svc = tokens();
        let result = authorize_handshake(&svc, &origins(), &HeaderMap::new(), Some(""));
        assert!(matches!(
            result,
            Err(GatewayError::Unauthorized(AuthError::MissingToken))
        ));
    }

    #[test]
    fn foreign_origin_is_forbidden() {
        let svc = tokens();
        let otp = token(&svc);
        let mut headers = HeaderMap::new();
        let _ = headers.insert(ORIGIN, HeaderValue::from_static("https://evil.example"));
        let result = authorize_handshake(&svc, &origins(), &headers, Some(&otp));
        assert!(matches!(result, Err(GatewayError::OriginRejected(o)) if o == "https://evil.example"));
    }

    #[test]
    fn allowed_origin_passes() {
        let svc = tokens();
        let otp = token(&svc);
        let mut headers = HeaderMap::new();
        let _ = headers.insert(ORIGIN, HeaderValue::from_static("http://localhost:8080"));
        assert!(authorize_handshake(&svc, &origins(), &headers, Some(&otp)).is_ok());
    }
}
