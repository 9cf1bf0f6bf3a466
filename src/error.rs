//! Error taxonomy for the relay, plus HTTP status code mapping.
//!
//! Handshake and issuance failures surface as [`GatewayError`], which maps
//! to an HTTP status and a structured JSON body. Everything that goes wrong
//! after the upgrade is a [`ConnectionError`] and stays local to the
//! offending connection.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;
use utoipa::ToSchema;

/// Structured JSON error response body.
///
/// All error responses follow this shape:
/// ```json
/// {
///   "error": {
///     "code": 1101,
///     "message": "unauthorized: token has expired",
///     "details": null
///   }
/// }
/// ```
#[derive(Debug, Serialize, ToSchema)]
pub struct ErrorResponse {
    /// Structured error payload.
    pub error: ErrorBody,
}

/// Inner error body with numeric code and human-readable message.
#[derive(Debug, Serialize, ToSchema)]
pub struct ErrorBody {
    /// Numeric error code.
    pub code: u32,
    /// Human-readable error message.
    pub message: String,
    /// Optional additional details.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

/// Token validation failures. A handshake that hits any of these is refused
/// and no connection is created.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AuthError {
    /// No token was presented.
    #[error("missing token")]
    MissingToken,

    /// The token could not be parsed.
    #[error("malformed token: {0}")]
    MalformedToken(String),

    /// The signature does not verify under the configured key and algorithm.
    #[error("invalid token signature")]
    InvalidSignature,

    /// The token's expiry has passed.
    #[error("token has expired")]
    ExpiredToken,

    /// The token's not-before time is still in the future.
    #[error("token is not yet valid")]
    NotYetValid,

    /// The `iss` claim does not match.
    #[error("token issuer mismatch")]
    IssuerMismatch,

    /// The `aud` claim does not match.
    #[error("token audience mismatch")]
    AudienceMismatch,

    /// A required claim (such as `exp`) is absent.
    #[error("token is missing required claim: {0}")]
    MissingClaim(String),
}

/// Malformed or unroutable traffic on an established connection.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ProtocolError {
    /// The frame is not a `{type, payload}` JSON envelope.
    #[error("malformed envelope: {0}")]
    MalformedEnvelope(String),

    /// No handler is registered for the event type.
    #[error("no handler for event type: {0}")]
    UnhandledEventType(String),

    /// The payload does not match the schema for its declared type.
    #[error("invalid payload for {event_type}: {reason}")]
    InvalidPayload {
        /// Wire tag of the offending event.
        event_type: String,
        /// Decoder message.
        reason: String,
    },

    /// The frame exceeds the configured size limit.
    #[error("message of {size} bytes exceeds limit of {limit}")]
    MessageTooLarge {
        /// Received frame size in bytes.
        size: usize,
        /// Configured limit in bytes.
        limit: usize,
    },

    /// A binary frame that is not valid UTF-8 text.
    #[error("unsupported frame")]
    UnsupportedFrame,
}

/// Read/write failures on the underlying transport.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TransportError {
    /// Reading from the socket failed.
    #[error("read failed: {0}")]
    Read(String),

    /// Writing to the socket failed.
    #[error("write failed: {0}")]
    Write(String),

    /// No pong arrived within the keepalive deadline.
    #[error("keepalive deadline elapsed")]
    KeepaliveTimeout,

    /// The connection was removed while a write was still pending.
    #[error("write abandoned: connection removed while the peer was not reading")]
    WriteAbandoned,
}

/// Terminal outcome of a connection pump.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConnectionError {
    /// Protocol violation by the peer.
    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    /// Transport failure.
    #[error(transparent)]
    Transport(#[from] TransportError),
}

/// HTTP-facing error enum with status code mapping.
///
/// # Error Code Ranges
///
/// | Range     | Category      | HTTP Status                |
/// |-----------|---------------|----------------------------|
/// | 1000–1099 | Validation    | 400 Bad Request            |
/// | 1100–1199 | Auth          | 401 Unauthorized           |
/// | 1200–1299 | Origin policy | 403 Forbidden              |
/// | 3000–3999 | Server        | 500 Internal Server Error  |
#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    /// Request validation failed.
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// The handshake token was rejected.
    #[error("unauthorized: {0}")]
    Unauthorized(#[from] AuthError),

    /// The upgrade request came from an origin outside the allow-list.
    #[error("origin not allowed: {0}")]
    OriginRejected(String),

    /// Internal server error (signing or random source failure).
    #[error("internal error: {0}")]
    Internal(String),
}

impl GatewayError {
    /// Returns the numeric error code for this variant.
    #[must_use]
    pub const fn error_code(&self) -> u32 {
        match self {
            Self::InvalidRequest(_) => 1001,
            Self::Unauthorized(auth) => match auth {
                AuthError::MissingToken => 1100,
                AuthError::ExpiredToken | AuthError::NotYetValid => 1101,
                AuthError::InvalidSignature => 1102,
                AuthError::IssuerMismatch | AuthError::AudienceMismatch => 1103,
                AuthError::MalformedToken(_) | AuthError::MissingClaim(_) => 1104,
            },
            Self::OriginRejected(_) => 1201,
            Self::Internal(_) => 3000,
        }
    }

    /// Returns the HTTP status code for this variant.
    #[must_use]
    pub const fn status_code(&self) -> StatusCode {
        match self {
            Self::InvalidRequest(_) => StatusCode::BAD_REQUEST,
            Self::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            Self::OriginRejected(_) => StatusCode::FORBIDDEN,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for GatewayError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let body = ErrorResponse {
            error: ErrorBody {
                code: self.error_code(),
                message: self.to_string(),
                details: None,
            },
        };
        let mut response = axum::Json(body).into_response();
        *response.status_mut() = status;
        response
    }
}
