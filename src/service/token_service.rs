//! Token service: issues and validates short-lived handshake tokens.
//!
//! Tokens are HS256 JWTs binding a subject to a fixed lifetime. They gate
//! the WebSocket handshake only; an established connection is never
//! re-checked. There is no revocation list, so the short TTL bounds how
//! long a leaked token stays useful.

use std::fmt;
use std::time::Duration;

use chrono::{DateTime, Utc};
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation};
use rand::TryRngCore;
use rand::rngs::OsRng;
use serde::{Deserialize, Serialize};

use crate::error::{AuthError, GatewayError};

/// `iss` claim stamped on and required of every token.
pub const TOKEN_ISSUER: &str = "ws-lab";

/// `aud` claim stamped on and required of every token.
pub const TOKEN_AUDIENCE: &str = "ws-client";

/// The only accepted signing algorithm.
const ALGORITHM: Algorithm = Algorithm::HS256;

/// Registered claims carried by a handshake token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    /// Subject identity.
    pub sub: String,
    /// Issuer.
    pub iss: String,
    /// Audience.
    pub aud: String,
    /// Issued-at (unix seconds).
    pub iat: i64,
    /// Not-before (unix seconds).
    pub nbf: i64,
    /// Expiry (unix seconds).
    pub exp: i64,
    /// Unique token id.
    pub jti: String,
}

/// Issues and validates handshake tokens with a shared symmetric secret.
///
/// Constructed once at startup from explicit configuration and shared
/// immutably afterwards.
pub struct TokenService {
    encoding: EncodingKey,
    decoding: DecodingKey,
    validation: Validation,
    ttl: Duration,
}

impl TokenService {
    /// Creates a token service for the given secret and lifetime.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::Internal`] if the secret is empty.
    pub fn new(secret: &[u8], ttl: Duration) -> Result<Self, GatewayError> {
        if secret.is_empty() {
            return Err(GatewayError::Internal(
                "token signing secret is empty".to_string(),
            ));
        }

        let mut validation = Validation::new(ALGORITHM);
        validation.leeway = 0;
        validation.validate_exp = true;
        validation.validate_nbf = true;
        validation.set_issuer(&[TOKEN_ISSUER]);
        validation.set_audience(&[TOKEN_AUDIENCE]);
        validation.set_required_spec_claims(&["exp", "iss", "aud", "sub"]);

        Ok(Self {
            encoding: EncodingKey::from_secret(secret),
            decoding: DecodingKey::from_secret(secret),
            validation,
            ttl,
        })
    }

    /// Returns the fixed token lifetime.
    #[must_use]
    pub const fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Issues a token for `subject`, valid from now until now + TTL.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::Internal`] if signing fails.
    pub fn issue(&self, subject: &str) -> Result<String, GatewayError> {
        self.issue_at(subject, Utc::now())
    }

    /// Issues a token as if the current time were `now`.
    pub(crate) fn issue_at(&self, subject: &str, now: DateTime<Utc>) -> Result<String, GatewayError> {
        let ttl = chrono::Duration::from_std(self.ttl)
            .map_err(|e| GatewayError::Internal(format!("invalid token ttl: {e}")))?;
        let issued_at = now.timestamp();
        let claims = Claims {
            sub: subject.to_string(),
            iss: TOKEN_ISSUER.to_string(),
            aud: TOKEN_AUDIENCE.to_string(),
            iat: issued_at,
            nbf: issued_at,
            exp: (now + ttl).timestamp(),
            jti: random_token_id(),
        };

        jsonwebtoken::encode(&Header::new(ALGORITHM), &claims, &self.encoding).map_err(|e| {
            tracing::error!(error = %e, "failed to sign token");
            GatewayError::Internal(format!("failed to sign token: {e}"))
        })
    }

    /// Validates a token and returns its claims.
    ///
    /// Succeeds only if the HS256 signature verifies, issuer and audience
    /// match exactly, and an unexpired `exp` claim is present.
    ///
    /// # Errors
    ///
    /// Returns the [`AuthError`] describing the first failed check.
    pub fn validate(&self, raw: &str) -> Result<Claims, AuthError> {
        if raw.is_empty() {
            return Err(AuthError::MissingToken);
        }

        jsonwebtoken::decode::<Claims>(raw, &self.decoding, &self.validation)
            .map(|data| data.claims)
            .map_err(|e| map_jwt_error(e.kind()))
    }
}

impl fmt::Debug for TokenService {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenService")
            .field("algorithm", &ALGORITHM)
            .field("ttl", &self.ttl)
            .finish_non_exhaustive()
    }
}

fn map_jwt_error(kind: &ErrorKind) -> AuthError {
    match kind {
        ErrorKind::InvalidSignature | ErrorKind::InvalidAlgorithm => AuthError::InvalidSignature,
        ErrorKind::ExpiredSignature => AuthError::ExpiredToken,
        ErrorKind::ImmatureSignature => AuthError::NotYetValid,
        ErrorKind::InvalidIssuer => AuthError::IssuerMismatch,
        ErrorKind::InvalidAudience => AuthError::AudienceMismatch,
        ErrorKind::MissingRequiredClaim(claim) => AuthError::MissingClaim(claim.clone()),
        other => AuthError::MalformedToken(format!("{other:?}")),
    }
}

/// Generates a fresh token id from the OS random source.
fn random_token_id() -> String {
    let mut bytes = [0u8; 16];
    let filled = OsRng.try_fill_bytes(&mut bytes).map(|()| bytes);
    token_id_from(filled, Utc::now())
}

/// Builds a token id from random bytes, or from `now` if the random source
/// failed. The fallback is logged as a fault.
fn token_id_from<E: fmt::Display>(random: Result<[u8; 16], E>, now: DateTime<Utc>) -> String {
    match random {
        Ok(bytes) => uuid::Builder::from_random_bytes(bytes)
            .into_uuid()
            .simple()
            .to_string(),
        Err(e) => {
            tracing::error!(error = %e, "random source failed; using timestamp token id");
            now.timestamp_nanos_opt()
                .unwrap_or_else(|| now.timestamp_micros())
                .to_string()
        }
    }
}
