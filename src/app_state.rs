//! Shared application state injected into all Axum handlers.

use std::sync::Arc;

use crate::config::GatewayConfig;
use crate::domain::Hub;
use crate::error::GatewayError;
use crate::service::TokenService;
use crate::ws::{ConnectionSettings, OriginPolicy};

/// Shared application state available to all handlers via Axum's
/// `State` extractor.
#[derive(Debug, Clone)]
pub struct AppState {
    /// Registry and router for live connections.
    pub hub: Arc<Hub>,
    /// Handshake token issuer/validator.
    pub tokens: Arc<TokenService>,
    /// Upgrade origin allow-list.
    pub origins: Arc<OriginPolicy>,
    /// Per-connection limits and timers.
    pub connection: ConnectionSettings,
}

impl AppState {
    /// Builds the application state from configuration, with the standard
    /// handler table.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::Internal`] if the token service cannot be
    /// constructed from the configured secret.
    pub fn from_config(config: &GatewayConfig) -> Result<Self, GatewayError> {
        let tokens = TokenService::new(config.jwt_secret.as_bytes(), config.otp_ttl)?;
        Ok(Self {
            hub: Arc::new(Hub::default()),
            tokens: Arc::new(tokens),
            origins: Arc::new(OriginPolicy::new(config.allowed_origins.clone())),
            connection: ConnectionSettings::from_config(config),
        })
    }
}
