//! Service layer: token issuance and validation.
//!
//! [`TokenService`] signs and checks the short-lived tokens that gate the
//! WebSocket handshake.

pub mod token_service;

pub use token_service::{Claims, TOKEN_AUDIENCE, TOKEN_ISSUER, TokenService};
