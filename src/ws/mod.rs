//! WebSocket layer: handshake, origin policy, and connection pumps.
//!
//! The endpoint at `/ws` validates a handshake token, upgrades the
//! transport, and hands the socket to the pumps in [`connection`].

pub mod connection;
pub mod handler;
pub mod origin;

pub use connection::ConnectionSettings;
pub use origin::OriginPolicy;
