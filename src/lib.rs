//! # room-relay
//!
//! Token-gated WebSocket hub that relays typed events between connected
//! clients, scoped by room.
//!
//! Clients fetch a short-lived signed token from `GET /otp`, present it on
//! `GET /ws`, and then exchange `{"type", "payload"}` JSON envelopes. The
//! hub routes each inbound event to the handler for its type; the chat
//! handler fans a `new_message` out to every connection in the sender's
//! room. Nothing is persisted.
//!
//! ## Architecture
//!
//! ```text
//! Clients (HTTP, WebSocket)
//!     │
//!     ├── GET /otp ──────── TokenService (service/)
//!     ├── GET /ws ───────── handshake (ws/handler)
//!     │                         │
//!     │                  read pump / write pump (ws/connection)
//!     │                         │
//!     └──────────────────── Hub: registry + router + broadcast (domain/)
//! ```

pub mod api;
pub mod app;
pub mod app_state;
pub mod config;
pub mod domain;
pub mod error;
pub mod service;
pub mod ws;

pub use app::build_app;
