//! Gateway configuration loaded from environment variables.
//!
//! Follows 12-factor style: all settings come from environment variables
//! (or a `.env` file via `dotenvy`).

use std::net::SocketAddr;
use std::time::Duration;

/// Signing secret used when `WS_JWT_SECRET` is unset.
///
/// **Unsafe for production.** Anyone who knows this value can mint valid
/// tokens. Startup logs a warning whenever it is in effect.
pub const INSECURE_DEV_SECRET: &str = "dev-only-change-me";

/// Top-level gateway configuration.
///
/// Loaded once at startup via [`GatewayConfig::from_env`].
#[derive(Clone)]
pub struct GatewayConfig {
    /// Socket address to bind the HTTP server to (e.g. `0.0.0.0:8080`).
    pub listen_addr: SocketAddr,

    /// Symmetric secret for signing handshake tokens.
    pub jwt_secret: String,

    /// Lifetime of an issued token.
    pub otp_ttl: Duration,

    /// Largest inbound WebSocket frame accepted, in bytes.
    pub max_message_bytes: usize,

    /// How long a connection may go without a pong before it is dropped.
    pub pong_wait: Duration,

    /// Bound of each connection's outbound queue.
    pub outbound_queue_capacity: usize,

    /// Origins allowed to open a WebSocket. An empty `Origin` is always
    /// accepted.
    pub allowed_origins: Vec<String>,
}

impl GatewayConfig {
    /// Loads configuration from environment variables.
    ///
    /// Falls back to sensible defaults when a variable is not set.
    /// Calls `dotenvy::dotenv().ok()` to optionally load a `.env` file.
    ///
    /// # Errors
    ///
    /// Returns an error if `LISTEN_ADDR` is set but cannot be parsed as
    /// a [`SocketAddr`].
    pub fn from_env() -> Result<Self, Box<dyn std::error::Error>> {
        dotenvy::dotenv().ok();

        let defaults = Self::default();

        let listen_addr: SocketAddr = match std::env::var("LISTEN_ADDR") {
            Ok(raw) => raw.parse()?,
            Err(_) => defaults.listen_addr,
        };

        let jwt_secret = std::env::var("WS_JWT_SECRET")
            .ok()
            .filter(|s| !s.is_empty())
            .unwrap_or(defaults.jwt_secret);

        let otp_ttl = Duration::from_secs(parse_env("OTP_TTL_SECS", defaults.otp_ttl.as_secs()));
        let max_message_bytes = parse_env("WS_MAX_MESSAGE_BYTES", defaults.max_message_bytes);
        let pong_wait =
            Duration::from_secs(parse_env("WS_PONG_WAIT_SECS", defaults.pong_wait.as_secs()).max(1));
        let outbound_queue_capacity =
            parse_env("WS_OUTBOUND_QUEUE_CAPACITY", defaults.outbound_queue_capacity).max(1);

        let allowed_origins = std::env::var("WS_ALLOWED_ORIGINS")
            .map(|v| parse_origins(&v))
            .unwrap_or(defaults.allowed_origins);

        Ok(Self {
            listen_addr,
            jwt_secret,
            otp_ttl,
            max_message_bytes,
            pong_wait,
            outbound_queue_capacity,
            allowed_origins,
        })
    }

    /// Returns `true` if the insecure development secret is in use.
    #[must_use]
    pub fn uses_default_secret(&self) -> bool {
        self.jwt_secret == INSECURE_DEV_SECRET
    }

    /// Interval between keepalive pings: 90% of the pong wait.
    #[must_use]
    pub fn ping_interval(&self) -> Duration {
        self.pong_wait.mul_f64(0.9)
    }
}

impl Default for GatewayConfig {
    /// The values [`GatewayConfig::from_env`] uses for unset variables.
    fn default() -> Self {
        Self {
            listen_addr: SocketAddr::from(([0, 0, 0, 0], 8080)),
            jwt_secret: INSECURE_DEV_SECRET.to_string(),
            otp_ttl: Duration::from_secs(300),
            max_message_bytes: 512,
            pong_wait: Duration::from_secs(10),
            outbound_queue_capacity: 64,
            allowed_origins: vec!["http://localhost:8080".to_string()],
        }
    }
}

impl std::fmt::Debug for GatewayConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GatewayConfig")
            .field("listen_addr", &self.listen_addr)
            .field("jwt_secret", &"<redacted>")
            .field("otp_ttl", &self.otp_ttl)
            .field("max_message_bytes", &self.max_message_bytes)
            .field("pong_wait", &self.pong_wait)
            .field("outbound_queue_capacity", &self.outbound_queue_capacity)
            .field("allowed_origins", &self.allowed_origins)
            .finish()
    }
}

/// Parses an environment variable as `T`, returning `default` on missing
/// or invalid values.
fn parse_env<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

/// Splits a comma-separated origin list, trimming whitespace and
/// discarding empty entries.
fn parse_origins(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(ToString::to_string)
        .collect()
}
