// ── Core error types ──
//
// Domain errors for the poll cycle. Consumers never match on HTTP status
// codes or serde errors directly; the `From<powerwall_api::Error>` impl
// translates gateway transport failures into these variants.

use thiserror::Error;

/// Unified error type for the core crate.
#[derive(Debug, Error)]
pub enum CoreError {
    // ── Gateway ──────────────────────────────────────────────────────
    #[error("Cannot connect to gateway: {reason}")]
    ConnectionFailed { reason: String },

    #[error("Authentication failed: {message}")]
    AuthenticationFailed { message: String },

    #[error("Fetch failed: {message}")]
    Fetch { message: String },

    #[error("Decode failed: {message}")]
    Decode { message: String },

    // ── Downstream ───────────────────────────────────────────────────
    #[error("Sink write failed: {message}")]
    SinkWrite { message: String },

    #[error("Reflector error: {0}")]
    Reflector(#[from] std::io::Error),

    #[error("Invalid configuration: {message}")]
    Config { message: String },
}

impl CoreError {
    /// Exit-code family for the binary.
    pub fn is_auth(&self) -> bool {
        matches!(self, Self::AuthenticationFailed { .. })
    }
}

impl From<powerwall_api::Error> for CoreError {
    fn from(err: powerwall_api::Error) -> Self {
        use powerwall_api::Error as Api;

        match err {
            Api::Authentication { message } => Self::AuthenticationFailed { message },
            Api::Connection(e) => Self::ConnectionFailed {
                reason: e.to_string(),
            },
            Api::InvalidUrl(e) => Self::ConnectionFailed {
                reason: format!("invalid gateway URL: {e}"),
            },
            Api::Tls(reason) | Api::Client(reason) => Self::ConnectionFailed { reason },
            Api::Fetch {
                path,
                status,
                message,
            } => Self::Fetch {
                message: format!("{path} returned HTTP {status}: {message}"),
            },
            Api::Deserialization { message, .. } => Self::Decode { message },
        }
    }
}
