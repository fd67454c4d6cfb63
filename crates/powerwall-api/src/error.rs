use thiserror::Error;

/// Top-level error type for the `powerwall-api` crate.
///
/// Covers every failure mode of a gateway session: login, transport,
/// data endpoints, and response decoding. `powerwall-core` maps these
/// into domain errors.
#[derive(Debug, Error)]
pub enum Error {
    // ── Authentication ──────────────────────────────────────────────
    /// Login rejected by the gateway (any non-200 from the login endpoint).
    #[error("Authentication failed: {message}")]
    Authentication { message: String },

    // ── Transport ───────────────────────────────────────────────────
    /// Connection refused, DNS failure, TLS failure, body read failure.
    #[error("Connection error: {0}")]
    Connection(#[from] reqwest::Error),

    /// URL parsing error.
    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    /// The gateway CA certificate could not be loaded.
    #[error("TLS error: {0}")]
    Tls(String),

    /// The HTTP client could not be constructed.
    #[error("HTTP client setup failed: {0}")]
    Client(String),

    // ── Data endpoints ──────────────────────────────────────────────
    /// A data endpoint answered with something other than HTTP 200.
    #[error("Fetch of {path} failed (HTTP {status}): {message}")]
    Fetch {
        path: String,
        status: u16,
        message: String,
    },

    /// JSON decoding failed, with the raw body for debugging.
    #[error("Deserialization error: {message}")]
    Deserialization { message: String, body: String },
}

impl Error {
    /// Returns `true` if the gateway rejected the credentials or session.
    pub fn is_auth_failure(&self) -> bool {
        match self {
            Self::Authentication { .. } => true,
            Self::Fetch { status, .. } => *status == 401 || *status == 403,
            _ => false,
        }
    }

    /// Returns `true` if this is a transient error worth retrying.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Connection(e) => e.is_timeout() || e.is_connect(),
            Self::Fetch { status, .. } => *status >= 500,
            _ => false,
        }
    }

    pub(crate) fn deserialization(err: &serde_json::Error, body: &[u8]) -> Self {
        let body = String::from_utf8_lossy(body).into_owned();
        let preview: String = body.chars().take(200).collect();
        Self::Deserialization {
            message: format!("{err} (body preview: {preview:?})"),
            body,
        }
    }
}
