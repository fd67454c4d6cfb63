//! CLI error types with miette diagnostics.
//!
//! Maps `CoreError` and `ConfigError` into user-facing errors with
//! actionable help text and a process exit code.

use miette::Diagnostic;
use thiserror::Error;

use powerwall_config::ConfigError;
use powerwall_core::CoreError;

pub mod exit_code {
    pub const GENERAL: i32 = 1;
    pub const USAGE: i32 = 2;
    pub const AUTH: i32 = 3;
    pub const CONNECTION: i32 = 7;
    pub const SINK: i32 = 9;
}

#[derive(Debug, Error, Diagnostic)]
pub enum CliError {
    // ── Configuration ────────────────────────────────────────────────
    #[error("{0}")]
    #[diagnostic(
        code(powerwall::config),
        help(
            "Settings come from TESLA_* environment variables, optionally\n\
             layered over a TOML file given with --config."
        )
    )]
    Config(#[from] ConfigError),

    #[error("{message}")]
    #[diagnostic(code(powerwall::settings), help("Lower TESLA_INTERVAL."))]
    Settings { message: String },

    // ── Gateway ──────────────────────────────────────────────────────
    #[error("Could not reach gateway: {reason}")]
    #[diagnostic(
        code(powerwall::connection_failed),
        help("Check that TESLA_GATEWAY points at the gateway's local address.")
    )]
    ConnectionFailed { reason: String },

    #[error("Gateway rejected the login: {message}")]
    #[diagnostic(
        code(powerwall::auth_failed),
        help("Verify TESLA_EMAIL and TESLA_PASSWORD (the customer login).")
    )]
    AuthFailed { message: String },

    #[error("{0}")]
    #[diagnostic(code(powerwall::gateway))]
    Gateway(CoreError),

    // ── Sink ─────────────────────────────────────────────────────────
    #[error("{message}")]
    #[diagnostic(
        code(powerwall::sink),
        help("Check TESLA_INFLUXHOST, TESLA_INFLUXORG, TESLA_INFLUXBUCKET and the token's write scope.")
    )]
    Sink { message: String },

    // ── Local ────────────────────────────────────────────────────────
    #[error("Reflector failed: {0}")]
    #[diagnostic(
        code(powerwall::reflector),
        help("Is another process already bound to TESLA_REFLECTOR?")
    )]
    Reflector(#[source] std::io::Error),

    #[error("Could not encode output: {0}")]
    #[diagnostic(code(powerwall::output))]
    Output(#[from] serde_json::Error),

    #[error("Background task failed: {0}")]
    #[diagnostic(code(powerwall::task))]
    Task(#[from] tokio::task::JoinError),
}

impl CliError {
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::Config(_) | Self::Settings { .. } => exit_code::USAGE,
            Self::AuthFailed { .. } => exit_code::AUTH,
            Self::ConnectionFailed { .. } => exit_code::CONNECTION,
            Self::Sink { .. } => exit_code::SINK,
            Self::Gateway(_) | Self::Reflector(_) | Self::Output(_) | Self::Task(_) => {
                exit_code::GENERAL
            }
        }
    }
}

impl From<CoreError> for CliError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::ConnectionFailed { reason } => Self::ConnectionFailed { reason },
            CoreError::AuthenticationFailed { message } => Self::AuthFailed { message },
            CoreError::SinkWrite { message } => Self::Sink { message },
            CoreError::Reflector(e) => Self::Reflector(e),
            CoreError::Config { message } => Self::Settings { message },
            other @ (CoreError::Fetch { .. } | CoreError::Decode { .. }) => Self::Gateway(other),
        }
    }
}

impl From<powerwall_api::Error> for CliError {
    fn from(err: powerwall_api::Error) -> Self {
        CoreError::from(err).into()
    }
}
