//! Configuration for the powerwall poller.
//!
//! Layers serialized defaults, an optional TOML file, and `TESLA_*`
//! environment variables, then validates the result into
//! `powerwall_core::RuntimeConfig`.

use std::collections::BTreeMap;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use secrecy::SecretString;
use serde::{Deserialize, Deserializer, Serialize};
use thiserror::Error;
use url::Url;

use powerwall_core::{
    DEFAULT_INTERVAL, DEFAULT_MEASUREMENT, ErrorPolicy, GatewayConfig, InfluxConfig, PollConfig,
    RuntimeConfig, TlsVerification,
};

/// Prefix of every environment variable the poller reads.
pub const ENV_PREFIX: &str = "TESLA_";

/// Longest accepted poll interval: one day.
pub const MAX_INTERVAL: Duration = Duration::from_secs(24 * 60 * 60);

// ── Error ───────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid {field}: {reason}")]
    Validation { field: String, reason: String },

    #[error("missing required setting '{field}' (set TESLA_{env})", env = .field.to_uppercase())]
    Missing { field: String },

    #[error("config loading failed: {0}")]
    Figment(Box<figment::Error>),
}

impl From<figment::Error> for ConfigError {
    fn from(err: figment::Error) -> Self {
        Self::Figment(Box::new(err))
    }
}

// ── Raw settings ────────────────────────────────────────────────────

/// Flat settings as read from file and environment.
///
/// Field names match the environment suffixes: `TESLA_INFLUXHOST` ->
/// `influxhost`.
#[derive(Debug, Default, Deserialize, Serialize)]
pub struct Config {
    /// Gateway base URL (e.g., "https://192.168.91.1").
    pub gateway: Option<String>,
    pub email: Option<String>,
    /// Gateway password. Plaintext in a file; prefer the environment.
    pub password: Option<String>,

    /// Path to a CA certificate for the gateway. Unset accepts its
    /// self-signed certificate.
    pub ca_cert: Option<PathBuf>,

    pub influxhost: Option<String>,
    pub influxbucket: Option<String>,
    pub influxorg: Option<String>,
    pub influxtoken: Option<String>,

    /// Poll interval in seconds. Zero, empty or unset means 30.
    #[serde(default, deserialize_with = "seconds")]
    pub interval: u64,

    /// Measurement name for written points.
    pub measurement: Option<String>,

    /// `exit` (default) or `continue`.
    #[serde(default)]
    pub on_error: ErrorPolicy,

    /// Bind address for the debug reflector (e.g., "127.0.0.1:8080").
    pub reflector: Option<SocketAddr>,
}

// ── Loading ─────────────────────────────────────────────────────────

/// Build the figment: defaults, then `path` if given, then the environment.
///
/// Environment values are taken verbatim as strings. `Env` would otherwise
/// guess types, turning a password like `0123` into the integer `123`.
pub fn figment(path: Option<&Path>) -> Figment {
    let mut figment = Figment::new().merge(Serialized::defaults(Config::default()));
    if let Some(path) = path {
        figment = figment.merge(Toml::file(path));
    }
    figment.merge(Serialized::defaults(environment()))
}

/// `TESLA_*` variables as lowercase keys and raw string values.
fn environment() -> BTreeMap<String, String> {
    Env::prefixed(ENV_PREFIX)
        .ignore(&["config"])
        .iter()
        .map(|(key, value)| (key.as_str().to_owned(), value))
        .collect()
}

/// Seconds as a TOML integer or an environment string; blank means zero.
fn seconds<'de, D: Deserializer<'de>>(deserializer: D) -> Result<u64, D::Error> {
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Number(u64),
        Text(String),
    }

    match Raw::deserialize(deserializer)? {
        Raw::Number(n) => Ok(n),
        Raw::Text(text) if text.trim().is_empty() => Ok(0),
        Raw::Text(text) => text.trim().parse().map_err(|_| {
            serde::de::Error::custom(format!("expected whole seconds, found '{text}'"))
        }),
    }
}

/// Load raw settings from file and environment.
pub fn load(path: Option<&Path>) -> Result<Config, ConfigError> {
    Ok(figment(path).extract()?)
}

// ── Validation ──────────────────────────────────────────────────────

fn required(value: Option<String>, field: &str) -> Result<String, ConfigError> {
    match value {
        Some(v) if !v.trim().is_empty() => Ok(v),
        _ => Err(ConfigError::Missing {
            field: field.into(),
        }),
    }
}

fn parse_url(value: &str, field: &str) -> Result<Url, ConfigError> {
    let url: Url = value.parse().map_err(|e| ConfigError::Validation {
        field: field.into(),
        reason: format!("invalid URL '{value}': {e}"),
    })?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(ConfigError::Validation {
            field: field.into(),
            reason: format!("expected an http(s) URL, got '{value}'"),
        });
    }
    Ok(url)
}

impl Config {
    /// Poll interval, falling back to 30s when unset or zero.
    pub fn interval(&self) -> Result<Duration, ConfigError> {
        let interval = match self.interval {
            0 => DEFAULT_INTERVAL,
            secs => Duration::from_secs(secs),
        };
        if interval > MAX_INTERVAL {
            return Err(ConfigError::Validation {
                field: "interval".into(),
                reason: format!(
                    "{} seconds exceeds the maximum of {}",
                    self.interval,
                    MAX_INTERVAL.as_secs()
                ),
            });
        }
        Ok(interval)
    }

    /// Gateway settings only; enough for a one-shot fetch.
    pub fn gateway(&self) -> Result<GatewayConfig, ConfigError> {
        let url = parse_url(&required(self.gateway.clone(), "gateway")?, "gateway")?;
        let email = required(self.email.clone(), "email")?;
        let password = SecretString::from(required(self.password.clone(), "password")?);
        let tls = self
            .ca_cert
            .clone()
            .map_or(TlsVerification::DangerAcceptInvalid, TlsVerification::CustomCa);

        Ok(GatewayConfig {
            url,
            email,
            password,
            tls,
        })
    }

    /// Time-series sink settings.
    pub fn sink(&self) -> Result<InfluxConfig, ConfigError> {
        let host = parse_url(&required(self.influxhost.clone(), "influxhost")?, "influxhost")?;
        Ok(InfluxConfig {
            host,
            org: required(self.influxorg.clone(), "influxorg")?,
            bucket: required(self.influxbucket.clone(), "influxbucket")?,
            token: SecretString::from(required(self.influxtoken.clone(), "influxtoken")?),
        })
    }

    /// Validate everything into a `RuntimeConfig`.
    pub fn resolve(&self) -> Result<RuntimeConfig, ConfigError> {
        let measurement = self
            .measurement
            .clone()
            .filter(|m| !m.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_MEASUREMENT.into());

        Ok(RuntimeConfig {
            gateway: self.gateway()?,
            sink: self.sink()?,
            poll: PollConfig {
                interval: self.interval()?,
                measurement,
                on_error: self.on_error,
            },
            reflector: self.reflector,
        })
    }
}
