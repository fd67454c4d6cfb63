// ── Runtime configuration ──
//
// These types describe *where* to read from and write to, and how often.
// They carry credential data but never touch disk or the environment;
// `powerwall-config` builds them and hands them in.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use secrecy::SecretString;
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};
use url::Url;

use powerwall_api::{Credentials, TlsMode, TransportConfig};

/// Poll interval used when none (or zero) is configured.
pub const DEFAULT_INTERVAL: Duration = Duration::from_secs(30);

/// Measurement name written for both readings unless overridden.
pub const DEFAULT_MEASUREMENT: &str = "http";

/// TLS verification strategy for the gateway.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum TlsVerification {
    /// Custom CA certificate file, added to the system roots.
    CustomCa(PathBuf),
    /// Skip verification. Default; the gateway certificate is self-signed.
    #[default]
    DangerAcceptInvalid,
}

/// Connection settings for the energy gateway.
#[derive(Debug, Clone)]
pub struct GatewayConfig {
    /// Gateway base URL (e.g., `https://192.168.91.1`).
    pub url: Url,
    pub email: String,
    pub password: SecretString,
    pub tls: TlsVerification,
}

impl GatewayConfig {
    pub fn credentials(&self) -> Credentials {
        Credentials::new(self.email.clone(), self.password.clone())
    }

    pub fn transport(&self) -> TransportConfig {
        let tls = match &self.tls {
            TlsVerification::CustomCa(path) => TlsMode::CustomCa(path.clone()),
            TlsVerification::DangerAcceptInvalid => TlsMode::DangerAcceptInvalid,
        };
        TransportConfig {
            tls,
            ..TransportConfig::default()
        }
    }
}

/// InfluxDB v2 write target.
#[derive(Debug, Clone)]
pub struct InfluxConfig {
    pub host: Url,
    pub org: String,
    pub bucket: String,
    pub token: SecretString,
}

/// What the poll loop does when a cycle fails.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, Display, EnumString,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum ErrorPolicy {
    /// Stop the loop and surface the error; the supervisor restarts us.
    #[default]
    Exit,
    /// Log the failure and wait for the next tick.
    Continue,
}

/// Poll loop tuning.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PollConfig {
    pub interval: Duration,
    pub measurement: String,
    pub on_error: ErrorPolicy,
}

impl Default for PollConfig {
    fn default() -> Self {
        Self {
            interval: DEFAULT_INTERVAL,
            measurement: DEFAULT_MEASUREMENT.into(),
            on_error: ErrorPolicy::default(),
        }
    }
}

/// Everything the binary needs to run.
#[derive(Debug, Clone)]
pub struct RuntimeConfig {
    pub gateway: GatewayConfig,
    pub sink: InfluxConfig,
    pub poll: PollConfig,
    /// Bind address of the debug reflector, if enabled.
    pub reflector: Option<SocketAddr>,
}
