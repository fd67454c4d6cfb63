// ── Time-series sink ──
//
// A `Point` is one measurement with a flat field map and a timestamp.
// `InfluxSink` writes points to an InfluxDB v2 bucket as line protocol.

use std::collections::BTreeMap;
use std::fmt::Write as _;
use std::future::Future;

use chrono::{DateTime, Utc};
use secrecy::ExposeSecret;
use serde_json::Value;
use tracing::debug;
use url::Url;

use powerwall_api::{Aggregates, StateOfEnergy};

use crate::config::InfluxConfig;
use crate::error::CoreError;

/// A single field value of a point.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    Float(f64),
    Bool(bool),
    String(String),
}

impl FieldValue {
    /// Convert a JSON scalar. Nulls and containers have no field form.
    ///
    /// Every JSON number becomes a float so a field never changes type
    /// between writes.
    pub fn from_json(value: &Value) -> Option<Self> {
        match value {
            Value::Number(n) => n.as_f64().map(Self::Float),
            Value::Bool(b) => Some(Self::Bool(*b)),
            Value::String(s) => Some(Self::String(s.clone())),
            Value::Null | Value::Array(_) | Value::Object(_) => None,
        }
    }
}

/// One time-series point.
#[derive(Debug, Clone, PartialEq)]
pub struct Point {
    pub measurement: String,
    pub fields: BTreeMap<String, FieldValue>,
    pub timestamp: DateTime<Utc>,
}

impl Point {
    /// All flattened aggregate fields. Null metrics are left out.
    pub fn from_aggregates(
        measurement: &str,
        aggregates: &Aggregates,
        timestamp: DateTime<Utc>,
    ) -> Self {
        let fields = aggregates
            .iter()
            .filter_map(|(key, value)| FieldValue::from_json(value).map(|v| (key.clone(), v)))
            .collect();
        Self {
            measurement: measurement.to_owned(),
            fields,
            timestamp,
        }
    }

    /// `{"percentage": <float>}`
    pub fn from_state_of_energy(
        measurement: &str,
        soe: StateOfEnergy,
        timestamp: DateTime<Utc>,
    ) -> Self {
        let mut fields = BTreeMap::new();
        fields.insert("percentage".to_owned(), FieldValue::Float(soe.percentage));
        Self {
            measurement: measurement.to_owned(),
            fields,
            timestamp,
        }
    }

    /// Render as one line of InfluxDB line protocol with a nanosecond
    /// timestamp.
    pub fn to_line_protocol(&self) -> Result<String, CoreError> {
        if self.fields.is_empty() {
            return Err(CoreError::SinkWrite {
                message: format!("point '{}' has no fields", self.measurement),
            });
        }
        let nanos = self.timestamp.timestamp_nanos_opt().ok_or_else(|| CoreError::SinkWrite {
            message: format!("timestamp {} out of range", self.timestamp),
        })?;

        single_line("measurement", &self.measurement)?;
        let mut line = escape(&self.measurement, &[',', ' ']);
        line.push(' ');

        for (i, (key, value)) in self.fields.iter().enumerate() {
            if i > 0 {
                line.push(',');
            }
            single_line("field key", key)?;
            line.push_str(&escape(key, &[',', '=', ' ']));
            line.push('=');
            match value {
                FieldValue::Float(f) if f.is_finite() => {
                    let _ = write!(line, "{f}");
                }
                FieldValue::Float(f) => {
                    return Err(CoreError::SinkWrite {
                        message: format!("field {key} is not finite: {f}"),
                    });
                }
                FieldValue::Bool(b) => {
                    let _ = write!(line, "{b}");
                }
                FieldValue::String(s) => {
                    single_line(key, s)?;
                    line.push('"');
                    line.push_str(&escape(s, &['"']));
                    line.push('"');
                }
            }
        }

        let _ = write!(line, " {nanos}");
        Ok(line)
    }
}

/// Line protocol has no escape for line breaks; one would split the record.
fn single_line(what: &str, text: &str) -> Result<(), CoreError> {
    if text.contains(['\n', '\r']) {
        return Err(CoreError::SinkWrite {
            message: format!("{what} contains a line break: {text:?}"),
        });
    }
    Ok(())
}

fn escape(raw: &str, special: &[char]) -> String {
    let mut out = String::with_capacity(raw.len());
    for c in raw.chars() {
        if c == '\\' || special.contains(&c) {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

/// Downstream time-series store.
pub trait Sink: Send + Sync {
    fn write(&self, point: &Point) -> impl Future<Output = Result<(), CoreError>> + Send;
}

/// Writes points to an InfluxDB v2 bucket over HTTP.
#[derive(Debug, Clone)]
pub struct InfluxSink {
    http: reqwest::Client,
    write_url: Url,
    token: secrecy::SecretString,
}

impl InfluxSink {
    pub fn new(config: &InfluxConfig) -> Result<Self, CoreError> {
        let http = reqwest::Client::builder()
            .user_agent(concat!("powerwall/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| CoreError::SinkWrite {
                message: format!("failed to build HTTP client: {e}"),
            })?;
        Self::with_client(http, config)
    }

    /// Use a pre-built `reqwest::Client`.
    pub fn with_client(http: reqwest::Client, config: &InfluxConfig) -> Result<Self, CoreError> {
        let base = config.host.as_str().trim_end_matches('/');
        let mut write_url =
            Url::parse(&format!("{base}/api/v2/write")).map_err(|e| CoreError::SinkWrite {
                message: format!("invalid sink host: {e}"),
            })?;
        write_url
            .query_pairs_mut()
            .append_pair("org", &config.org)
            .append_pair("bucket", &config.bucket)
            .append_pair("precision", "ns");

        Ok(Self {
            http,
            write_url,
            token: config.token.clone(),
        })
    }

    pub fn write_url(&self) -> &Url {
        &self.write_url
    }
}

impl Sink for InfluxSink {
    async fn write(&self, point: &Point) -> Result<(), CoreError> {
        let line = point.to_line_protocol()?;
        debug!(measurement = %point.measurement, fields = point.fields.len(), "writing point");

        let resp = self
            .http
            .post(self.write_url.clone())
            .header(
                reqwest::header::AUTHORIZATION,
                format!("Token {}", self.token.expose_secret()),
            )
            .header(reqwest::header::CONTENT_TYPE, "text/plain; charset=utf-8")
            .body(line)
            .send()
            .await
            .map_err(|e| CoreError::SinkWrite {
                message: e.to_string(),
            })?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(CoreError::SinkWrite {
                message: format!("HTTP {status}: {body}"),
            });
        }
        Ok(())
    }
}
