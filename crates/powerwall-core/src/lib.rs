// powerwall-core: poll loop, time-series sink, and debug reflector

pub mod config;
pub mod error;
pub mod poller;
pub mod reflector;
pub mod sink;

pub use config::{
    DEFAULT_INTERVAL, DEFAULT_MEASUREMENT, ErrorPolicy, GatewayConfig, InfluxConfig, PollConfig,
    RuntimeConfig, TlsVerification,
};
pub use error::CoreError;
pub use poller::Poller;
pub use reflector::{Reading, Reflector};
pub use sink::{FieldValue, InfluxSink, Point, Sink};

pub use powerwall_api as api;
