// powerwall-api: Async Rust client for the energy gateway's local API

pub mod auth;
pub mod client;
pub mod endpoint;
pub mod error;
pub mod models;
pub mod transport;

pub use auth::{Credentials, LoginRequest};
pub use client::GatewayClient;
pub use endpoint::{API_ROOT, Endpoint};
pub use error::Error;
pub use models::{Aggregates, StateOfEnergy};
pub use transport::{TlsMode, TransportConfig};
