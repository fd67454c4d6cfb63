// Typed endpoint descriptors
//
// Each response type names its own resource under the API root and knows
// how to decode its body. `GatewayClient::fetch` is generic over this pair.

use serde::de::DeserializeOwned;

use crate::error::Error;
use crate::models::{Aggregates, StateOfEnergy};

/// Root of every gateway API path.
pub const API_ROOT: &str = "/api";

/// Join a resource onto the API root: `meters/aggregates` -> `/api/meters/aggregates`.
pub fn api_path(resource: &str) -> String {
    format!("{API_ROOT}/{}", resource.trim_start_matches('/'))
}

/// A readable gateway resource and the shape of its response.
pub trait Endpoint: Sized {
    /// Resource path relative to [`API_ROOT`]. No parameters, no query.
    const RESOURCE: &'static str;

    /// Absolute path of the resource on the gateway.
    fn path() -> String {
        api_path(Self::RESOURCE)
    }

    /// Decode a 200 response body.
    fn decode(body: &[u8]) -> Result<Self, Error>;
}

fn decode_json<T: DeserializeOwned>(body: &[u8]) -> Result<T, Error> {
    serde_json::from_slice(body).map_err(|e| Error::deserialization(&e, body))
}

impl Endpoint for Aggregates {
    const RESOURCE: &'static str = "meters/aggregates";

    fn decode(body: &[u8]) -> Result<Self, Error> {
        decode_json(body)
    }
}

impl Endpoint for StateOfEnergy {
    const RESOURCE: &'static str = "system_status/soe";

    fn decode(body: &[u8]) -> Result<Self, Error> {
        decode_json(body)
    }
}
