// Gateway HTTP client
//
// Wraps `reqwest::Client` with gateway URL construction, the session
// cookie jar, and typed endpoint fetches. Login lives in `auth.rs` as an
// inherent method to keep this module focused on transport mechanics.

use std::sync::Arc;

use reqwest::cookie::{CookieStore, Jar};
use secrecy::SecretString;
use tracing::{debug, info};
use url::Url;

use crate::auth::Credentials;
use crate::endpoint::Endpoint;
use crate::error::Error;
use crate::models::{Aggregates, StateOfEnergy};
use crate::transport::TransportConfig;

/// Authenticated session against a single gateway.
///
/// Nothing is mutated after login apart from the cookie jar, which
/// `reqwest` synchronizes internally, so a session can be shared
/// across tasks behind an `Arc`.
#[derive(Debug)]
pub struct GatewayClient {
    http: reqwest::Client,
    base_url: Url,
    /// Cookie jar reference for inspecting the session cookie.
    cookie_jar: Option<Arc<Jar>>,
}

impl GatewayClient {
    /// Build a client and log in with the default gateway transport.
    pub async fn open(
        base_url: Url,
        email: impl Into<String>,
        password: SecretString,
    ) -> Result<Self, Error> {
        Self::connect(
            base_url,
            Credentials::new(email, password),
            &TransportConfig::default(),
        )
        .await
    }

    /// Build a client from `transport` and log in.
    pub async fn connect(
        base_url: Url,
        credentials: Credentials,
        transport: &TransportConfig,
    ) -> Result<Self, Error> {
        let client = Self::new(base_url, transport)?;
        client.login(credentials).await?;
        info!(gateway = %client.base_url, "gateway session established");
        Ok(client)
    }

    /// Create an unauthenticated client from a `TransportConfig`.
    ///
    /// A cookie jar is added if the config doesn't carry one; the session
    /// only works with cookies.
    pub fn new(base_url: Url, transport: &TransportConfig) -> Result<Self, Error> {
        let config = if transport.cookie_jar.is_some() {
            transport.clone()
        } else {
            transport.clone().with_cookie_jar()
        };
        let cookie_jar = config.cookie_jar.clone();
        let http = config.build_client()?;
        Ok(Self {
            http,
            base_url,
            cookie_jar,
        })
    }

    /// Create a client around a pre-built `reqwest::Client`.
    pub fn with_client(http: reqwest::Client, base_url: Url) -> Self {
        Self {
            http,
            base_url,
            cookie_jar: None,
        }
    }

    /// The underlying HTTP client (for auth flows that need direct access).
    pub fn http(&self) -> &reqwest::Client {
        &self.http
    }

    /// The gateway base URL.
    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// The `Cookie` header the jar would send to the gateway, if any.
    pub fn cookie_header(&self) -> Option<String> {
        let jar = self.cookie_jar.as_ref()?;
        let cookies = jar.cookies(&self.base_url)?;
        cookies.to_str().ok().map(String::from)
    }

    /// `{base}{path}` with any trailing slash on the base removed.
    pub(crate) fn api_url(&self, path: &str) -> Result<Url, Error> {
        let base = self.base_url.as_str().trim_end_matches('/');
        Url::parse(&format!("{base}{path}")).map_err(Error::InvalidUrl)
    }

    // ── Endpoints ────────────────────────────────────────────────────

    /// GET an endpoint and decode its response.
    ///
    /// Only HTTP 200 is accepted; anything else is an [`Error::Fetch`]
    /// carrying the response body.
    pub async fn fetch<E: Endpoint>(&self) -> Result<E, Error> {
        let path = E::path();
        let url = self.api_url(&path)?;
        debug!("GET {}", url);

        let resp = self.http.get(url).send().await.map_err(Error::Connection)?;

        let status = resp.status();
        if status != reqwest::StatusCode::OK {
            let body = resp.text().await.unwrap_or_default();
            return Err(Error::Fetch {
                path,
                status: status.as_u16(),
                message: body,
            });
        }

        let body = resp.bytes().await.map_err(Error::Connection)?;
        E::decode(&body)
    }

    /// `GET /api/meters/aggregates`
    pub async fn aggregates(&self) -> Result<Aggregates, Error> {
        self.fetch().await
    }

    /// `GET /api/system_status/soe`
    pub async fn state_of_energy(&self) -> Result<StateOfEnergy, Error> {
        self.fetch().await
    }
}
