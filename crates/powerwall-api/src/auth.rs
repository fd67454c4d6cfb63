// Gateway session authentication
//
// Cookie-based login. The login endpoint sets a session cookie in the
// client's jar; subsequent requests carry it automatically.

use std::fmt;

use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::client::GatewayClient;
use crate::endpoint::api_path;
use crate::error::Error;

/// Account name the gateway expects for customer logins.
pub const USERNAME: &str = "customer";

/// The gateway stops the site manager when this is `true`. Never set.
pub const FORCE_SM_OFF: bool = false;

/// Login resource, relative to the API root.
pub const LOGIN_RESOURCE: &str = "login/Basic";

/// Credentials for authenticating with the gateway.
///
/// Consumed by [`GatewayClient::login`]; nothing keeps them once the
/// session cookie is in the jar.
#[derive(Debug, Clone)]
pub struct Credentials {
    email: String,
    password: SecretString,
}

impl Credentials {
    pub fn new(email: impl Into<String>, password: SecretString) -> Self {
        Self {
            email: email.into(),
            password,
        }
    }

    pub fn email(&self) -> &str {
        &self.email
    }

    /// Build the JSON body for `POST /api/login/Basic`.
    pub fn login_request(&self) -> LoginRequest {
        LoginRequest::new(&self.email, self.password.expose_secret())
    }
}

/// Wire body of the login request.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
    pub email: String,
    pub force_sm_off: bool,
}

impl LoginRequest {
    pub fn new(email: &str, password: &str) -> Self {
        Self {
            username: USERNAME.to_owned(),
            password: password.to_owned(),
            email: email.to_owned(),
            force_sm_off: FORCE_SM_OFF,
        }
    }

    /// `/api/login/Basic`
    pub fn path() -> String {
        api_path(LOGIN_RESOURCE)
    }
}

impl fmt::Debug for LoginRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LoginRequest")
            .field("username", &self.username)
            .field("password", &"[REDACTED]")
            .field("email", &self.email)
            .field("force_sm_off", &self.force_sm_off)
            .finish()
    }
}

impl GatewayClient {
    /// Authenticate with the gateway.
    ///
    /// `POST /api/login/Basic`. Only HTTP 200 counts as success; any other
    /// status is an [`Error::Authentication`] carrying the response body.
    pub async fn login(&self, credentials: Credentials) -> Result<(), Error> {
        let url = self.api_url(&LoginRequest::path())?;
        debug!(email = credentials.email(), "logging in at {}", url);

        let body = credentials.login_request();
        drop(credentials);

        let resp = self
            .http()
            .post(url)
            .json(&body)
            .send()
            .await
            .map_err(Error::Connection)?;

        let status = resp.status();
        if status != reqwest::StatusCode::OK {
            let body = resp.text().await.unwrap_or_default();
            return Err(Error::Authentication {
                message: format!("login failed (HTTP {status}): {body}"),
            });
        }

        debug!("login successful");
        Ok(())
    }
}
