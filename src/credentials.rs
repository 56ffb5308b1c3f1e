//! Credential sources that produce tokens for [`Auth::Bearer`].
//!
//! Credentials are passed in explicitly and live as long as the value that
//! holds them; nothing is read from or written to the process environment.

use std::fmt;

use serde::Deserialize;
use serde_json::json;

use crate::{Auth, Client, HttpExecError, RequestSpec, Result};

/// Auth0 machine-to-machine application credentials.
#[derive(Clone, Deserialize, Eq, PartialEq)]
pub struct Auth0Credentials {
    pub client_id: String,
    pub client_secret: String,
    /// Tenant URL, e.g. `https://tenant.auth0.com`.
    pub domain: String,
}

impl fmt::Debug for Auth0Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Auth0Credentials")
            .field("client_id", &self.client_id)
            .field("client_secret", &"<redacted>")
            .field("domain", &self.domain)
            .finish()
    }
}

#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
}

impl Auth0Credentials {
    pub fn new(
        client_id: impl Into<String>,
        client_secret: impl Into<String>,
        domain: impl Into<String>,
    ) -> Self {
        Self {
            client_id: client_id.into(),
            client_secret: client_secret.into(),
            domain: domain.into(),
        }
    }

    fn token_url(&self) -> String {
        format!("{}/oauth/token", self.domain.trim().trim_end_matches('/'))
    }

    /// Exchanges the credentials for an access token via the client-credentials grant.
    pub async fn fetch_token(&self, client: &Client, audience: &str) -> Result<String> {
        for (field, value) in [
            ("client_id", self.client_id.as_str()),
            ("client_secret", self.client_secret.as_str()),
            ("domain", self.domain.as_str()),
            ("audience", audience),
        ] {
            if value.trim().is_empty() {
                return Err(HttpExecError::InvalidAuthInput {
                    mode: "Auth0",
                    field,
                });
            }
        }

        let payload = json!({
            "client_id": self.client_id,
            "client_secret": self.client_secret,
            "audience": audience,
            "grant_type": "client_credentials",
        });

        let response = client
            .execute(&RequestSpec::new("POST", self.token_url()).with_json(payload.to_string()))
            .await?;

        if !(200..300).contains(&response.status_code) {
            return Err(HttpExecError::TokenExchange(format!(
                "auth0 returned status {}: {}",
                response.status_code, response.body
            )));
        }

        let token: TokenResponse = serde_json::from_str(&response.body).map_err(|err| {
            HttpExecError::TokenExchange(format!("invalid auth0 token response: {err}"))
        })?;
        if token.access_token.is_empty() {
            return Err(HttpExecError::TokenExchange(
                "auth0 token response has an empty access_token".to_owned(),
            ));
        }

        #[cfg(feature = "tracing")]
        tracing::debug!(audience, "fetched auth0 access token");

        Ok(token.access_token)
    }

    /// Fetches a token and wraps it as [`Auth::Bearer`].
    pub async fn bearer_auth(&self, client: &Client, audience: &str) -> Result<Auth> {
        self.fetch_token(client, audience).await.map(Auth::bearer)
    }
}
