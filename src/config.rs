//! Declarative configuration blocks and their conversion into
//! [`ClientConfig`] and [`RequestSpec`].

use std::collections::BTreeMap;
use std::time::Duration;

use serde::Deserialize;

use crate::{
    credentials::Auth0Credentials, Auth, ClientConfig, HttpExecError, RequestSpec, Result,
    RetryPolicy,
};

/// Client-level settings as they appear in configuration files.
#[derive(Clone, Debug, Default, Deserialize, Eq, PartialEq)]
pub struct ProviderConfig {
    #[serde(default)]
    pub disable_tls: Option<bool>,
    /// Timeout in milliseconds; zero or negative means no timeout.
    #[serde(default)]
    pub timeout_ms: Option<i64>,
    #[serde(default)]
    pub retry: Option<RetryBlock>,
    /// Credentials handed to [`Auth0Credentials::fetch_token`] by whoever loads this block.
    #[serde(default)]
    pub auth0: Option<Auth0Credentials>,
}

#[derive(Clone, Debug, Default, Deserialize, Eq, PartialEq)]
pub struct RetryBlock {
    /// Retries after the first attempt. `2` means up to three attempts.
    #[serde(default)]
    pub retry_attempts: Option<i64>,
    #[serde(default)]
    pub min_delay_ms: Option<i64>,
    #[serde(default)]
    pub max_delay_ms: Option<i64>,
}

impl ProviderConfig {
    /// Reads settings from `HTTPEXEC_*` environment variables.
    ///
    /// Recognized: `HTTPEXEC_DISABLE_TLS`, `HTTPEXEC_TIMEOUT_MS`,
    /// `HTTPEXEC_RETRY_ATTEMPTS`, `HTTPEXEC_RETRY_MIN_DELAY_MS` and
    /// `HTTPEXEC_RETRY_MAX_DELAY_MS`. The retry block is present when any
    /// retry variable is set. Credentials are never read from the environment.
    pub fn from_env() -> std::result::Result<Self, String> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup<F>(lookup: F) -> std::result::Result<Self, String>
    where
        F: Fn(&str) -> Option<String>,
    {
        let int = |key: &str| -> std::result::Result<Option<i64>, String> {
            match lookup(key) {
                Some(raw) if !raw.trim().is_empty() => raw
                    .trim()
                    .parse::<i64>()
                    .map(Some)
                    .map_err(|err| format!("{key} must be an integer: {err}")),
                _ => Ok(None),
            }
        };

        let disable_tls = match lookup("HTTPEXEC_DISABLE_TLS") {
            Some(raw) if !raw.trim().is_empty() => Some(
                raw.trim()
                    .parse::<bool>()
                    .map_err(|_| {
                        format!("HTTPEXEC_DISABLE_TLS must be true or false, got '{raw}'")
                    })?,
            ),
            _ => None,
        };

        let retry = RetryBlock {
            retry_attempts: int("HTTPEXEC_RETRY_ATTEMPTS")?,
            min_delay_ms: int("HTTPEXEC_RETRY_MIN_DELAY_MS")?,
            max_delay_ms: int("HTTPEXEC_RETRY_MAX_DELAY_MS")?,
        };

        Ok(Self {
            disable_tls,
            timeout_ms: int("HTTPEXEC_TIMEOUT_MS")?,
            retry: (retry != RetryBlock::default()).then_some(retry),
            auth0: None,
        })
    }

    /// Converts to a [`ClientConfig`], clamping negative values instead of failing.
    pub fn client_config(&self) -> ClientConfig {
        ClientConfig {
            verify_tls: !self.disable_tls.unwrap_or(false),
            timeout: millis(self.timeout_ms).unwrap_or(Duration::ZERO),
            retry: self.retry.as_ref().map(RetryBlock::policy),
        }
    }
}

impl RetryBlock {
    fn policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_attempts: self
                .retry_attempts
                .map_or(0, |attempts| attempts.clamp(0, i64::from(u32::MAX)) as u32),
            min_delay: millis(self.min_delay_ms),
            max_delay: millis(self.max_delay_ms),
        }
    }
}

/// Negative values count as unset.
fn millis(value: Option<i64>) -> Option<Duration> {
    value
        .and_then(|ms| u64::try_from(ms).ok())
        .map(Duration::from_millis)
}

/// One request as it appears in configuration files.
#[derive(Clone, Default, Deserialize, Eq, PartialEq)]
pub struct RequestConfig {
    pub uri: String,
    pub http_method: String,
    /// JSON text; an empty string means no body.
    #[serde(default)]
    pub json: Option<String>,
    /// `Bearer`, `Basic`, or absent/empty for no authentication.
    #[serde(default)]
    pub auth_type: Option<String>,
    #[serde(default)]
    pub bearer_token: Option<String>,
    #[serde(default)]
    pub basic_auth_username: Option<String>,
    #[serde(default)]
    pub basic_auth_password: Option<String>,
    #[serde(default)]
    pub headers: Option<BTreeMap<String, String>>,
}

impl std::fmt::Debug for RequestConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RequestConfig")
            .field("uri", &self.uri)
            .field("http_method", &self.http_method)
            .field("json", &self.json)
            .field("auth_type", &self.auth_type)
            .field("basic_auth_username", &self.basic_auth_username)
            .field("headers", &self.headers)
            .finish_non_exhaustive()
    }
}

impl RequestConfig {
    /// Converts to a [`RequestSpec`].
    ///
    /// Unknown `auth_type` tags fail with [`HttpExecError::UnsupportedAuthType`];
    /// missing credentials for a known tag are left for [`Auth::validate`].
    pub fn request_spec(&self) -> Result<RequestSpec> {
        Ok(RequestSpec {
            method: self.http_method.clone(),
            uri: self.uri.clone(),
            json_body: self.json.clone().filter(|body| !body.is_empty()),
            headers: self.headers.clone().unwrap_or_default(),
            auth: self.auth()?,
        })
    }

    fn auth(&self) -> Result<Auth> {
        let owned = |value: &Option<String>| value.clone().unwrap_or_default();
        match self.auth_type.as_deref().map(str::trim) {
            None | Some("") => Ok(Auth::None),
            Some(tag) if tag.eq_ignore_ascii_case("bearer") => {
                Ok(Auth::bearer(owned(&self.bearer_token)))
            }
            Some(tag) if tag.eq_ignore_ascii_case("basic") => Ok(Auth::basic(
                owned(&self.basic_auth_username),
                owned(&self.basic_auth_password),
            )),
            Some(tag) => Err(HttpExecError::UnsupportedAuthType(tag.to_owned())),
        }
    }
}
