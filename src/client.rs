use std::fmt;

use tokio::time::{timeout_at, Instant};

use crate::{
    request::build_request,
    retry::RetryingTransport,
    ClientConfig, HttpExecError, RequestSpec, ResponseResult, Result, TransportError,
};

#[derive(Clone)]
/// Reusable HTTP client built from a [`ClientConfig`].
///
/// Cloning is cheap and clones share one connection pool, so a single client
/// can serve concurrent calls.
pub struct Client {
    transport: RetryingTransport<reqwest::Client>,
    config: ClientConfig,
}

impl fmt::Debug for Client {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Client")
            .field("config", &self.config)
            .finish()
    }
}

impl Client {
    /// Builds the transport: rustls with verification unless `verify_tls` is
    /// false, proxies from `HTTP_PROXY`/`HTTPS_PROXY`/`NO_PROXY`, and the
    /// retry decorator when a policy is set.
    ///
    /// Connections are opened lazily on the first call.
    pub fn new(config: ClientConfig) -> Result<Self> {
        let http = reqwest::Client::builder()
            .use_rustls_tls()
            .danger_accept_invalid_certs(!config.verify_tls)
            .build()
            .map_err(|err| HttpExecError::Transport(TransportError::Request(err)))?;

        #[cfg(feature = "tracing")]
        tracing::debug!(
            verify_tls = config.verify_tls,
            timeout_ms = config.timeout.as_millis() as u64,
            retries = config.retry.as_ref().map_or(0, |retry| retry.max_attempts),
            "built http client"
        );

        Ok(Self {
            transport: RetryingTransport::new(http, config.retry.clone()),
            config,
        })
    }

    /// Client with [`ClientConfig::default`]: TLS verified, no timeout, no retries.
    pub fn with_defaults() -> Result<Self> {
        Self::new(ClientConfig::default())
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Performs one call and captures its status and body.
    ///
    /// Every status code, 4xx and 5xx included, is returned as a
    /// [`ResponseResult`]; only input, transport and body-read failures are errors.
    pub async fn execute(&self, spec: &RequestSpec) -> Result<ResponseResult> {
        self.run(spec, None).await
    }

    /// Like [`Client::execute`], but also gives up at `deadline`.
    ///
    /// The earlier of `deadline` and the configured timeout applies.
    pub async fn execute_with_deadline(
        &self,
        spec: &RequestSpec,
        deadline: Instant,
    ) -> Result<ResponseResult> {
        self.run(spec, Some(deadline)).await
    }

    async fn run(&self, spec: &RequestSpec, deadline: Option<Instant>) -> Result<ResponseResult> {
        let request = build_request(self.transport.inner(), spec)?;

        let started = Instant::now();
        // A timeout too large to represent as an instant is no deadline at all.
        let configured = if self.config.timeout.is_zero() {
            None
        } else {
            started.checked_add(self.config.timeout)
        };
        let deadline = match (configured, deadline) {
            (Some(configured), Some(caller)) => Some(configured.min(caller)),
            (configured, caller) => configured.or(caller),
        };

        #[cfg(feature = "tracing")]
        tracing::debug!(method = %request.method(), uri = %request.url(), "dispatching request");

        let result = match deadline {
            None => self.dispatch(request).await,
            Some(deadline) => match timeout_at(deadline, self.dispatch(request)).await {
                Ok(result) => result,
                Err(_) => Err(TransportError::Timeout(started.elapsed()).into()),
            },
        };

        #[cfg(feature = "tracing")]
        match &result {
            Ok(response) => tracing::debug!(status = response.status_code, "request completed"),
            Err(err) => tracing::debug!(error = %err, "request failed"),
        }

        result
    }

    async fn dispatch(&self, request: reqwest::Request) -> Result<ResponseResult> {
        let response = self.transport.send(request).await?;
        let status = response.status();
        let body = response.bytes().await.map_err(HttpExecError::ResponseRead)?;

        Ok(ResponseResult {
            status_code: status.as_u16(),
            body: String::from_utf8_lossy(&body).into_owned(),
        })
    }
}
