use std::future::Future;
use std::time::Duration;

use reqwest::{header, Request, Response, StatusCode};
use tokio::time::sleep;

use crate::{RetryPolicy, TransportError};

/// Sends one prepared request. Implemented by [`reqwest::Client`]; tests
/// substitute scripted transports.
pub trait Transport: Send + Sync {
    fn send(&self, request: Request) -> impl Future<Output = reqwest::Result<Response>> + Send;
}

impl Transport for reqwest::Client {
    fn send(&self, request: Request) -> impl Future<Output = reqwest::Result<Response>> + Send {
        self.execute(request)
    }
}

/// Wraps a [`Transport`] with an attempt loop and bounded exponential backoff.
///
/// Without a policy the wrapper is pass-through: one attempt, and every
/// status is handed back as a normal response.
#[derive(Clone, Debug)]
pub struct RetryingTransport<T> {
    inner: T,
    policy: Option<RetryPolicy>,
}

impl<T: Transport> RetryingTransport<T> {
    pub fn new(inner: T, policy: Option<RetryPolicy>) -> Self {
        Self { inner, policy }
    }

    pub fn inner(&self) -> &T {
        &self.inner
    }

    pub fn policy(&self) -> Option<&RetryPolicy> {
        self.policy.as_ref()
    }

    /// Sends `request`, resending a fresh copy after each retryable failure.
    ///
    /// The request body must be buffered; a streaming body is sent once.
    pub async fn send(&self, request: Request) -> Result<Response, TransportError> {
        let Some(policy) = &self.policy else {
            return self
                .inner
                .send(request)
                .await
                .map_err(TransportError::Request);
        };

        let mut attempt = 0u32;
        loop {
            let Some(next) = request.try_clone() else {
                return self
                    .inner
                    .send(request)
                    .await
                    .map_err(TransportError::Request);
            };

            let delay = match self.inner.send(next).await {
                Ok(response) => {
                    let status = response.status();
                    if !should_retry_status(status) {
                        return Ok(response);
                    }
                    if attempt >= policy.max_attempts {
                        return Err(TransportError::RetriesExhausted {
                            attempts: attempt + 1,
                            status: status.as_u16(),
                        });
                    }
                    let (_, max) = policy.delay_bounds();
                    retry_after(&response)
                        .map(|delay| delay.min(max))
                        .unwrap_or_else(|| backoff_delay(policy, attempt))
                }
                Err(err) => {
                    if !should_retry_transport(&err) || attempt >= policy.max_attempts {
                        return Err(TransportError::Request(err));
                    }
                    backoff_delay(policy, attempt)
                }
            };

            #[cfg(feature = "tracing")]
            tracing::debug!(
                attempt = attempt + 1,
                delay_ms = delay.as_millis() as u64,
                "retrying request"
            );

            sleep(delay).await;
            attempt += 1;
        }
    }
}

/// Delay before retry number `attempt + 1`: `min * 2^attempt`, clamped to the policy bounds.
pub fn backoff_delay(policy: &RetryPolicy, attempt: u32) -> Duration {
    let (min, max) = policy.delay_bounds();
    let exp = attempt.min(16);
    min.saturating_mul(1u32 << exp).clamp(min, max)
}

/// 429 and server errors are retried, except 501 which will not change on resend.
pub fn should_retry_status(status: StatusCode) -> bool {
    status == StatusCode::TOO_MANY_REQUESTS
        || (status.is_server_error() && status != StatusCode::NOT_IMPLEMENTED)
}

pub fn should_retry_transport(err: &reqwest::Error) -> bool {
    !err.is_builder()
        && !err.is_redirect()
        && (err.is_timeout() || err.is_connect() || err.is_request() || err.is_body())
}

/// `Retry-After` in seconds, honored only on 429 and 503.
fn retry_after(response: &Response) -> Option<Duration> {
    if !matches!(
        response.status(),
        StatusCode::TOO_MANY_REQUESTS | StatusCode::SERVICE_UNAVAILABLE
    ) {
        return None;
    }
    let value = response.headers().get(header::RETRY_AFTER)?;
    let seconds = value.to_str().ok()?.trim().parse::<u64>().ok()?;
    Some(Duration::from_secs(seconds))
}
