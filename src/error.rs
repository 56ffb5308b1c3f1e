use std::time::Duration;

/// Error type returned by this crate.
#[derive(Debug, thiserror::Error)]
pub enum HttpExecError {
    /// The JSON body supplied by the caller is not valid JSON.
    #[error("malformed JSON body: {0}")]
    MalformedInput(#[source] serde_json::Error),
    /// The selected authentication mode is missing a required credential.
    #[error("invalid {mode} auth input: {field} must be provided")]
    InvalidAuthInput {
        mode: &'static str,
        field: &'static str,
    },
    /// Declarative auth tag that is neither `Bearer` nor `Basic`.
    #[error("unsupported auth type '{0}', expected Bearer or Basic")]
    UnsupportedAuthType(String),
    /// Method, URI or a header could not be turned into an outbound request.
    #[error("invalid request: {0}")]
    InvalidRequest(String),
    /// The call failed at the transport level after internal retries.
    #[error("transport error: {0}")]
    Transport(#[from] TransportError),
    /// A response arrived but its body could not be read to the end.
    #[error("response read error: {0}")]
    ResponseRead(#[source] reqwest::Error),
    /// A credential source could not obtain a token.
    #[error("token exchange failed: {0}")]
    TokenExchange(String),
}

/// Final transport-level outcome once the retry budget is spent.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// Connection, DNS, TLS or per-request error from `reqwest`.
    #[error("{0}")]
    Request(#[source] reqwest::Error),
    /// The server kept answering with a retryable status.
    #[error("giving up after {attempts} attempt(s), last status {status}")]
    RetriesExhausted { attempts: u32, status: u16 },
    /// The call-scoped timeout or caller deadline elapsed.
    #[error("call timed out after {0:?}")]
    Timeout(Duration),
}

impl HttpExecError {
    /// Returns `true` when the failure was produced by the call-scoped timeout.
    pub fn is_timeout(&self) -> bool {
        match self {
            Self::Transport(TransportError::Timeout(_)) => true,
            Self::Transport(TransportError::Request(err)) => err.is_timeout(),
            _ => false,
        }
    }
}
