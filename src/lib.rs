//! `httpexec` performs one declaratively described HTTP(S) call and returns
//! its status code and raw body.
//!
//! - [`Client::new`] turns a [`ClientConfig`] (TLS policy, call-scoped
//!   timeout, optional [`RetryPolicy`]) into a reusable client.
//! - [`Client::execute`] turns a [`RequestSpec`] into a [`ResponseResult`].
//!
//! Retries of transport failures and of 429/5xx responses happen inside the
//! client; callers only see the final outcome.

mod client;
mod error;
mod options;
mod request;

pub mod config;
pub mod credentials;
pub mod retry;

pub use client::Client;
pub use error::{HttpExecError, TransportError};
pub use options::{ClientConfig, RetryPolicy, DEFAULT_MAX_DELAY, DEFAULT_MIN_DELAY};
pub use request::{canonical_json, Auth, RequestSpec, ResponseResult};

pub type Result<T> = std::result::Result<T, HttpExecError>;
