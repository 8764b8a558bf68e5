//! The `error` module defines the error types used within the `wsrelay` application.
//!
//! None of these errors is fatal to a running relay: request errors are
//! answered on the originating connection and upstream errors are logged.
//! Only `RelayError` can stop the process, and only during startup.

use std::time::Duration;

use thiserror::Error;

/// Failure of a call into the upstream pub/sub backend.
#[derive(Debug, Error)]
pub enum UpstreamError {
    #[error("redis error: {0}")]
    Redis(#[from] redis::RedisError),

    #[error("upstream backend unavailable: {0}")]
    Unavailable(String),

    #[error("upstream call timed out after {0:?}")]
    Timeout(Duration),
}

/// A downstream payload that could not be turned into a request.
#[derive(Debug, Error)]
pub enum RequestError {
    /// Not valid JSON, or a field of the wrong type.
    #[error("malformed request: {0}")]
    Malformed(#[from] serde_json::Error),

    /// Valid JSON, but not an object.
    #[error("request is not a JSON object")]
    NotAnObject,

    /// Unknown or missing `action`, or a missing `channel`.
    #[error("invalid action: {0:?}")]
    InvalidAction(Option<String>),

    /// A `message` action without a `datum`.
    #[error("missing message content")]
    MissingContent,
}

/// Errors that stop the relay from starting or serving.
#[derive(Debug, Error)]
pub enum RelayError {
    #[error("configuration error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("failed to bind {addr}: {source}")]
    Bind {
        addr: String,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    Upstream(#[from] UpstreamError),

    #[error("unknown upstream backend {0:?}")]
    UnknownBackend(String),
}
