//! Error types for the FusionAPI client.
//!
//! # Design
//! FusionAPI reports application failures in-band (`"error": true` inside a
//! normal JSON body), so those are never turned into `ApiError`; the caller
//! gets the response object and inspects it. `ApiError` only covers failures
//! that leave no usable JSON: transport problems, bodies that are not JSON,
//! and successful responses missing the one field the client must cache.

use std::fmt;

/// Errors returned by `FusionApp` parse methods and `FusionClient` calls.
#[derive(Debug)]
pub enum ApiError {
    /// The request never produced a response (DNS, connect, timeout, read).
    Transport(String),

    /// The server returned a non-2xx status and a body that is not JSON.
    HttpError { status: u16, body: String },

    /// A 2xx response body could not be parsed as JSON.
    DeserializationError(String),

    /// A response reported success but lacked a field the client needs.
    MissingField(&'static str),

    /// Client configuration could not be loaded.
    Config(String),
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ApiError::Transport(msg) => write!(f, "transport failed: {msg}"),
            ApiError::HttpError { status, body } => {
                write!(f, "HTTP {status}: {body}")
            }
            ApiError::DeserializationError(msg) => {
                write!(f, "deserialization failed: {msg}")
            }
            ApiError::MissingField(field) => {
                write!(f, "response is missing field `{field}`")
            }
            ApiError::Config(msg) => write!(f, "invalid configuration: {msg}"),
        }
    }
}

impl std::error::Error for ApiError {}
