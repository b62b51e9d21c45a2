//! Error types for the Remember The Milk bridge.
//!
//! # Design
//! The taxonomy separates failures the caller can fix locally (missing
//! credentials, checked before any I/O) from failures of the network path
//! (`Transport`) and failures reported by the service itself (`RemoteApi`).
//! `MalformedResponse` covers a success envelope whose payload does not have
//! the shape an operation needs. A line without an id tag is not an error;
//! the decoder returns `None` for it.

use thiserror::Error;

/// Errors returned by `RtmClient` and the task model builder.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum RtmError {
    /// A required credential is empty. Raised before any request is built.
    #[error("missing credentials: {0}")]
    MissingCredentials(&'static str),

    /// The request never produced a usable HTTP response: connection or DNS
    /// failure, a non-2xx status, or a body that is not JSON.
    #[error("transport error: {0}")]
    Transport(String),

    /// The service answered with `rsp.stat == "fail"`.
    #[error("API error: {message}")]
    RemoteApi {
        code: Option<String>,
        message: String,
    },

    /// A success envelope lacks the payload the operation depends on.
    #[error("malformed response: {0}")]
    MalformedResponse(String),
}

impl RtmError {
    pub(crate) fn malformed(what: impl Into<String>) -> Self {
        RtmError::MalformedResponse(what.into())
    }
}
