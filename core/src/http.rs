//! HTTP transport types for the host-does-IO pattern.
//!
//! # Design
//! Requests and responses are plain data. `RtmClient` builds an
//! `HttpRequest` and parses an `HttpResponse` without touching the network;
//! a `Transport` sits between the two. Hosts that own their own HTTP stack
//! (an editor runtime, the C FFI) execute the request themselves and hand
//! the response back. `UreqTransport` is the in-process default.
//!
//! The service only accepts GET with everything in the query string, so a
//! request is fully described by its URL.

use tracing::debug;

use crate::error::RtmError;

/// A signed GET request described as plain data.
///
/// `params` holds the exact query pairs encoded into `url`, in wire order,
/// with `api_sig` last.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpRequest {
    pub url: String,
    pub params: Vec<(String, String)>,
}

impl HttpRequest {
    /// Value of a query parameter, if present.
    pub fn param(&self, key: &str) -> Option<&str> {
        self.params
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }
}

/// An HTTP response described as plain data.
#[derive(Debug, Clone)]
pub struct HttpResponse {
    pub status: u16,
    pub body: String,
}

/// Executes a built request against the network.
///
/// Implementations report only transport-level failures; status codes are
/// returned as data and interpreted by `RtmClient::parse_envelope`.
pub trait Transport {
    fn execute(&self, request: &HttpRequest) -> Result<HttpResponse, RtmError>;
}

/// Blocking transport backed by `ureq`.
#[derive(Debug, Clone)]
pub struct UreqTransport {
    agent: ureq::Agent,
}

impl UreqTransport {
    pub fn new() -> Self {
        let agent = ureq::Agent::config_builder()
            .http_status_as_error(false)
            .build()
            .new_agent();
        Self { agent }
    }
}

impl Default for UreqTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl Transport for UreqTransport {
    fn execute(&self, request: &HttpRequest) -> Result<HttpResponse, RtmError> {
        let mut response = self
            .agent
            .get(&request.url)
            .call()
            .map_err(|e| RtmError::Transport(e.to_string()))?;

        let status = response.status().as_u16();
        let body = response
            .body_mut()
            .read_to_string()
            .map_err(|e| RtmError::Transport(e.to_string()))?;
        debug!(status, bytes = body.len(), "received response");

        Ok(HttpResponse { status, body })
    }
}
