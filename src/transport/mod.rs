//! Transport seam between the session layer and the concrete HTTP stack.
//!
//! The executor and solver never talk to `reqwest` directly; they hand a
//! [`PreparedRequest`] to a [`Transport`] and get a [`RawResponse`] back.
//! Production code uses the reqwest-backed implementation; tests inject
//! scripted transports through the same trait.

mod reqwest_client;

pub use reqwest_client::{ReqwestTransport, ReqwestTransportFactory};

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use http::{HeaderMap, Method};
use serde_json::Value;
use thiserror::Error;
use url::Url;

use crate::session::ProxyBinding;

/// One fully-resolved outbound request.
#[derive(Debug, Clone)]
pub struct PreparedRequest {
    pub method: Method,
    pub url: Url,
    pub headers: HashMap<String, String>,
    pub json: Option<Value>,
    pub query: Vec<(String, String)>,
    /// Rendered `Cookie` header, when the jar has anything to send.
    pub cookie_header: Option<String>,
    pub allow_redirects: bool,
}

/// Minimal response representation returned by the transport.
#[derive(Debug, Clone)]
pub struct RawResponse {
    pub status: u16,
    pub headers: HeaderMap,
    /// Name/value pairs parsed from `Set-Cookie` headers.
    pub set_cookies: Vec<(String, String)>,
    pub body: Bytes,
    pub url: Url,
}

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("http transport error: {0}")]
    Transport(String),
    #[error("invalid header '{0}'")]
    InvalidHeader(String),
    #[error("failed to build transport: {0}")]
    Build(String),
}

/// Contract that abstracts the underlying HTTP stack.
///
/// Implementations must be stateless with respect to cookies; the session
/// layer owns the jar and renders the `Cookie` header itself.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn execute(&self, request: PreparedRequest) -> Result<RawResponse, TransportError>;
}

/// Builds one transport per session, bound to its proxy and timeout.
pub trait TransportFactory: Send + Sync {
    fn build(
        &self,
        default_headers: &HashMap<String, String>,
        proxy: Option<&ProxyBinding>,
        timeout: Duration,
    ) -> Result<Arc<dyn Transport>, TransportError>;
}
