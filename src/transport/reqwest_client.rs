//! Reqwest-based implementation of the [`Transport`] trait.
//!
//! Provides a thin adapter around `reqwest::Client` that converts between the
//! shared HTTP representations used by the session core and the concrete
//! transport. Redirects default to disabled so callers observe 30x responses;
//! a sibling client with redirects enabled serves requests that opt in.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use http::header::SET_COOKIE;
use reqwest::redirect::Policy;
use reqwest::{Client, ClientBuilder};

use super::{PreparedRequest, RawResponse, Transport, TransportError, TransportFactory};
use crate::session::ProxyBinding;

/// Reqwest-backed transport bound to one session's identity and proxy.
pub struct ReqwestTransport {
    client: Client,
    redirecting_client: Client,
}

impl ReqwestTransport {
    fn build(
        default_headers: &HashMap<String, String>,
        proxy: Option<&ProxyBinding>,
        timeout: Duration,
    ) -> Result<Self, TransportError> {
        let headers = convert_headers(default_headers)?;

        let configure = |policy: Policy| -> Result<Client, TransportError> {
            let mut builder: ClientBuilder = Client::builder()
                .redirect(policy)
                .default_headers(headers.clone())
                .timeout(timeout);
            if let Some(binding) = proxy {
                let proxy = reqwest::Proxy::all(&binding.endpoint)
                    .map_err(|err| TransportError::Build(err.to_string()))?;
                builder = builder.proxy(proxy);
            }
            builder
                .build()
                .map_err(|err| TransportError::Build(err.to_string()))
        };

        Ok(Self {
            client: configure(Policy::none())?,
            redirecting_client: configure(Policy::default())?,
        })
    }
}

#[async_trait]
impl Transport for ReqwestTransport {
    async fn execute(&self, request: PreparedRequest) -> Result<RawResponse, TransportError> {
        let client = if request.allow_redirects {
            &self.redirecting_client
        } else {
            &self.client
        };

        let mut builder = client
            .request(request.method.clone(), request.url.clone())
            .headers(convert_headers(&request.headers)?);

        if !request.query.is_empty() {
            builder = builder.query(&request.query);
        }
        if let Some(ref body) = request.json {
            builder = builder.json(body);
        }
        if let Some(ref cookie) = request.cookie_header {
            builder = builder.header(http::header::COOKIE, cookie.as_str());
        }

        let response = builder
            .send()
            .await
            .map_err(|err| TransportError::Transport(err.to_string()))?;

        let status = response.status().as_u16();
        let headers = response.headers().clone();
        let set_cookies = parse_set_cookies(&headers);
        let url = response.url().clone();
        let body = response
            .bytes()
            .await
            .map_err(|err| TransportError::Transport(err.to_string()))?;

        Ok(RawResponse {
            status,
            headers,
            set_cookies,
            body,
            url,
        })
    }
}

/// Factory producing reqwest transports for fresh sessions.
#[derive(Debug, Default, Clone, Copy)]
pub struct ReqwestTransportFactory;

impl ReqwestTransportFactory {
    pub fn new() -> Self {
        Self
    }
}

impl TransportFactory for ReqwestTransportFactory {
    fn build(
        &self,
        default_headers: &HashMap<String, String>,
        proxy: Option<&ProxyBinding>,
        timeout: Duration,
    ) -> Result<Arc<dyn Transport>, TransportError> {
        Ok(Arc::new(ReqwestTransport::build(
            default_headers,
            proxy,
            timeout,
        )?))
    }
}

fn convert_headers(
    headers: &HashMap<String, String>,
) -> Result<http::HeaderMap, TransportError> {
    let mut map = http::HeaderMap::new();
    for (name, value) in headers {
        let header_name = http::HeaderName::from_bytes(name.as_bytes())
            .map_err(|_| TransportError::InvalidHeader(name.clone()))?;
        let header_value = http::HeaderValue::from_str(value)
            .map_err(|_| TransportError::InvalidHeader(name.clone()))?;
        map.insert(header_name, header_value);
    }
    Ok(map)
}

fn parse_set_cookies(headers: &http::HeaderMap) -> Vec<(String, String)> {
    headers
        .get_all(SET_COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .filter_map(|raw| {
            // Only the leading name=value pair matters; attributes are dropped.
            let pair = raw.split(';').next()?;
            let (name, value) = pair.split_once('=')?;
            let name = name.trim();
            if name.is_empty() {
                return None;
            }
            Some((name.to_string(), value.trim().to_string()))
        })
        .collect()
}
