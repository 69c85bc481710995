//! Request execution with retry, pacing, and response classification.
//!
//! One [`RequestExecutor`] drives one workflow's traffic: it rotates the
//! underlying session when its budget is spent, paces requests with a
//! half-normal delay, infers the `Referer` from the last contacted URL, and
//! retries transport or classified HTTP failures with exponential backoff.
//! Semantic failures inside 2xx bodies are detected by [`verify_body`] and
//! are deliberately outside the retry loop.

use std::collections::HashMap;
use std::time::Duration;

use bytes::Bytes;
use http::{HeaderMap, Method};
use rand::Rng;
use rand_distr::{Distribution, Normal};
use serde::de::DeserializeOwned;
use serde_json::Value;
use thiserror::Error;
use tokio::time::sleep;
use url::Url;

use crate::config::HumanDelayProfile;
use crate::session::{SessionError, SessionManager};
use crate::transport::{PreparedRequest, RawResponse, TransportError};

/// Methods the upstream services are driven with.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HttpMethod {
    Get,
    Post,
    Patch,
    Options,
}

impl HttpMethod {
    pub fn as_method(&self) -> Method {
        match self {
            HttpMethod::Get => Method::GET,
            HttpMethod::Post => Method::POST,
            HttpMethod::Patch => Method::PATCH,
            HttpMethod::Options => Method::OPTIONS,
        }
    }
}

/// One logical request. Built once, consumed by [`RequestExecutor::send`].
#[derive(Debug, Clone)]
pub struct RequestSpec {
    pub method: HttpMethod,
    pub url: Url,
    pub json: Option<Value>,
    pub query: Vec<(String, String)>,
    pub headers: HashMap<String, String>,
    pub cookies: HashMap<String, String>,
    pub verify: bool,
    pub max_retries: u32,
    pub retry_delay: Duration,
    pub allow_redirects: bool,
}

impl RequestSpec {
    pub fn new(method: HttpMethod, url: Url) -> Self {
        Self {
            method,
            url,
            json: None,
            query: Vec::new(),
            headers: HashMap::new(),
            cookies: HashMap::new(),
            verify: true,
            max_retries: 3,
            retry_delay: Duration::from_secs(3),
            allow_redirects: false,
        }
    }

    pub fn with_json(mut self, body: Value) -> Self {
        self.json = Some(body);
        self
    }

    pub fn with_query(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.push((key.into(), value.into()));
        self
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name.into(), value.into());
        self
    }

    pub fn with_cookie(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.cookies.insert(name.into(), value.into());
        self
    }

    /// Skip status classification; the caller inspects the raw status itself.
    pub fn with_verify(mut self, verify: bool) -> Self {
        self.verify = verify;
        self
    }

    pub fn with_retries(mut self, max_retries: u32, retry_delay: Duration) -> Self {
        self.max_retries = max_retries;
        self.retry_delay = retry_delay;
        self
    }

    pub fn with_redirects(mut self, allow: bool) -> Self {
        self.allow_redirects = allow;
        self
    }
}

/// Read-only response handed back to workflows.
#[derive(Debug, Clone)]
pub struct ApiResponse {
    status: u16,
    headers: HeaderMap,
    cookies: Vec<(String, String)>,
    body: Bytes,
    url: Url,
}

impl ApiResponse {
    fn from_raw(raw: RawResponse) -> Self {
        Self {
            status: raw.status,
            headers: raw.headers,
            cookies: raw.set_cookies,
            body: raw.body,
            url: raw.url,
        }
    }

    pub fn status(&self) -> u16 {
        self.status
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    /// Cookies the response set, as name/value pairs.
    pub fn cookies(&self) -> &[(String, String)] {
        &self.cookies
    }

    pub fn url(&self) -> &Url {
        &self.url
    }

    pub fn bytes(&self) -> &Bytes {
        &self.body
    }

    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }

    pub fn json_value(&self) -> Result<Value, RequestError> {
        Ok(serde_json::from_slice(&self.body)?)
    }

    pub fn json<T: DeserializeOwned>(&self) -> Result<T, RequestError> {
        Ok(serde_json::from_slice(&self.body)?)
    }

    /// Parse the body and run the semantic failure pass over it.
    pub fn verified_json(&self) -> Result<Value, RequestError> {
        let body = self.json_value()?;
        verify_body(&body)?;
        Ok(body)
    }
}

/// Failures surfaced by the executor.
#[derive(Debug, Error)]
pub enum RequestError {
    #[error("transport failure: {0}")]
    Transport(#[from] TransportError),
    #[error("session is rate limited")]
    RateLimited,
    #[error("server error - {0}")]
    Server(u16),
    #[error("api returned an error: {0}")]
    Api(Value),
    #[error("session error: {0}")]
    Session(#[from] SessionError),
    #[error("response body is not valid json: {0}")]
    Json(#[from] serde_json::Error),
}

impl RequestError {
    /// Transport and classified-HTTP failures are retried transparently;
    /// semantic failures never are.
    fn is_retryable(&self) -> bool {
        matches!(
            self,
            RequestError::Transport(_) | RequestError::RateLimited | RequestError::Server(_)
        )
    }
}

/// Drives one workflow's requests through a rotating session.
pub struct RequestExecutor {
    sessions: SessionManager,
    delay: HumanDelayProfile,
    last_url: Option<Url>,
}

impl RequestExecutor {
    pub fn new(sessions: SessionManager, delay: HumanDelayProfile) -> Self {
        Self {
            sessions,
            delay,
            last_url: None,
        }
    }

    pub fn sessions(&self) -> &SessionManager {
        &self.sessions
    }

    /// Last URL a response was obtained from, successful or not.
    pub fn last_url(&self) -> Option<&Url> {
        self.last_url.as_ref()
    }

    /// Send one logical request, retrying retryable failures with
    /// exponential backoff (`retry_delay * 2^attempt`). Exhausting the retry
    /// budget re-raises the last error.
    pub async fn send(&mut self, spec: RequestSpec) -> Result<ApiResponse, RequestError> {
        self.sessions.rotate_if_needed()?;
        self.human_delay().await;

        let headers = self.merged_headers(&spec);
        let attempts = spec.max_retries.max(1);
        let mut last_error = None;

        for attempt in 0..attempts {
            match self.attempt(&spec, &headers).await {
                Ok(response) => return Ok(response),
                Err(error) => {
                    if !error.is_retryable() || attempt + 1 == attempts {
                        return Err(error);
                    }
                    let backoff = spec.retry_delay * 2u32.pow(attempt);
                    log::debug!(
                        "request to {} failed ({error}), retrying in {:?} (attempt {}/{attempts})",
                        spec.url,
                        backoff,
                        attempt + 1
                    );
                    last_error = Some(error);
                    sleep(backoff).await;
                }
            }
        }

        // Unreachable: the loop always returns on its final attempt.
        Err(last_error.unwrap_or(RequestError::Server(0)))
    }

    async fn attempt(
        &mut self,
        spec: &RequestSpec,
        headers: &HashMap<String, String>,
    ) -> Result<ApiResponse, RequestError> {
        let prepared = PreparedRequest {
            method: spec.method.as_method(),
            url: spec.url.clone(),
            headers: headers.clone(),
            json: spec.json.clone(),
            query: spec.query.clone(),
            cookie_header: self.sessions.cookie_header(&spec.cookies),
            allow_redirects: spec.allow_redirects,
        };

        let transport = self.sessions.session().transport().clone();
        let raw = transport.execute(prepared).await?;

        // The contact is recorded even when classification fails below, so
        // the next request's referer reflects what was actually reached.
        self.sessions.absorb_cookies(&raw);
        self.last_url = Some(spec.url.clone());

        if spec.verify {
            if raw.status == 403 {
                return Err(RequestError::RateLimited);
            }
            if matches!(raw.status, 500 | 502 | 503 | 504) {
                return Err(RequestError::Server(raw.status));
            }
        }

        Ok(ApiResponse::from_raw(raw))
    }

    fn merged_headers(&self, spec: &RequestSpec) -> HashMap<String, String> {
        let mut headers = self.sessions.session().default_headers().clone();
        if let Some(ref last) = self.last_url
            && !spec.url.as_str().starts_with(last.as_str())
        {
            headers.insert("Referer".to_string(), last.to_string());
        }
        headers.extend(spec.headers.clone());
        headers
    }

    async fn human_delay(&self) {
        if !self.delay.enabled {
            return;
        }
        let pause = {
            let mut rng = rand::thread_rng();
            let gauss = Normal::new(self.delay.mean_secs, self.delay.std_dev_secs)
                .map(|dist| dist.sample(&mut rng).abs())
                .unwrap_or(self.delay.mean_secs);
            gauss + rng.gen_range(0.0..self.delay.jitter_cap_secs.max(f64::MIN_POSITIVE))
        };
        sleep(Duration::from_secs_f64(pause)).await;
    }
}

struct VerifyRule {
    key: &'static str,
    failed: fn(&Value) -> bool,
}

fn status_failed(value: &Value) -> bool {
    match value {
        Value::Bool(flag) => !flag,
        Value::String(text) => text.eq_ignore_ascii_case("failed"),
        _ => false,
    }
}

fn success_failed(value: &Value) -> bool {
    matches!(value, Value::Bool(false))
}

fn error_present(_: &Value) -> bool {
    true
}

fn status_code_failed(value: &Value) -> bool {
    match value.as_i64() {
        Some(code) => !matches!(code, 200 | 201 | 202 | 204),
        None => true,
    }
}

/// Ordered semantic-failure rules. The first rule whose key is present
/// decides the outcome; later rules are never consulted, so bodies carrying
/// several candidate keys resolve deterministically.
static VERIFY_RULES: &[VerifyRule] = &[
    VerifyRule {
        key: "status",
        failed: status_failed,
    },
    VerifyRule {
        key: "success",
        failed: success_failed,
    },
    VerifyRule {
        key: "error",
        failed: error_present,
    },
    VerifyRule {
        key: "statusCode",
        failed: status_code_failed,
    },
];

/// Detect semantically-failed 2xx responses across the heterogeneous failure
/// conventions the upstream services use. Non-object bodies pass.
pub fn verify_body(body: &Value) -> Result<(), RequestError> {
    let Some(map) = body.as_object() else {
        return Ok(());
    };

    for rule in VERIFY_RULES {
        if let Some(value) = map.get(rule.key) {
            if (rule.failed)(value) {
                return Err(RequestError::Api(body.clone()));
            }
            return Ok(());
        }
    }
    Ok(())
}
