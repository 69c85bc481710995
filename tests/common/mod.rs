//! Scripted transport shared by the integration tests.
//!
//! Replies are served in FIFO order; every executed request is recorded so
//! tests can assert on paths, headers, and call counts.

#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use serde_json::Value;

use stealth_swarm::{
    HumanDelayProfile, PreparedRequest, ProxyBinding, RawResponse, RequestExecutor,
    SessionConfig, SessionManager, Transport, TransportError, TransportFactory,
};

pub enum Scripted {
    /// JSON body with the given status.
    Json(u16, Value),
    /// JSON body plus cookies the response sets.
    WithCookies(u16, Value, Vec<(String, String)>),
    /// Transport-level failure.
    Error(&'static str),
}

pub struct ScriptedTransport {
    replies: Mutex<VecDeque<Scripted>>,
    calls: Mutex<Vec<PreparedRequest>>,
}

impl ScriptedTransport {
    pub fn new(replies: Vec<Scripted>) -> Arc<Self> {
        Arc::new(Self {
            replies: Mutex::new(replies.into()),
            calls: Mutex::new(Vec::new()),
        })
    }

    pub fn calls(&self) -> Vec<PreparedRequest> {
        self.calls.lock().unwrap().clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }
}

#[async_trait]
impl Transport for ScriptedTransport {
    async fn execute(&self, request: PreparedRequest) -> Result<RawResponse, TransportError> {
        self.calls.lock().unwrap().push(request.clone());
        let reply = self
            .replies
            .lock()
            .unwrap()
            .pop_front()
            .expect("scripted transport ran out of replies");

        let (status, body, set_cookies) = match reply {
            Scripted::Json(status, body) => (status, body, Vec::new()),
            Scripted::WithCookies(status, body, cookies) => (status, body, cookies),
            Scripted::Error(message) => {
                return Err(TransportError::Transport(message.to_string()));
            }
        };

        Ok(RawResponse {
            status,
            headers: http::HeaderMap::new(),
            set_cookies,
            body: Bytes::from(body.to_string()),
            url: request.url,
        })
    }
}

pub struct ScriptedFactory {
    transport: Arc<ScriptedTransport>,
}

impl ScriptedFactory {
    pub fn new(transport: Arc<ScriptedTransport>) -> Arc<Self> {
        Arc::new(Self { transport })
    }
}

impl TransportFactory for ScriptedFactory {
    fn build(
        &self,
        _default_headers: &std::collections::HashMap<String, String>,
        _proxy: Option<&ProxyBinding>,
        _timeout: Duration,
    ) -> Result<Arc<dyn Transport>, TransportError> {
        Ok(self.transport.clone())
    }
}

/// Session config that never rotates mid-test and carries no jitter.
pub fn steady_session_config() -> SessionConfig {
    SessionConfig {
        base_lifetime: 1_000,
        lifetime_jitter: (1.0, 1.0),
        ..SessionConfig::default()
    }
}

/// Executor wired to the scripted transport, with human pacing disabled.
pub fn scripted_executor(transport: Arc<ScriptedTransport>) -> RequestExecutor {
    let factory = ScriptedFactory::new(transport);
    let sessions = SessionManager::new(steady_session_config(), None, factory)
        .expect("scripted session manager");
    RequestExecutor::new(sessions, HumanDelayProfile::disabled())
}
