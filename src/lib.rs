//! # stealth-swarm
//!
//! Resilient session automation core for rate-limited, bot-hostile HTTP
//! services.
//!
//! The crate drives many independent, long-lived sessions, each impersonating
//! a distinct browser identity and optionally routed through a proxy, under a
//! global admission cap. It is built around three cooperating pieces:
//!
//! - the session/request layer: weighted identity selection, cookie
//!   lifecycle, randomized pacing, retry with exponential backoff, and
//!   response-shape error classification
//! - the challenge solver: picks a funded solving provider, submits a task,
//!   and polls it to completion under a bounded budget
//! - the orchestrator: runs one workflow per logical account behind a
//!   semaphore, isolating failures and sharing a progress counter
//!
//! Business workflows, credential loading, and log presentation live outside
//! this crate and consume it through [`RequestExecutor`], [`CaptchaSolver`],
//! and [`Orchestrator`].
//!
//! ## Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use stealth_swarm::{
//!     HttpMethod, Orchestrator, OrchestratorConfig, RequestExecutor, RequestSpec,
//!     ReqwestTransportFactory, SessionConfig, SessionManager,
//! };
//! use url::Url;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let factory = Arc::new(ReqwestTransportFactory::new());
//!     let sessions = SessionManager::new(SessionConfig::default(), None, factory)?;
//!     let mut executor = RequestExecutor::new(sessions, Default::default());
//!
//!     let url = Url::parse("https://example.com/api/me")?;
//!     let response = executor.send(RequestSpec::new(HttpMethod::Get, url)).await?;
//!     println!("status: {}", response.status());
//!     Ok(())
//! }
//! ```

pub mod captcha;
pub mod config;
pub mod executor;
pub mod orchestrator;
pub mod session;
pub mod transport;

pub use crate::captcha::{
    CaptchaSolver,
    Provider,
    ProviderKind,
    SolveFailure,
    SolveOutcome,
    SolverConfig,
};

pub use crate::config::{
    ConfigError,
    CookiePolicy,
    DelayRange,
    HumanDelayProfile,
    SessionConfig,
};

pub use crate::executor::{
    ApiResponse,
    HttpMethod,
    RequestError,
    RequestExecutor,
    RequestSpec,
    verify_body,
};

pub use crate::orchestrator::{
    Orchestrator,
    OrchestratorConfig,
    ProgressCounter,
};

pub use crate::session::{
    ProxyBinding,
    Session,
    SessionError,
    SessionManager,
    identity::{BrowserIdentity, IdentityError, IdentityPool},
};

pub use crate::transport::{
    PreparedRequest,
    RawResponse,
    ReqwestTransportFactory,
    Transport,
    TransportError,
    TransportFactory,
};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
