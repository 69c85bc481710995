//! Session lifecycle management.
//!
//! A [`Session`] binds one browser identity, an optional proxy, and a cookie
//! jar to a single transport. The [`SessionManager`] owns the active session
//! for one workflow, rotating it for a freshly-identified replacement once
//! its randomized request budget is exhausted.

pub mod cookies;
pub mod identity;

use std::collections::HashMap;
use std::sync::Arc;

use rand::Rng;
use thiserror::Error;
use tokio::time::Instant;

use crate::config::SessionConfig;
use crate::session::cookies::CookieJar;
use crate::session::identity::{
    BrowserIdentity, IdentityError, IdentityPool, identity_headers, locale_for_proxy,
};
use crate::transport::{RawResponse, Transport, TransportError, TransportFactory};

/// Proxy assignment for a session. Immutable once bound; connect failures
/// through the proxy surface as ordinary transport errors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProxyBinding {
    pub endpoint: String,
    /// ISO country code of the exit node, when the supplier provides one.
    pub country: Option<String>,
}

impl ProxyBinding {
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            country: None,
        }
    }

    pub fn with_country(mut self, country: impl Into<String>) -> Self {
        self.country = Some(country.into());
        self
    }
}

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("identity selection failed: {0}")]
    Identity(#[from] IdentityError),
    #[error("transport construction failed: {0}")]
    Transport(#[from] TransportError),
    #[error("invalid session configuration: {0}")]
    Config(#[from] crate::config::ConfigError),
}

/// A bound transport context reused across requests until rotated.
///
/// Exclusively owned by one workflow; never shared.
pub struct Session {
    identity: BrowserIdentity,
    default_headers: HashMap<String, String>,
    transport: Arc<dyn Transport>,
    cookies: CookieJar,
    created_at: Instant,
    request_count: u32,
    target_lifetime: f64,
}

impl Session {
    pub fn identity(&self) -> &BrowserIdentity {
        &self.identity
    }

    pub fn default_headers(&self) -> &HashMap<String, String> {
        &self.default_headers
    }

    pub fn transport(&self) -> &Arc<dyn Transport> {
        &self.transport
    }

    pub fn cookies(&self) -> &CookieJar {
        &self.cookies
    }

    pub fn created_at(&self) -> Instant {
        self.created_at
    }

    pub fn request_count(&self) -> u32 {
        self.request_count
    }

    pub fn target_lifetime(&self) -> f64 {
        self.target_lifetime
    }
}

/// Creates sessions and enforces their rotation policy.
pub struct SessionManager {
    config: SessionConfig,
    pool: IdentityPool,
    proxy: Option<ProxyBinding>,
    factory: Arc<dyn TransportFactory>,
    session: Session,
}

impl SessionManager {
    pub fn new(
        config: SessionConfig,
        proxy: Option<ProxyBinding>,
        factory: Arc<dyn TransportFactory>,
    ) -> Result<Self, SessionError> {
        Self::with_pool(config, IdentityPool::chrome_defaults(), proxy, factory)
    }

    pub fn with_pool(
        config: SessionConfig,
        pool: IdentityPool,
        proxy: Option<ProxyBinding>,
        factory: Arc<dyn TransportFactory>,
    ) -> Result<Self, SessionError> {
        config.validate()?;
        let session = create_session(&config, &pool, proxy.as_ref(), factory.as_ref())?;
        Ok(Self {
            config,
            pool,
            proxy,
            factory,
            session,
        })
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn proxy(&self) -> Option<&ProxyBinding> {
        self.proxy.as_ref()
    }

    /// Count the upcoming request against the session budget and rotate when
    /// it is spent. Runs before every send, never mid-request. Returns
    /// whether a rotation happened.
    pub fn rotate_if_needed(&mut self) -> Result<bool, SessionError> {
        self.session.request_count += 1;
        if (self.session.request_count as f64) < self.session.target_lifetime {
            return Ok(false);
        }

        log::debug!(
            "rotating session after {} request(s), next identity drawn fresh",
            self.session.request_count
        );
        self.session = create_session(
            &self.config,
            &self.pool,
            self.proxy.as_ref(),
            self.factory.as_ref(),
        )?;
        Ok(true)
    }

    /// Merge response cookies into the active session's jar.
    pub fn absorb_cookies(&mut self, response: &RawResponse) {
        self.session.cookies.absorb(&response.set_cookies);
    }

    /// Render the `Cookie` header for the next request.
    pub fn cookie_header(&self, extra: &HashMap<String, String>) -> Option<String> {
        self.session.cookies.header_value(extra)
    }
}

fn create_session(
    config: &SessionConfig,
    pool: &IdentityPool,
    proxy: Option<&ProxyBinding>,
    factory: &dyn TransportFactory,
) -> Result<Session, SessionError> {
    let identity = pool.draw();
    let locale = locale_for_proxy(proxy);
    let default_headers = identity_headers(&identity, locale);
    let timeout = config.timeout_range.sample();
    let transport = factory.build(&default_headers, proxy, timeout)?;

    let (low, high) = config.lifetime_jitter;
    let factor = if (high - low).abs() < f64::EPSILON {
        low
    } else {
        rand::thread_rng().gen_range(low..high)
    };
    let target_lifetime = config.base_lifetime as f64 * factor;

    log::debug!(
        "created session: identity={}, lifetime={:.1}, proxy={}",
        identity.profile_id,
        target_lifetime,
        proxy.map(|p| p.endpoint.as_str()).unwrap_or("none")
    );

    Ok(Session {
        identity,
        default_headers,
        transport,
        cookies: CookieJar::new(config.cookie_policy),
        created_at: Instant::now(),
        request_count: 0,
        target_lifetime,
    })
}
