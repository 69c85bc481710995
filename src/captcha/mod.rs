//! Challenge-solving provider integrations.
//!
//! These descriptors give the solver a unified view of third-party solving
//! services (CapMonster, TwoCaptcha, CapSolver). Providers are ranked in a
//! fixed priority order and chosen at solve time by live funded balance; the
//! rest of the core stays agnostic of vendor-specific payload details.

mod solver;

pub use solver::CaptchaSolver;

use std::time::Duration;

use thiserror::Error;

/// Supported solving services, in selection priority order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProviderKind {
    CapMonster,
    TwoCaptcha,
    CapSolver,
}

impl ProviderKind {
    pub fn name(&self) -> &'static str {
        match self {
            ProviderKind::CapMonster => "capmonster",
            ProviderKind::TwoCaptcha => "twocaptcha",
            ProviderKind::CapSolver => "capsolver",
        }
    }

    pub fn base_url(&self) -> &'static str {
        match self {
            ProviderKind::CapMonster => "https://api.capmonster.cloud",
            ProviderKind::TwoCaptcha => "https://api.2captcha.com",
            ProviderKind::CapSolver => "https://api.capsolver.com",
        }
    }

    /// Vendor-specific descriptor for a proxyless Turnstile task.
    pub fn task_type(&self) -> &'static str {
        match self {
            ProviderKind::CapSolver => "AntiTurnstileTaskProxyLess",
            _ => "TurnstileTaskProxyless",
        }
    }
}

/// A configured provider: a service plus the caller's opaque client key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Provider {
    pub kind: ProviderKind,
    pub client_key: String,
}

/// Solver tuning and provider credentials.
#[derive(Debug, Clone)]
pub struct SolverConfig {
    pub cap_monster: Option<String>,
    pub two_captcha: Option<String>,
    pub capsolver: Option<String>,
    /// Pause between status polls.
    pub poll_interval: Duration,
    /// Status requests allowed per task before it counts as expired.
    pub poll_attempts: u32,
    /// Bounded retries when a provider returns an empty task id.
    pub create_attempts: u32,
    /// Single pause taken after a transport failure before giving up.
    pub failure_pause: Duration,
}

impl Default for SolverConfig {
    fn default() -> Self {
        Self {
            cap_monster: None,
            two_captcha: None,
            capsolver: None,
            poll_interval: Duration::from_secs(2),
            poll_attempts: 60,
            create_attempts: 3,
            failure_pause: Duration::from_secs(5),
        }
    }
}

impl SolverConfig {
    /// Configured providers in fixed priority order, skipping blank keys.
    pub fn providers(&self) -> Vec<Provider> {
        let configured = [
            (ProviderKind::CapMonster, &self.cap_monster),
            (ProviderKind::TwoCaptcha, &self.two_captcha),
            (ProviderKind::CapSolver, &self.capsolver),
        ];

        configured
            .into_iter()
            .filter_map(|(kind, key)| {
                key.as_deref()
                    .filter(|key| !key.trim().is_empty())
                    .map(|key| Provider {
                        kind,
                        client_key: key.to_string(),
                    })
            })
            .collect()
    }
}

/// Reasons a solve call resolved without a token. Surfaced as values, never
/// raised.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SolveFailure {
    #[error("no solving provider is configured")]
    NoProviderKeys,
    #[error("all configured providers report an empty balance")]
    NoFundedProvider,
    #[error("provider failed to create a task")]
    CreationFailed,
    #[error("provider reported the task as unsolvable")]
    ProviderRejected,
    #[error("failed to solve the challenge within the polling budget")]
    Expired,
    #[error("transport failure during solving: {0}")]
    Transport(String),
}

/// Outcome of one solve call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SolveOutcome {
    Solved { token: String },
    Failed { reason: SolveFailure },
}

impl SolveOutcome {
    pub fn is_solved(&self) -> bool {
        matches!(self, SolveOutcome::Solved { .. })
    }

    pub fn token(&self) -> Option<&str> {
        match self {
            SolveOutcome::Solved { token } => Some(token),
            SolveOutcome::Failed { .. } => None,
        }
    }
}
