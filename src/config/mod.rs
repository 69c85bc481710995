//! Plain-value configuration shared across the core.
//!
//! Credentials, proxy lists, and tuning knobs are loaded by the embedding
//! application; this module only defines the validated value types the core
//! consumes. No file parsing happens here.

use std::time::Duration;

use rand::Rng;
use thiserror::Error;

/// Validation failures for configuration values.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("admission cap must be a positive integer")]
    ZeroCap,
    #[error("delay range invalid: min {min:?} exceeds max {max:?}")]
    InvalidDelayRange { min: Duration, max: Duration },
    #[error("lifetime jitter invalid: low {low} must satisfy 0 < low <= high {high}")]
    InvalidJitter { low: f64, high: f64 },
}

/// Inclusive duration window sampled uniformly.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DelayRange {
    pub min: Duration,
    pub max: Duration,
}

impl DelayRange {
    pub fn new(min: Duration, max: Duration) -> Result<Self, ConfigError> {
        if min > max {
            return Err(ConfigError::InvalidDelayRange { min, max });
        }
        Ok(Self { min, max })
    }

    pub fn from_secs(min: u64, max: u64) -> Result<Self, ConfigError> {
        Self::new(Duration::from_secs(min), Duration::from_secs(max))
    }

    /// A range only applies when `0 < min <= max`; a zero minimum disables it.
    pub fn is_active(&self) -> bool {
        self.min > Duration::ZERO && self.min <= self.max
    }

    pub fn sample(&self) -> Duration {
        self.sample_with(&mut rand::thread_rng())
    }

    pub fn sample_with<R: Rng + ?Sized>(&self, rng: &mut R) -> Duration {
        if self.min >= self.max {
            return self.min;
        }
        let secs = rng.gen_range(self.min.as_secs_f64()..=self.max.as_secs_f64());
        Duration::from_secs_f64(secs)
    }
}

/// Amortized cookie-pruning knobs.
///
/// Pruning runs with `prune_probability` on each absorb pass rather than
/// scanning the jar on every request; entries older than `max_age` are
/// dropped when it does run.
#[derive(Debug, Clone, Copy)]
pub struct CookiePolicy {
    pub prune_probability: f64,
    pub max_age: Duration,
}

impl Default for CookiePolicy {
    fn default() -> Self {
        Self {
            prune_probability: 0.1,
            max_age: Duration::from_secs(3600),
        }
    }
}

/// Randomized pacing applied before each outbound request.
///
/// The pause is drawn from a half-normal distribution plus a small uniform
/// jitter so request spacing stays irregular.
#[derive(Debug, Clone, Copy)]
pub struct HumanDelayProfile {
    pub enabled: bool,
    pub mean_secs: f64,
    pub std_dev_secs: f64,
    pub jitter_cap_secs: f64,
}

impl Default for HumanDelayProfile {
    fn default() -> Self {
        Self {
            enabled: true,
            mean_secs: 1.5,
            std_dev_secs: 0.5,
            jitter_cap_secs: 0.1,
        }
    }
}

impl HumanDelayProfile {
    /// Profile with randomized pacing switched off, useful for tests and
    /// latency-sensitive callers.
    pub fn disabled() -> Self {
        Self {
            enabled: false,
            ..Self::default()
        }
    }
}

/// Session construction and rotation knobs.
#[derive(Debug, Clone, Copy)]
pub struct SessionConfig {
    /// Base number of requests a session serves before rotation.
    pub base_lifetime: u32,
    /// Uniform factor applied to `base_lifetime` per session.
    pub lifetime_jitter: (f64, f64),
    /// Per-session transport timeout window.
    pub timeout_range: DelayRange,
    pub cookie_policy: CookiePolicy,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            base_lifetime: 5,
            lifetime_jitter: (0.8, 1.2),
            timeout_range: DelayRange {
                min: Duration::from_secs(25),
                max: Duration::from_secs(35),
            },
            cookie_policy: CookiePolicy::default(),
        }
    }
}

impl SessionConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        let (low, high) = self.lifetime_jitter;
        if !(low > 0.0 && low <= high) {
            return Err(ConfigError::InvalidJitter { low, high });
        }
        Ok(())
    }
}
