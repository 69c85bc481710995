//! Synthetic browser identity pool.
//!
//! Responsibilities:
//! - Hold a weighted table of impersonation profiles (Chrome builds with
//!   matching user-agent versions).
//! - Draw one identity per session via weighted random selection.
//! - Derive the header set a real browser of that build would send,
//!   including client hints and an `Accept-Language` matched to the proxy's
//!   country where known.

use std::collections::HashMap;

use once_cell::sync::Lazy;
use rand::Rng;
use rand::distributions::WeightedIndex;
use rand::prelude::*;
use thiserror::Error;

use crate::session::ProxyBinding;

/// Immutable descriptor of one impersonation profile.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BrowserIdentity {
    /// Impersonation target, e.g. `chrome124`.
    pub profile_id: String,
    /// Relative selection weight within the pool.
    pub selection_weight: u32,
    /// Full version carried in the user-agent, e.g. `124.0.0.0`.
    pub ua_version: String,
}

impl BrowserIdentity {
    pub fn new(
        profile_id: impl Into<String>,
        selection_weight: u32,
        ua_version: impl Into<String>,
    ) -> Self {
        Self {
            profile_id: profile_id.into(),
            selection_weight,
            ua_version: ua_version.into(),
        }
    }

    /// Major version used by the `sec-ch-ua` client hint.
    pub fn major_version(&self) -> &str {
        self.ua_version.split('.').next().unwrap_or(&self.ua_version)
    }
}

#[derive(Debug, Error)]
pub enum IdentityError {
    #[error("identity pool is empty")]
    EmptyPool,
    #[error("selection weights must sum to a positive value")]
    ZeroWeights,
}

/// Weighted pool of browser identities.
#[derive(Debug, Clone)]
pub struct IdentityPool {
    profiles: Vec<BrowserIdentity>,
    weights: WeightedIndex<u32>,
}

impl IdentityPool {
    /// Build a pool from a custom profile table.
    pub fn new(profiles: Vec<BrowserIdentity>) -> Result<Self, IdentityError> {
        if profiles.is_empty() {
            return Err(IdentityError::EmptyPool);
        }
        let weights = WeightedIndex::new(profiles.iter().map(|p| p.selection_weight))
            .map_err(|_| IdentityError::ZeroWeights)?;
        Ok(Self { profiles, weights })
    }

    /// Recent Chrome builds, biased towards newer releases.
    pub fn chrome_defaults() -> Self {
        let profiles = vec![
            BrowserIdentity::new("chrome119", 5, "119.0.0.0"),
            BrowserIdentity::new("chrome120", 10, "120.0.0.0"),
            BrowserIdentity::new("chrome123", 15, "123.0.0.0"),
            BrowserIdentity::new("chrome124", 20, "124.0.0.0"),
        ];
        Self::new(profiles).expect("default profile table is non-empty and weighted")
    }

    pub fn profiles(&self) -> &[BrowserIdentity] {
        &self.profiles
    }

    pub fn draw(&self) -> BrowserIdentity {
        self.draw_with(&mut thread_rng())
    }

    pub fn draw_with<R: Rng + ?Sized>(&self, rng: &mut R) -> BrowserIdentity {
        self.profiles[self.weights.sample(rng)].clone()
    }
}

impl Default for IdentityPool {
    fn default() -> Self {
        Self::chrome_defaults()
    }
}

static COUNTRY_LOCALES: Lazy<HashMap<&'static str, &'static str>> = Lazy::new(|| {
    HashMap::from([
        ("DE", "de-DE,de;q=0.9,en;q=0.8"),
        ("GB", "en-GB,en;q=0.9"),
        ("FR", "fr-FR,fr;q=0.9,en;q=0.8"),
        ("IT", "it-IT,it;q=0.9,en;q=0.8"),
        ("ES", "es-ES,es;q=0.9,en;q=0.8"),
        ("US", "en-US,en;q=0.9"),
        ("CA", "en-CA,en;q=0.9,fr-CA;q=0.8"),
        ("JP", "ja-JP,ja;q=0.9,en;q=0.8"),
        ("KR", "ko-KR,ko;q=0.9,en;q=0.8"),
    ])
});

const DEFAULT_LOCALE: &str = "en-US,en;q=0.9";

/// `Accept-Language` value consistent with the proxy's exit country, falling
/// back to the default when the country is unknown.
pub fn locale_for_proxy(proxy: Option<&ProxyBinding>) -> &'static str {
    proxy
        .and_then(|p| p.country.as_deref())
        .and_then(|country| COUNTRY_LOCALES.get(country.to_ascii_uppercase().as_str()))
        .copied()
        .unwrap_or(DEFAULT_LOCALE)
}

/// Default header set for one identity. Client hints must agree with the
/// user-agent version or the fingerprint becomes inconsistent.
pub fn identity_headers(identity: &BrowserIdentity, locale: &str) -> HashMap<String, String> {
    let major = identity.major_version();
    let user_agent = format!(
        "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 \
         (KHTML, like Gecko) Chrome/{} Safari/537.36",
        identity.ua_version
    );

    HashMap::from([
        ("Accept-Language".to_string(), locale.to_string()),
        ("Accept-Encoding".to_string(), "gzip, deflate, br".to_string()),
        ("User-Agent".to_string(), user_agent),
        (
            "sec-ch-ua".to_string(),
            format!(
                "\"Chromium\";v=\"{major}\", \"Google Chrome\";v=\"{major}\", \"Not=A?Brand\";v=\"99\""
            ),
        ),
        ("sec-ch-ua-platform".to_string(), "\"Windows\"".to_string()),
        ("sec-ch-ua-mobile".to_string(), "?0".to_string()),
    ])
}
