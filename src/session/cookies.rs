//! Cookie jar with amortized age-based pruning.
//!
//! The jar tracks insertion times so stale cookies can be dropped, but the
//! pruning pass only runs with a small configured probability on each absorb
//! instead of scanning the jar on every request.

use std::collections::HashMap;

use tokio::time::Instant;

use crate::config::CookiePolicy;

#[derive(Debug, Clone)]
struct CookieEntry {
    value: String,
    stored_at: Instant,
}

/// Per-session cookie store.
#[derive(Debug, Clone)]
pub struct CookieJar {
    policy: CookiePolicy,
    cookies: HashMap<String, CookieEntry>,
}

impl CookieJar {
    pub fn new(policy: CookiePolicy) -> Self {
        Self {
            policy,
            cookies: HashMap::new(),
        }
    }

    /// Merge response cookies into the jar, occasionally pruning stale
    /// entries first. Re-set cookies get a fresh timestamp.
    pub fn absorb(&mut self, set_cookies: &[(String, String)]) {
        if set_cookies.is_empty() {
            return;
        }

        if rand::random::<f64>() < self.policy.prune_probability {
            self.prune();
        }

        let now = Instant::now();
        for (name, value) in set_cookies {
            self.cookies.insert(
                name.clone(),
                CookieEntry {
                    value: value.clone(),
                    stored_at: now,
                },
            );
        }
    }

    /// Drop every cookie older than the configured age threshold.
    pub fn prune(&mut self) {
        let now = Instant::now();
        let max_age = self.policy.max_age;
        let before = self.cookies.len();
        self.cookies
            .retain(|_, entry| now.duration_since(entry.stored_at) <= max_age);
        let dropped = before - self.cookies.len();
        if dropped > 0 {
            log::debug!("pruned {dropped} stale cookie(s)");
        }
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.cookies.get(name).map(|entry| entry.value.as_str())
    }

    pub fn len(&self) -> usize {
        self.cookies.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cookies.is_empty()
    }

    /// Render a `Cookie` header value, with `extra` pairs layered on top of
    /// the stored ones. Returns `None` when there is nothing to send.
    pub fn header_value(&self, extra: &HashMap<String, String>) -> Option<String> {
        let mut pairs: Vec<(String, String)> = self
            .cookies
            .iter()
            .filter(|(name, _)| !extra.contains_key(*name))
            .map(|(name, entry)| (name.clone(), entry.value.clone()))
            .collect();
        pairs.extend(extra.iter().map(|(k, v)| (k.clone(), v.clone())));

        if pairs.is_empty() {
            return None;
        }
        pairs.sort();
        Some(
            pairs
                .into_iter()
                .map(|(name, value)| format!("{name}={value}"))
                .collect::<Vec<_>>()
                .join("; "),
        )
    }
}
