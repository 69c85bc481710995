//! Bounded-concurrency batch orchestration.
//!
//! Runs one workflow per logical account behind a global semaphore. A permit
//! is held for the whole workflow, backoff sleeps included, so the cap
//! bounds workflows in flight rather than individual network calls. One
//! account failing (or timing out) is logged and skipped; it never cancels
//! the rest of the batch.

use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tokio::time::{sleep, timeout};

use crate::config::{ConfigError, DelayRange};

/// Shared, atomic batch progress. Cloneable into any number of workflows;
/// incremented on success only.
#[derive(Debug, Clone, Default)]
pub struct ProgressCounter {
    processed: Arc<AtomicUsize>,
    total: Arc<AtomicUsize>,
}

impl ProgressCounter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reset for a fresh batch of `total` accounts.
    pub fn begin_batch(&self, total: usize) {
        self.processed.store(0, Ordering::SeqCst);
        self.total.store(total, Ordering::SeqCst);
    }

    /// Record one success; returns the updated processed count.
    pub fn increment(&self) -> usize {
        self.processed.fetch_add(1, Ordering::SeqCst) + 1
    }

    pub fn processed(&self) -> usize {
        self.processed.load(Ordering::SeqCst)
    }

    pub fn total(&self) -> usize {
        self.total.load(Ordering::SeqCst)
    }
}

/// Orchestrator tuning.
#[derive(Debug, Clone, Copy)]
pub struct OrchestratorConfig {
    /// Maximum workflows simultaneously in flight.
    pub cap: usize,
    /// Optional jittered start window per account, applied when
    /// `0 < min <= max`.
    pub start_delay: Option<DelayRange>,
    /// Optional hard bound on one workflow's duration. A stuck workflow
    /// otherwise occupies its permit forever.
    pub workflow_timeout: Option<Duration>,
}

impl OrchestratorConfig {
    pub fn new(cap: usize) -> Result<Self, ConfigError> {
        if cap == 0 {
            return Err(ConfigError::ZeroCap);
        }
        Ok(Self {
            cap,
            start_delay: None,
            workflow_timeout: None,
        })
    }

    pub fn with_start_delay(mut self, range: DelayRange) -> Self {
        self.start_delay = Some(range);
        self
    }

    pub fn with_workflow_timeout(mut self, limit: Duration) -> Self {
        self.workflow_timeout = Some(limit);
        self
    }
}

/// Runs account workflows under the admission cap.
pub struct Orchestrator {
    config: OrchestratorConfig,
    semaphore: Arc<Semaphore>,
    progress: ProgressCounter,
}

impl Orchestrator {
    pub fn new(config: OrchestratorConfig) -> Self {
        Self::with_progress(config, ProgressCounter::new())
    }

    /// Use an externally-owned counter, e.g. one shared with a UI.
    pub fn with_progress(config: OrchestratorConfig, progress: ProgressCounter) -> Self {
        Self {
            semaphore: Arc::new(Semaphore::new(config.cap)),
            config,
            progress,
        }
    }

    pub fn progress(&self) -> &ProgressCounter {
        &self.progress
    }

    /// Run `workflow` once per account and return when every one has
    /// finished, successfully or not. Accounts are processed in no
    /// guaranteed order; permit grants are only approximately
    /// arrival-ordered.
    pub async fn run_batch<A, F, Fut, E>(&self, accounts: Vec<A>, workflow: F)
    where
        A: Send + 'static,
        F: Fn(A) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<(), E>> + Send + 'static,
        E: std::fmt::Display + Send + 'static,
    {
        self.progress.begin_batch(accounts.len());
        let workflow = Arc::new(workflow);
        let mut tasks = JoinSet::new();

        for (index, account) in accounts.into_iter().enumerate() {
            let semaphore = self.semaphore.clone();
            let progress = self.progress.clone();
            let workflow = workflow.clone();
            let start_delay = self.config.start_delay;
            let limit = self.config.workflow_timeout;

            tasks.spawn(async move {
                if let Some(range) = start_delay
                    && range.is_active()
                {
                    let delay = range.sample();
                    log::info!(
                        "account #{index}: applying initial delay of {:.2}s",
                        delay.as_secs_f64()
                    );
                    sleep(delay).await;
                }

                let Ok(_permit) = semaphore.acquire_owned().await else {
                    // The semaphore is never closed while a batch runs.
                    return;
                };

                let run = workflow(account);
                let result = match limit {
                    Some(limit) => match timeout(limit, run).await {
                        Ok(result) => result,
                        Err(_) => {
                            log::error!(
                                "account #{index}: workflow exceeded {:?}, skipping",
                                limit
                            );
                            return;
                        }
                    },
                    None => run.await,
                };

                match result {
                    Ok(()) => {
                        let done = progress.increment();
                        log::info!("accounts processed: {done}/{}", progress.total());
                    }
                    Err(error) => {
                        log::error!("account #{index}: error during execution: {error}");
                    }
                }
            });
        }

        while let Some(joined) = tasks.join_next().await {
            if let Err(error) = joined {
                log::error!("workflow task aborted: {error}");
            }
        }
    }
}
