//! Challenge-solving state machine.
//!
//! One solve call walks NoProvider -> ProviderSelected -> TaskCreated ->
//! Polling and resolves Solved, Failed, or Expired. Provider selection,
//! task creation, and polling all ride the same resilient executor the rest
//! of the core uses, so rate limits and transient server errors are retried
//! underneath; a transport failure that survives those retries is caught
//! exactly once, logged, and turns into a Failed outcome after a single
//! pause. Tasks are never resumed across calls.

use serde_json::{Value, json};
use tokio::time::sleep;
use url::Url;

use super::{Provider, SolveFailure, SolveOutcome, SolverConfig};
use crate::executor::{HttpMethod, RequestError, RequestExecutor, RequestSpec};

/// Provider status code for a task the service cannot solve.
const UNSOLVABLE_ERROR_ID: i64 = 12;

/// Solves interactive challenges through the first funded provider.
pub struct CaptchaSolver {
    config: SolverConfig,
    executor: RequestExecutor,
}

impl CaptchaSolver {
    pub fn new(config: SolverConfig, executor: RequestExecutor) -> Self {
        Self { config, executor }
    }

    pub fn config(&self) -> &SolverConfig {
        &self.config
    }

    /// Solve one challenge for `site_url`/`site_key`.
    ///
    /// Never raises: provider exhaustion, creation failures, polling budget
    /// expiry, and transport errors all come back as [`SolveOutcome::Failed`].
    pub async fn solve(&mut self, site_url: &str, site_key: &str) -> SolveOutcome {
        match self.try_solve(site_url, site_key).await {
            Ok(outcome) => outcome,
            Err(error) => {
                log::error!("error during challenge solving: {error}");
                sleep(self.config.failure_pause).await;
                SolveOutcome::Failed {
                    reason: SolveFailure::Transport(error.to_string()),
                }
            }
        }
    }

    async fn try_solve(
        &mut self,
        site_url: &str,
        site_key: &str,
    ) -> Result<SolveOutcome, RequestError> {
        let providers = self.config.providers();
        if providers.is_empty() {
            return Ok(SolveOutcome::Failed {
                reason: SolveFailure::NoProviderKeys,
            });
        }

        let Some(provider) = self.select_provider(&providers).await? else {
            return Ok(SolveOutcome::Failed {
                reason: SolveFailure::NoFundedProvider,
            });
        };

        let Some(task_id) = self.create_task(&provider, site_url, site_key).await? else {
            return Ok(SolveOutcome::Failed {
                reason: SolveFailure::CreationFailed,
            });
        };

        self.poll(&provider, &task_id).await
    }

    /// First configured provider reporting a positive balance. `None` when
    /// every key is unfunded; no task is created in that case.
    async fn select_provider(
        &mut self,
        providers: &[Provider],
    ) -> Result<Option<Provider>, RequestError> {
        for provider in providers {
            let spec = RequestSpec::new(
                HttpMethod::Post,
                endpoint(provider, "/getBalance"),
            )
            .with_json(json!({ "clientKey": provider.client_key }))
            .with_verify(false);

            let response = self.executor.send(spec).await?;
            let body = response.json_value()?;
            let balance = body.get("balance").and_then(Value::as_f64).unwrap_or(0.0);

            if balance > 0.0 {
                log::info!(
                    "selected challenge provider {} (balance {balance:.2})",
                    provider.kind.name()
                );
                return Ok(Some(provider.clone()));
            }
            log::debug!("provider {} has no balance, skipping", provider.kind.name());
        }
        Ok(None)
    }

    /// Submit the task descriptor, retrying a bounded number of times when
    /// the provider answers without a usable id.
    async fn create_task(
        &mut self,
        provider: &Provider,
        site_url: &str,
        site_key: &str,
    ) -> Result<Option<String>, RequestError> {
        for attempt in 1..=self.config.create_attempts.max(1) {
            let spec = RequestSpec::new(
                HttpMethod::Post,
                endpoint(provider, "/createTask"),
            )
            .with_json(json!({
                "clientKey": provider.client_key,
                "task": {
                    "type": provider.kind.task_type(),
                    "websiteURL": site_url,
                    "websiteKey": site_key,
                },
            }))
            .with_verify(false);

            let response = self.executor.send(spec).await?;
            let body = response.json_value()?;

            if let Some(task_id) = extract_task_id(&body) {
                return Ok(Some(task_id));
            }
            log::warn!(
                "provider {} returned no task id (attempt {attempt}/{})",
                provider.kind.name(),
                self.config.create_attempts
            );
        }
        Ok(None)
    }

    /// Poll the task until it is ready, rejected, or the budget runs out.
    async fn poll(
        &mut self,
        provider: &Provider,
        task_id: &str,
    ) -> Result<SolveOutcome, RequestError> {
        for _ in 0..self.config.poll_attempts {
            let spec = RequestSpec::new(
                HttpMethod::Post,
                endpoint(provider, "/getTaskResult"),
            )
            .with_json(json!({
                "clientKey": provider.client_key,
                "taskId": task_id,
            }));

            let response = self.executor.send(spec).await?;
            let body = response.json_value()?;
            let status = body.get("status").and_then(Value::as_str);

            if status == Some("processing") {
                sleep(self.config.poll_interval).await;
                continue;
            }

            if body.get("errorId").and_then(Value::as_i64) == Some(UNSOLVABLE_ERROR_ID) {
                return Ok(SolveOutcome::Failed {
                    reason: SolveFailure::ProviderRejected,
                });
            }

            if status == Some("ready")
                && let Some(token) = body.pointer("/solution/token").and_then(Value::as_str)
            {
                return Ok(SolveOutcome::Solved {
                    token: token.to_string(),
                });
            }
        }

        Ok(SolveOutcome::Failed {
            reason: SolveFailure::Expired,
        })
    }
}

fn endpoint(provider: &Provider, path: &str) -> Url {
    let raw = format!("{}{path}", provider.kind.base_url());
    Url::parse(&raw).expect("provider endpoints are valid URLs")
}

fn extract_task_id(body: &Value) -> Option<String> {
    match body.get("taskId") {
        Some(Value::String(id)) if !id.is_empty() => Some(id.clone()),
        Some(Value::Number(id)) => Some(id.to_string()),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn task_id_accepts_strings_and_numbers() {
        assert_eq!(
            extract_task_id(&json!({"taskId": "abc-123"})),
            Some("abc-123".to_string())
        );
        assert_eq!(
            extract_task_id(&json!({"taskId": 42})),
            Some("42".to_string())
        );
        assert_eq!(extract_task_id(&json!({"taskId": ""})), None);
        assert_eq!(extract_task_id(&json!({"errorId": 1})), None);
    }

    #[test]
    fn endpoints_resolve_per_vendor() {
        let provider = Provider {
            kind: crate::captcha::ProviderKind::TwoCaptcha,
            client_key: "key".into(),
        };
        assert_eq!(
            endpoint(&provider, "/getBalance").as_str(),
            "https://api.2captcha.com/getBalance"
        );
    }
}
