//! Provider selection, task creation, and polling of the challenge solver.

mod common;

use std::time::Duration;

use serde_json::json;
use tokio::time::Instant;

use common::{Scripted, ScriptedTransport, scripted_executor};
use stealth_swarm::{CaptchaSolver, SolveFailure, SolveOutcome, SolverConfig};

const SITE_URL: &str = "https://quest.example.com";
const SITE_KEY: &str = "0x4AAAAAAA";

fn solver(config: SolverConfig, transport: &std::sync::Arc<ScriptedTransport>) -> CaptchaSolver {
    CaptchaSolver::new(config, scripted_executor(transport.clone()))
}

fn funded_config() -> SolverConfig {
    SolverConfig {
        cap_monster: Some("cm-key".into()),
        ..Default::default()
    }
}

#[tokio::test(start_paused = true)]
async fn no_configured_provider_fails_without_traffic() {
    let transport = ScriptedTransport::new(Vec::new());
    let mut solver = solver(SolverConfig::default(), &transport);

    let outcome = solver.solve(SITE_URL, SITE_KEY).await;
    assert_eq!(
        outcome,
        SolveOutcome::Failed {
            reason: SolveFailure::NoProviderKeys
        }
    );
    assert_eq!(transport.call_count(), 0);
}

#[tokio::test(start_paused = true)]
async fn unfunded_providers_never_reach_task_creation() {
    let transport = ScriptedTransport::new(vec![
        Scripted::Json(200, json!({"balance": 0})),
        Scripted::Json(200, json!({"errorId": 1})),
    ]);
    let config = SolverConfig {
        cap_monster: Some("cm-key".into()),
        two_captcha: Some("tc-key".into()),
        ..Default::default()
    };
    let mut solver = solver(config, &transport);

    let outcome = solver.solve(SITE_URL, SITE_KEY).await;
    assert_eq!(
        outcome,
        SolveOutcome::Failed {
            reason: SolveFailure::NoFundedProvider
        }
    );

    let calls = transport.calls();
    assert_eq!(calls.len(), 2);
    assert!(calls.iter().all(|call| call.url.path() == "/getBalance"));
}

#[tokio::test(start_paused = true)]
async fn polls_until_ready_and_returns_the_token() {
    let transport = ScriptedTransport::new(vec![
        Scripted::Json(200, json!({"balance": 4.2})),
        Scripted::Json(200, json!({"taskId": "task-77"})),
        Scripted::Json(200, json!({"status": "processing"})),
        Scripted::Json(200, json!({"status": "processing"})),
        Scripted::Json(
            200,
            json!({"status": "ready", "solution": {"token": "turnstile-token"}}),
        ),
    ]);
    let mut solver = solver(funded_config(), &transport);

    let started = Instant::now();
    let outcome = solver.solve(SITE_URL, SITE_KEY).await;
    let elapsed = started.elapsed();

    assert_eq!(outcome.token(), Some("turnstile-token"));
    // Two `processing` polls, two poll-interval waits.
    assert!(elapsed >= Duration::from_secs(4), "elapsed {elapsed:?}");
    assert!(elapsed < Duration::from_secs(6), "elapsed {elapsed:?}");

    let calls = transport.calls();
    assert_eq!(calls[0].url.path(), "/getBalance");
    assert_eq!(calls[1].url.path(), "/createTask");
    assert!(calls[2..].iter().all(|c| c.url.path() == "/getTaskResult"));

    let task_payload = calls[1].json.as_ref().unwrap();
    assert_eq!(
        task_payload.pointer("/task/type").and_then(|v| v.as_str()),
        Some("TurnstileTaskProxyless")
    );
    assert_eq!(
        task_payload
            .pointer("/task/websiteKey")
            .and_then(|v| v.as_str()),
        Some(SITE_KEY)
    );
}

#[tokio::test(start_paused = true)]
async fn empty_task_ids_are_retried_a_bounded_number_of_times() {
    let transport = ScriptedTransport::new(vec![
        Scripted::Json(200, json!({"balance": 1.0})),
        Scripted::Json(200, json!({"taskId": ""})),
        Scripted::Json(200, json!({"taskId": ""})),
        Scripted::Json(200, json!({"taskId": ""})),
    ]);
    let mut solver = solver(funded_config(), &transport);

    let outcome = solver.solve(SITE_URL, SITE_KEY).await;
    assert_eq!(
        outcome,
        SolveOutcome::Failed {
            reason: SolveFailure::CreationFailed
        }
    );
    // One balance probe plus exactly three creation attempts.
    assert_eq!(transport.call_count(), 4);
}

#[tokio::test(start_paused = true)]
async fn provider_rejection_terminates_polling() {
    let transport = ScriptedTransport::new(vec![
        Scripted::Json(200, json!({"balance": 1.0})),
        Scripted::Json(200, json!({"taskId": 91})),
        Scripted::Json(200, json!({"status": "processing"})),
        Scripted::Json(200, json!({"errorId": 12})),
    ]);
    let mut solver = solver(funded_config(), &transport);

    let outcome = solver.solve(SITE_URL, SITE_KEY).await;
    assert_eq!(
        outcome,
        SolveOutcome::Failed {
            reason: SolveFailure::ProviderRejected
        }
    );
}

#[tokio::test(start_paused = true)]
async fn polling_budget_exhaustion_expires_the_task() {
    let transport = ScriptedTransport::new(vec![
        Scripted::Json(200, json!({"balance": 1.0})),
        Scripted::Json(200, json!({"taskId": "task-1"})),
        Scripted::Json(200, json!({"status": "processing"})),
        Scripted::Json(200, json!({"status": "processing"})),
    ]);
    let config = SolverConfig {
        poll_attempts: 2,
        ..funded_config()
    };
    let mut solver = solver(config, &transport);

    let outcome = solver.solve(SITE_URL, SITE_KEY).await;
    assert_eq!(
        outcome,
        SolveOutcome::Failed {
            reason: SolveFailure::Expired
        }
    );
    assert_eq!(transport.call_count(), 4);
}

#[tokio::test(start_paused = true)]
async fn transport_failures_resolve_failed_after_one_pause() {
    // The executor retries the balance probe three times before the solver
    // sees the error; the solver then pauses once and gives up.
    let transport = ScriptedTransport::new(vec![
        Scripted::Error("proxy unreachable"),
        Scripted::Error("proxy unreachable"),
        Scripted::Error("proxy unreachable"),
    ]);
    let mut solver = solver(funded_config(), &transport);

    let outcome = solver.solve(SITE_URL, SITE_KEY).await;
    assert!(matches!(
        outcome,
        SolveOutcome::Failed {
            reason: SolveFailure::Transport(_)
        }
    ));
    assert_eq!(transport.call_count(), 3);
}

#[tokio::test(start_paused = true)]
async fn capsolver_uses_its_own_task_type() {
    let transport = ScriptedTransport::new(vec![
        Scripted::Json(200, json!({"balance": 2.0})),
        Scripted::Json(200, json!({"taskId": "cs-1"})),
        Scripted::Json(
            200,
            json!({"status": "ready", "solution": {"token": "tok"}}),
        ),
    ]);
    let config = SolverConfig {
        capsolver: Some("cs-key".into()),
        ..Default::default()
    };
    let mut solver = solver(config, &transport);

    let outcome = solver.solve(SITE_URL, SITE_KEY).await;
    assert!(outcome.is_solved());

    let calls = transport.calls();
    assert!(calls[0].url.as_str().starts_with("https://api.capsolver.com"));
    assert_eq!(
        calls[1]
            .json
            .as_ref()
            .unwrap()
            .pointer("/task/type")
            .and_then(|v| v.as_str()),
        Some("AntiTurnstileTaskProxyLess")
    );
}
