//! Remote coordination over real HTTP against a mock backend.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use minimarket_guard::remote::{
    Capabilities, Capability, HttpRpcTransport, RATE_LIMIT_PROCEDURE,
};
use minimarket_guard::{
    BreakerEvent, CircuitBreaker, CircuitBreakerConfig, CircuitState, FixedWindowRateLimiter,
    RemoteCoordinator,
};

mod common;

fn coordinator(base: &str) -> RemoteCoordinator {
    let transport = HttpRpcTransport::new(base, Some("service-key"), Some(Duration::from_secs(5)))
        .unwrap();
    RemoteCoordinator::with_capabilities(Some(Arc::new(transport)), Capabilities::isolated())
}

fn rate_limit_body(allowed: bool, remaining: i64) -> String {
    let reset_at = (Utc::now() + chrono::Duration::seconds(30)).to_rfc3339();
    format!(
        r#"[{{"allowed": {}, "remaining": {}, "reset_at": "{}"}}]"#,
        allowed, remaining, reset_at
    )
}

#[tokio::test]
async fn test_remote_rate_limit_request_shape() {
    let backend = common::start_programmable_backend(|_| (200, rate_limit_body(true, 4))).await;
    let coordinator = coordinator(&backend.base_url());
    let fallback = FixedWindowRateLimiter::new(5, Duration::from_secs(60));

    let result = coordinator
        .check_rate_limit_shared("user:u1:ip:1.2.3.4", 5, 60, &fallback)
        .await;

    assert!(result.allowed);
    assert_eq!(result.remaining, 4);
    assert_eq!(fallback.bucket_count(), 0);

    let requests = backend.requests();
    assert_eq!(requests.len(), 1);
    let request = &requests[0];
    assert_eq!(request.path, format!("/rest/v1/rpc/{}", RATE_LIMIT_PROCEDURE));
    assert_eq!(request.header("apikey"), Some("service-key"));
    assert_eq!(request.header("authorization"), Some("Bearer service-key"));

    let body: serde_json::Value = serde_json::from_str(&request.body).unwrap();
    assert_eq!(
        body,
        serde_json::json!({
            "p_key": "user:u1:ip:1.2.3.4",
            "p_limit": 5,
            "p_window_seconds": 60,
        })
    );
}

#[tokio::test]
async fn test_404_stops_all_further_probes() {
    let backend = common::start_programmable_backend(|n| {
        if n == 0 {
            (404, r#"{"message": "function not found"}"#.to_string())
        } else {
            (200, rate_limit_body(true, 100))
        }
    })
    .await;
    let coordinator = coordinator(&backend.base_url());
    let fallback = FixedWindowRateLimiter::new(2, Duration::from_secs(60));

    let results = [
        coordinator.check_rate_limit_shared("ip:9.9.9.9", 2, 60, &fallback).await,
        coordinator.check_rate_limit_shared("ip:9.9.9.9", 2, 60, &fallback).await,
        coordinator.check_rate_limit_shared("ip:9.9.9.9", 2, 60, &fallback).await,
    ];

    assert_eq!(backend.hits(), 1);
    assert_eq!(coordinator.capabilities().rate_limit.get(), Capability::Absent);
    assert!(results[0].allowed && results[1].allowed);
    assert!(!results[2].allowed);
}

#[tokio::test]
async fn test_unreachable_endpoint_falls_back() {
    let addr = common::closed_addr().await;
    let coordinator = coordinator(&format!("http://{}", addr));
    let fallback = FixedWindowRateLimiter::new(1, Duration::from_secs(60));

    let first = coordinator.check_rate_limit_shared("k", 1, 60, &fallback).await;
    let second = coordinator.check_rate_limit_shared("k", 1, 60, &fallback).await;

    assert!(first.allowed);
    assert!(!second.allowed);
    assert_eq!(coordinator.capabilities().rate_limit.get(), Capability::Unknown);
}

#[tokio::test]
async fn test_breaker_shadow_tracks_server_errors() {
    let backend = common::start_programmable_backend(|n| {
        if n < 2 {
            (500, String::new())
        } else {
            (200, r#"{"current_state": "closed", "allows_request": true}"#.to_string())
        }
    })
    .await;
    let coordinator = coordinator(&backend.base_url());
    let breaker = CircuitBreaker::new(CircuitBreakerConfig {
        failure_threshold: 2,
        ..CircuitBreakerConfig::default()
    });

    coordinator
        .record_circuit_breaker_event("ventas", BreakerEvent::Failure, &breaker)
        .await;
    let local = coordinator
        .record_circuit_breaker_event("ventas", BreakerEvent::Failure, &breaker)
        .await;
    assert_eq!(local.state, CircuitState::Open);
    assert!(!local.allows);

    let remote = coordinator
        .record_circuit_breaker_event("ventas", BreakerEvent::Success, &breaker)
        .await;
    assert_eq!(remote.state, CircuitState::Closed);
    assert!(remote.allows);
    assert_eq!(breaker.state(), CircuitState::Open);

    let body: serde_json::Value =
        serde_json::from_str(&backend.requests()[2].body).unwrap();
    assert_eq!(body["p_event"], "success");
    assert_eq!(backend.hits(), 3);
}
