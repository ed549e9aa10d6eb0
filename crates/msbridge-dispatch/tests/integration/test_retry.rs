//! Retry behavior: transient recovery, Retry-After, budgets, and deadlines.

use std::time::{Duration, Instant};

use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use msbridge_core::config::Config;
use msbridge_core::domain::{Audience, DispatchRequest};
use msbridge_core::errors::ErrorKind;

use crate::common::{engine_with_config, mount_token_endpoint};

fn fast_retry_config() -> Config {
    let mut config = Config::default();
    config.retry.base_delay_ms = 100;
    config
}

#[tokio::test]
async fn test_503_then_success_takes_two_attempts() {
    let server = MockServer::start().await;
    mount_token_endpoint(&server).await;

    Mock::given(method("GET"))
        .and(path("/subscriptions"))
        .respond_with(ResponseTemplate::new(503))
        .up_to_n_times(1)
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/subscriptions"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "value": [{"subscriptionId": "sub-1"}]
        })))
        .mount(&server)
        .await;

    let engine = engine_with_config(&server, fast_retry_config());
    let started = Instant::now();
    let resp = engine
        .dispatch(
            DispatchRequest::get(Audience::Azure, "/subscriptions")
                .with_api_version("2022-12-01"),
        )
        .await
        .unwrap();

    assert_eq!(resp.attempts, 2);
    assert_eq!(resp.http_status, 200);
    // One backoff of ~100 ms (±20% jitter) separated the attempts.
    assert!(started.elapsed() >= Duration::from_millis(75));
}

#[tokio::test]
async fn test_429_honors_retry_after_header() {
    let server = MockServer::start().await;
    mount_token_endpoint(&server).await;

    Mock::given(method("GET"))
        .and(path("/v1.0/me"))
        .respond_with(
            ResponseTemplate::new(429).insert_header("Retry-After", "1"),
        )
        .up_to_n_times(1)
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/v1.0/me"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({})))
        .mount(&server)
        .await;

    // Base delay of 100 ms would retry almost immediately; the header wins.
    let engine = engine_with_config(&server, fast_retry_config());
    let started = Instant::now();
    let resp = engine
        .dispatch(DispatchRequest::get(Audience::Graph, "/me"))
        .await
        .unwrap();

    assert_eq!(resp.attempts, 2);
    assert!(
        started.elapsed() >= Duration::from_secs(1),
        "retry fired before Retry-After elapsed"
    );
}

#[tokio::test]
async fn test_retry_budget_exhaustion_reports_attempts() {
    let server = MockServer::start().await;
    mount_token_endpoint(&server).await;

    Mock::given(method("GET"))
        .and(path("/v1.0/me"))
        .respond_with(ResponseTemplate::new(503))
        .expect(3)
        .mount(&server)
        .await;

    let engine = engine_with_config(&server, fast_retry_config());
    let mut req = DispatchRequest::get(Audience::Graph, "/me");
    req.max_retries = Some(2);

    let err = engine.dispatch(req).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::UpstreamTransient);
    assert_eq!(err.http_status(), Some(503));
    assert_eq!(err.attempts(), 3);
}

#[tokio::test]
async fn test_plain_4xx_never_retries() {
    let server = MockServer::start().await;
    mount_token_endpoint(&server).await;

    Mock::given(method("GET"))
        .and(path("/v1.0/users/nope"))
        .respond_with(ResponseTemplate::new(404).set_body_json(serde_json::json!({
            "error": {"code": "Request_ResourceNotFound", "message": "not found"}
        })))
        .expect(1)
        .mount(&server)
        .await;

    let engine = engine_with_config(&server, fast_retry_config());
    let err = engine
        .dispatch(DispatchRequest::get(Audience::Graph, "/users/nope"))
        .await
        .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::Client);
    assert_eq!(err.attempts(), 1);
    assert!(err.message().contains("Request_ResourceNotFound"));
}

#[tokio::test]
async fn test_408_and_423_are_retried() {
    for transient_status in [408u16, 423] {
        let server = MockServer::start().await;
        mount_token_endpoint(&server).await;

        Mock::given(method("GET"))
            .and(path("/v1.0/me"))
            .respond_with(ResponseTemplate::new(transient_status))
            .up_to_n_times(1)
            .mount(&server)
            .await;

        Mock::given(method("GET"))
            .and(path("/v1.0/me"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({})))
            .mount(&server)
            .await;

        let engine = engine_with_config(&server, fast_retry_config());
        let resp = engine
            .dispatch(DispatchRequest::get(Audience::Graph, "/me"))
            .await
            .unwrap();

        assert_eq!(resp.attempts, 2, "status {transient_status}");
    }
}

#[tokio::test]
async fn test_deadline_bounds_retry_storm() {
    let server = MockServer::start().await;
    mount_token_endpoint(&server).await;

    // Every attempt fails transiently; backoff doubling from 1 s would
    // need ~15 s for the full budget of 5 retries.
    Mock::given(method("GET"))
        .and(path("/v1.0/me"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;

    let engine = engine_with_config(&server, Config::default());
    let mut req = DispatchRequest::get(Audience::Graph, "/me");
    req.max_retries = Some(5);
    req.timeout_ms = Some(5_000);

    let started = Instant::now();
    let err = engine.dispatch(req).await.unwrap_err();
    let elapsed = started.elapsed();

    assert!(
        matches!(
            err.kind(),
            ErrorKind::Timeout | ErrorKind::UpstreamTransient
        ),
        "unexpected kind {:?}",
        err.kind()
    );
    assert!(
        elapsed >= Duration::from_millis(4_800) && elapsed < Duration::from_millis(6_500),
        "deadline not honored: {elapsed:?}"
    );
}
