//! Rate limiting across dispatches: saturation, window rolls, no drops.

use std::sync::Arc;
use std::time::{Duration, Instant};

use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use msbridge_core::config::Config;
use msbridge_core::domain::{Audience, DispatchRequest};

use crate::common::{engine_with_config, mount_token_endpoint};

fn limited_config(max_per_window: u32, window_secs: u64) -> Config {
    let mut config = Config::default();
    config.rate_limit.max_per_window = max_per_window;
    config.rate_limit.window_secs = window_secs;
    config
}

#[tokio::test]
async fn test_burst_is_spread_across_windows_without_drops() {
    let server = MockServer::start().await;
    mount_token_endpoint(&server).await;

    Mock::given(method("GET"))
        .and(path("/v1.0/me"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({})))
        .expect(8)
        .mount(&server)
        .await;

    // 8 dispatches against 3 permits per 1-second window: admitted in
    // batches of 3/3/2 across three windows.
    let engine = Arc::new(engine_with_config(&server, limited_config(3, 1)));
    let started = Instant::now();

    let mut handles = Vec::new();
    for _ in 0..8 {
        let engine = Arc::clone(&engine);
        handles.push(tokio::spawn(async move {
            engine
                .dispatch(DispatchRequest::get(Audience::Graph, "/me"))
                .await
        }));
    }

    for handle in handles {
        handle.await.unwrap().expect("no dispatch may be dropped");
    }

    let elapsed = started.elapsed();
    assert!(
        elapsed >= Duration::from_millis(1_800),
        "8 calls through 3/window needed at least two window rolls, took {elapsed:?}"
    );
}

#[tokio::test]
async fn test_retry_attempts_consume_permits() {
    let server = MockServer::start().await;
    mount_token_endpoint(&server).await;

    Mock::given(method("GET"))
        .and(path("/v1.0/me"))
        .respond_with(ResponseTemplate::new(503))
        .up_to_n_times(1)
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/v1.0/me"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({})))
        .mount(&server)
        .await;

    // Window of 1 permit per second: the retry needs a second permit, so
    // the dispatch must straddle a window roll.
    let mut config = limited_config(1, 1);
    config.retry.base_delay_ms = 100;

    let engine = engine_with_config(&server, config);
    let started = Instant::now();
    let resp = engine
        .dispatch(DispatchRequest::get(Audience::Graph, "/me"))
        .await
        .unwrap();

    assert_eq!(resp.attempts, 2);
    assert!(
        started.elapsed() >= Duration::from_millis(800),
        "second attempt should have waited for the next window"
    );
}

#[tokio::test]
async fn test_under_capacity_burst_is_not_delayed() {
    let server = MockServer::start().await;
    mount_token_endpoint(&server).await;

    Mock::given(method("GET"))
        .and(path("/v1.0/me"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({})))
        .expect(5)
        .mount(&server)
        .await;

    let engine = Arc::new(engine_with_config(&server, limited_config(100, 60)));
    let started = Instant::now();

    let mut handles = Vec::new();
    for _ in 0..5 {
        let engine = Arc::clone(&engine);
        handles.push(tokio::spawn(async move {
            engine
                .dispatch(DispatchRequest::get(Audience::Graph, "/me"))
                .await
        }));
    }
    for handle in handles {
        handle.await.unwrap().unwrap();
    }

    assert!(
        started.elapsed() < Duration::from_secs(5),
        "under-capacity burst must not block on the limiter"
    );
}
