//! Token caching: sharing, single-flight refresh, audience independence.

use std::sync::Arc;

use wiremock::matchers::{body_string_contains, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use msbridge_core::domain::{Audience, DispatchRequest};
use msbridge_core::errors::ErrorKind;

use crate::common::{engine_for, mount_token_endpoint, token_path};

#[tokio::test]
async fn test_sequential_dispatches_share_one_token() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path(token_path()))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "token_type": "Bearer",
            "expires_in": 3600,
            "access_token": "shared"
        })))
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/v1.0/me"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({})))
        .expect(5)
        .mount(&server)
        .await;

    let engine = engine_for(&server);
    for _ in 0..5 {
        engine
            .dispatch(DispatchRequest::get(Audience::Graph, "/me"))
            .await
            .unwrap();
    }
}

#[tokio::test]
async fn test_concurrent_first_dispatches_single_flight_the_refresh() {
    let server = MockServer::start().await;

    // A burst of cold-cache dispatches may produce exactly one token call.
    Mock::given(method("POST"))
        .and(path(token_path()))
        .respond_with(
            ResponseTemplate::new(200)
                .set_delay(std::time::Duration::from_millis(50))
                .set_body_json(serde_json::json!({
                    "token_type": "Bearer",
                    "expires_in": 3600,
                    "access_token": "single-flight"
                })),
        )
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/v1.0/me"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({})))
        .expect(10)
        .mount(&server)
        .await;

    let engine = Arc::new(engine_for(&server));
    let mut handles = Vec::new();
    for _ in 0..10 {
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
}

#[tokio::test]
async fn test_audiences_get_independent_tokens() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path(token_path()))
        .and(body_string_contains("graph.microsoft.com"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "token_type": "Bearer",
            "expires_in": 3600,
            "access_token": "graph-token"
        })))
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("POST"))
        .and(path(token_path()))
        .and(body_string_contains("management.azure.com"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "token_type": "Bearer",
            "expires_in": 3600,
            "access_token": "azure-token"
        })))
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/v1.0/me"))
        .and(wiremock::matchers::header("authorization", "Bearer graph-token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({})))
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/subscriptions"))
        .and(wiremock::matchers::header("authorization", "Bearer azure-token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"value": []})))
        .mount(&server)
        .await;

    let engine = engine_for(&server);

    engine
        .dispatch(DispatchRequest::get(Audience::Graph, "/me"))
        .await
        .unwrap();
    engine
        .dispatch(
            DispatchRequest::get(Audience::Azure, "/subscriptions")
                .with_api_version("2022-12-01"),
        )
        .await
        .unwrap();

    let health = engine.health_status();
    let mut cached = health.audiences_with_cached_token;
    cached.sort();
    assert_eq!(cached, vec!["azure".to_string(), "graph".to_string()]);
}

#[tokio::test]
async fn test_invalid_client_is_fatal_and_not_retried() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path(token_path()))
        .respond_with(ResponseTemplate::new(401).set_body_json(serde_json::json!({
            "error": "invalid_client",
            "error_description": "AADSTS7000215: invalid client secret"
        })))
        .expect(1)
        .mount(&server)
        .await;

    // No Graph mock: the dispatch must die at the token step.
    let engine = engine_for(&server);
    let err = engine
        .dispatch(DispatchRequest::get(Audience::Graph, "/me"))
        .await
        .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::Authentication);
    assert!(err.message().contains("invalid_client"));
    assert_eq!(err.attempts(), 1);
}

#[tokio::test]
async fn test_token_endpoint_5xx_is_retried() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path(token_path()))
        .respond_with(ResponseTemplate::new(503))
        .up_to_n_times(1)
        .mount(&server)
        .await;

    Mock::given(method("POST"))
        .and(path(token_path()))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "token_type": "Bearer",
            "expires_in": 3600,
            "access_token": "recovered"
        })))
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/v1.0/me"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({})))
        .mount(&server)
        .await;

    let mut config = msbridge_core::config::Config::default();
    config.retry.base_delay_ms = 100;

    let engine = crate::common::engine_with_config(&server, config);
    let resp = engine
        .dispatch(DispatchRequest::get(Audience::Graph, "/me"))
        .await
        .unwrap();

    assert_eq!(resp.http_status, 200);
    assert_eq!(resp.attempts, 2);
}

#[tokio::test]
async fn test_invalidate_forces_refresh() {
    let server = MockServer::start().await;
    mount_token_endpoint(&server).await;

    Mock::given(method("GET"))
        .and(path("/v1.0/me"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({})))
        .mount(&server)
        .await;

    let engine = engine_for(&server);

    engine
        .dispatch(DispatchRequest::get(Audience::Graph, "/me"))
        .await
        .unwrap();
    assert_eq!(
        engine.health_status().audiences_with_cached_token,
        vec!["graph".to_string()]
    );

    engine.invalidate(Audience::Graph);
    assert!(engine
        .health_status()
        .audiences_with_cached_token
        .is_empty());

    // Next dispatch refreshes and succeeds again.
    engine
        .dispatch(DispatchRequest::get(Audience::Graph, "/me"))
        .await
        .unwrap();
    assert_eq!(
        engine.health_status().audiences_with_cached_token,
        vec!["graph".to_string()]
    );
}
