//! Pagination: cursor following, accumulation, and all-or-nothing failure.

use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use msbridge_core::config::Config;
use msbridge_core::domain::{Audience, DispatchRequest};
use msbridge_core::errors::ErrorKind;

use crate::common::{engine_for, engine_with_config, mount_token_endpoint};

#[tokio::test]
async fn test_two_page_fetch_all_concatenates_values() {
    let server = MockServer::start().await;
    mount_token_endpoint(&server).await;

    // Page 1 carries the cursor; it matches only once.
    Mock::given(method("GET"))
        .and(path("/v1.0/users"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "@odata.context": "https://graph.microsoft.com/v1.0/$metadata#users",
            "value": [{"id": "a"}, {"id": "b"}],
            "@odata.nextLink": format!("{}/v1.0/users?$skiptoken=page2", server.uri())
        })))
        .up_to_n_times(1)
        .mount(&server)
        .await;

    // Page 2, reached through the absolute cursor URL.
    Mock::given(method("GET"))
        .and(path("/v1.0/users"))
        .and(query_param("$skiptoken", "page2"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "value": [{"id": "c"}]
        })))
        .mount(&server)
        .await;

    let engine = engine_for(&server);
    let resp = engine
        .dispatch(
            DispatchRequest::get(Audience::Graph, "/users")
                .with_fetch_all(true)
                .with_batch_size(2)
                .with_select(vec!["id".into(), "displayName".into()]),
        )
        .await
        .unwrap();

    assert_eq!(resp.items_fetched, 3);
    assert_eq!(resp.attempts, 1);

    let body = &resp.value["body"];
    assert_eq!(body["totalCount"], 3);
    assert_eq!(
        body["@odata.context"],
        "https://graph.microsoft.com/v1.0/$metadata#users"
    );
    assert_eq!(
        body["value"],
        serde_json::json!([{"id": "a"}, {"id": "b"}, {"id": "c"}])
    );
    assert!(body["fetchedAt"].is_string());
}

#[tokio::test]
async fn test_batch_size_applied_as_top() {
    let server = MockServer::start().await;
    mount_token_endpoint(&server).await;

    Mock::given(method("GET"))
        .and(path("/v1.0/users"))
        .and(query_param("$top", "1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "value": [{"id": "only"}]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let engine = engine_for(&server);
    let resp = engine
        .dispatch(
            DispatchRequest::get(Audience::Graph, "/users")
                .with_fetch_all(true)
                .with_batch_size(1),
        )
        .await
        .unwrap();

    assert_eq!(resp.items_fetched, 1);
}

#[tokio::test]
async fn test_single_page_fetch_all_still_aggregates() {
    let server = MockServer::start().await;
    mount_token_endpoint(&server).await;

    Mock::given(method("GET"))
        .and(path("/v1.0/groups"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "value": []
        })))
        .mount(&server)
        .await;

    let engine = engine_for(&server);
    let resp = engine
        .dispatch(DispatchRequest::get(Audience::Graph, "/groups").with_fetch_all(true))
        .await
        .unwrap();

    assert_eq!(resp.items_fetched, 0);
    assert_eq!(resp.value["body"]["totalCount"], 0);
}

#[tokio::test]
async fn test_paginated_body_without_value_is_protocol_error() {
    let server = MockServer::start().await;
    mount_token_endpoint(&server).await;

    Mock::given(method("GET"))
        .and(path("/v1.0/users"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(serde_json::json!({"id": "not-a-page"})),
        )
        .mount(&server)
        .await;

    let engine = engine_for(&server);
    let err = engine
        .dispatch(DispatchRequest::get(Audience::Graph, "/users").with_fetch_all(true))
        .await
        .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::Protocol);
}

#[tokio::test]
async fn test_mid_pagination_failure_discards_partial_pages() {
    let server = MockServer::start().await;
    mount_token_endpoint(&server).await;

    Mock::given(method("GET"))
        .and(path("/v1.0/users"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "value": [{"id": "a"}],
            "@odata.nextLink": format!("{}/v1.0/users?$skiptoken=page2", server.uri())
        })))
        .up_to_n_times(1)
        .mount(&server)
        .await;

    // Page 2 is a permanent client error: no amount of retrying helps, and
    // nothing from page 1 may leak out.
    Mock::given(method("GET"))
        .and(path("/v1.0/users"))
        .and(query_param("$skiptoken", "page2"))
        .respond_with(ResponseTemplate::new(404).set_body_json(serde_json::json!({
            "error": {"code": "ResourceNotFound", "message": "gone"}
        })))
        .mount(&server)
        .await;

    let engine = engine_for(&server);
    let err = engine
        .dispatch(DispatchRequest::get(Audience::Graph, "/users").with_fetch_all(true))
        .await
        .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::Client);
    assert_eq!(err.http_status(), Some(404));
}

#[tokio::test]
async fn test_pagination_retries_within_a_page() {
    let server = MockServer::start().await;
    mount_token_endpoint(&server).await;

    // First hit on the page fails transiently, second succeeds.
    Mock::given(method("GET"))
        .and(path("/v1.0/users"))
        .respond_with(ResponseTemplate::new(503))
        .up_to_n_times(1)
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/v1.0/users"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "value": [{"id": "a"}]
        })))
        .mount(&server)
        .await;

    let mut config = Config::default();
    config.retry.base_delay_ms = 100;

    let engine = engine_with_config(&server, config);
    let resp = engine
        .dispatch(DispatchRequest::get(Audience::Graph, "/users").with_fetch_all(true))
        .await
        .unwrap();

    assert_eq!(resp.items_fetched, 1);
    assert_eq!(resp.attempts, 2);
}
