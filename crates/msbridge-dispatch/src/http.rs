//! Single-request HTTP executor.
//!
//! One round-trip per call: build the request with auth and correlation
//! headers, send, classify the response. Retrying, pagination, and rate
//! limiting all live above this layer.

use std::collections::HashMap;
use std::time::Duration;

use reqwest::{Method, StatusCode};
use serde_json::Value;
use tracing::debug;
use url::Url;
use uuid::Uuid;

use msbridge_core::domain::HttpMethod;
use msbridge_core::errors::{DispatchError, ErrorKind};

use crate::retry::parse_retry_after;

/// User-Agent presented to the upstream APIs.
const USER_AGENT: &str = concat!("msbridge/", env!("CARGO_PKG_VERSION"));

/// Upstream correlation-id response header.
const REQUEST_ID_HEADER: &str = "request-id";

/// Our correlation-id request header.
const CLIENT_REQUEST_ID_HEADER: &str = "client-request-id";

/// One fully-formed upstream attempt.
#[derive(Debug)]
pub struct Attempt<'a> {
    pub method: HttpMethod,
    pub url: Url,
    pub headers: &'a HashMap<String, String>,
    pub body: Option<&'a Value>,
    pub bearer: &'a str,
    /// Skip JSON parsing and hand back the body as-is.
    pub raw: bool,
    /// Per-attempt deadline (remaining dispatch budget).
    pub timeout: Duration,
}

/// A classified 2xx response.
#[derive(Debug)]
pub struct AttemptSuccess {
    pub status: u16,
    pub value: Value,
    pub request_id: Option<String>,
    pub client_request_id: String,
}

/// A classified failure, with the `Retry-After` hint when upstream sent one.
#[derive(Debug)]
pub struct AttemptFailure {
    pub error: DispatchError,
    pub retry_after: Option<Duration>,
}

/// Thin wrapper over a shared `reqwest::Client`.
#[derive(Debug, Clone)]
pub struct HttpExecutor {
    client: reqwest::Client,
}

impl HttpExecutor {
    pub fn new(client: reqwest::Client) -> Self {
        Self { client }
    }

    /// Performs one round-trip. Redirects follow the HTTP library default
    /// and count as part of the same attempt.
    pub async fn execute(&self, attempt: Attempt<'_>) -> Result<AttemptSuccess, AttemptFailure> {
        let client_request_id = Uuid::new_v4().to_string();

        let mut builder = self
            .client
            .request(to_reqwest_method(attempt.method), attempt.url.clone())
            .bearer_auth(attempt.bearer)
            .header(CLIENT_REQUEST_ID_HEADER, &client_request_id)
            .header(reqwest::header::USER_AGENT, USER_AGENT)
            .header(reqwest::header::ACCEPT, "application/json")
            .timeout(attempt.timeout);

        for (name, value) in attempt.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }

        if let Some(body) = attempt.body {
            builder = builder.json(body);
        }

        debug!(
            method = attempt.method.as_str(),
            path = attempt.url.path(),
            client_request_id = %client_request_id,
            "sending upstream request"
        );

        let response = match builder.send().await {
            Ok(response) => response,
            Err(e) => {
                // Connect errors, per-attempt timeouts, TLS failures: all
                // transient from the dispatcher's point of view.
                return Err(AttemptFailure {
                    error: DispatchError::new(
                        ErrorKind::UpstreamTransient,
                        format!("network error: {e}"),
                    )
                    .with_client_request_id(client_request_id),
                    retry_after: None,
                });
            }
        };

        let status = response.status();
        let request_id = header_value(&response, REQUEST_ID_HEADER);
        let retry_after = response
            .headers()
            .get(reqwest::header::RETRY_AFTER)
            .and_then(|v| v.to_str().ok())
            .and_then(parse_retry_after);

        let text = match response.text().await {
            Ok(text) => text,
            Err(e) => {
                return Err(AttemptFailure {
                    error: DispatchError::new(
                        ErrorKind::UpstreamTransient,
                        format!("failed reading response body: {e}"),
                    )
                    .with_status(status.as_u16())
                    .with_client_request_id(client_request_id),
                    retry_after: None,
                });
            }
        };

        if status.is_success() {
            let value = if attempt.raw {
                serde_json::from_str(&text).unwrap_or(Value::String(text))
            } else if text.is_empty() {
                Value::Null
            } else {
                match serde_json::from_str(&text) {
                    Ok(value) => value,
                    Err(e) => {
                        return Err(AttemptFailure {
                            error: DispatchError::protocol(format!(
                                "upstream returned {status} with invalid JSON: {e}"
                            ))
                            .with_status(status.as_u16())
                            .with_client_request_id(client_request_id),
                            retry_after: None,
                        });
                    }
                }
            };

            return Ok(AttemptSuccess {
                status: status.as_u16(),
                value,
                request_id,
                client_request_id,
            });
        }

        let mut error = classify_status(status, &text);
        error = error.with_status(status.as_u16());
        if let Some(id) = request_id {
            error = error.with_request_id(id);
        }
        error = error.with_client_request_id(client_request_id);

        Err(AttemptFailure { error, retry_after })
    }
}

/// Maps a non-2xx status to the error taxonomy.
fn classify_status(status: StatusCode, body: &str) -> DispatchError {
    let detail = upstream_message(body);

    match status.as_u16() {
        401 | 403 => DispatchError::new(
            ErrorKind::Authorization,
            format!("upstream denied the request: {detail}"),
        ),
        429 => DispatchError::new(ErrorKind::RateLimited, "upstream throttled the request"),
        408 | 423 => DispatchError::new(
            ErrorKind::UpstreamTransient,
            format!("upstream returned {status}: {detail}"),
        ),
        400..=499 => DispatchError::new(ErrorKind::Client, format!("{status}: {detail}")),
        _ => DispatchError::new(
            ErrorKind::UpstreamTransient,
            format!("upstream returned {status}: {detail}"),
        ),
    }
}

/// Best-effort extraction of the Graph/ARM error message from a body like
/// `{"error": {"code": "...", "message": "..."}}`. Falls back to a
/// truncated raw body.
fn upstream_message(body: &str) -> String {
    if let Ok(value) = serde_json::from_str::<Value>(body) {
        let code = value["error"]["code"].as_str();
        let message = value["error"]["message"].as_str();
        if let (Some(code), Some(message)) = (code, message) {
            return format!("{code}: {message}");
        }
        if let Some(message) = message.or_else(|| value["message"].as_str()) {
            return message.to_string();
        }
    }

    let mut detail: String = body.chars().take(200).collect();
    if detail.is_empty() {
        detail.push_str("(empty body)");
    }
    detail
}

fn header_value(response: &reqwest::Response, name: &str) -> Option<String> {
    response
        .headers()
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string)
}

fn to_reqwest_method(method: HttpMethod) -> Method {
    match method {
        HttpMethod::Get => Method::GET,
        HttpMethod::Post => Method::POST,
        HttpMethod::Put => Method::PUT,
        HttpMethod::Patch => Method::PATCH,
        HttpMethod::Delete => Method::DELETE,
    }
}
