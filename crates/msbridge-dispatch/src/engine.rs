//! The dispatch engine.
//!
//! One [`Engine`] per process. It owns the singletons every dispatch
//! shares (credential store, token cache, rate limiter, HTTP client) and
//! runs the per-request pipeline: validate, route, authenticate, rate
//! limit, execute with retries, paginate, shape.
//!
//! Each dispatch runs under one overall deadline covering every retry and
//! every page, and honors caller cancellation at every suspension point.

use std::sync::Arc;
use std::time::{Duration, Instant};

use serde_json::Value;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use url::Url;

use msbridge_core::config::Config;
use msbridge_core::domain::{
    Audience, DispatchRequest, DispatchResponse, HealthStatus, ResponseFormat,
};
use msbridge_core::errors::DispatchError;

use crate::credentials::CredentialStore;
use crate::http::{Attempt, HttpExecutor};
use crate::paginate;
use crate::rate_limit::FixedWindowLimiter;
use crate::retry::RetryPolicy;
use crate::route::{EndpointRouter, Route};
use crate::shape::shape;
use crate::token::TokenCache;

/// Outcome of the inner pipeline, before shaping.
struct Dispatched {
    value: Value,
    http_status: u16,
    attempts: u32,
    items_fetched: u64,
}

/// Process-singleton dispatch engine.
///
/// Cheap to share behind an `Arc`; all mutable state lives in the token
/// cache and rate limiter, which are designed for concurrent use.
#[derive(Debug)]
pub struct Engine {
    credentials: Arc<CredentialStore>,
    tokens: TokenCache,
    limiter: FixedWindowLimiter,
    http: HttpExecutor,
    router: EndpointRouter,
    default_max_retries: u32,
    default_base_delay_ms: u64,
    default_timeout_ms: u64,
}

impl Engine {
    /// An engine with production endpoints and credentials from `config`.
    pub fn new(config: Config) -> Self {
        Self::builder().config(config).build()
    }

    pub fn builder() -> EngineBuilder {
        EngineBuilder::default()
    }

    /// Dispatches one request without external cancellation.
    pub async fn dispatch(&self, req: DispatchRequest) -> Result<DispatchResponse, DispatchError> {
        self.dispatch_with_cancellation(req, CancellationToken::new())
            .await
    }

    /// Dispatches one request, honoring `cancel` at every suspension point
    /// (rate-limit wait, backoff sleep, network round-trip, token refresh).
    ///
    /// The overall deadline is the request's `timeoutMs` (or the configured
    /// default) and covers the entire dispatch: all retries and all pages.
    pub async fn dispatch_with_cancellation(
        &self,
        req: DispatchRequest,
        cancel: CancellationToken,
    ) -> Result<DispatchResponse, DispatchError> {
        req.validate()?;

        let started = Instant::now();
        let budget =
            Duration::from_millis(req.timeout_ms.unwrap_or(self.default_timeout_ms));
        let deadline = started + budget;

        let dispatched = tokio::select! {
            _ = cancel.cancelled() => {
                debug!(path = %req.path, "dispatch cancelled");
                Err(DispatchError::cancelled())
            }
            outcome = tokio::time::timeout(budget, self.run(&req, deadline)) => {
                match outcome {
                    Ok(result) => result,
                    Err(_) => Err(DispatchError::timeout(budget.as_millis() as u64)),
                }
            }
        }?;

        let execution_ms = started.elapsed().as_millis() as u64;
        let value = shape(
            dispatched.value,
            req.response_format,
            req.audience,
            req.method,
            &req.path,
            execution_ms,
            dispatched.items_fetched,
        );

        Ok(DispatchResponse {
            value,
            execution_ms,
            items_fetched: dispatched.items_fetched,
            attempts: dispatched.attempts,
            http_status: dispatched.http_status,
        })
    }

    /// Non-blocking health snapshot; safe before credentials exist.
    pub fn health_status(&self) -> HealthStatus {
        let has_credentials = self.credentials.has_credentials();
        HealthStatus {
            ready: has_credentials,
            has_credentials,
            audiences_with_cached_token: self.tokens.cached_audiences(),
        }
    }

    /// Forces the next dispatch for `audience` to refresh its token.
    /// Callers invoke this after an `authorization` error.
    pub fn invalidate(&self, audience: Audience) {
        self.tokens.invalidate(audience);
    }

    /// The pipeline behind the deadline/cancellation wrapper.
    async fn run(
        &self,
        req: &DispatchRequest,
        deadline: Instant,
    ) -> Result<Dispatched, DispatchError> {
        let route = self
            .router
            .resolve(req.audience, &req.path, req.api_version.as_deref());
        let policy = RetryPolicy::new(
            req.max_retries.unwrap_or(self.default_max_retries),
            req.retry_base_delay_ms.unwrap_or(self.default_base_delay_ms),
        );
        let first_url = build_url(&route, req)?;

        if req.fetch_all {
            self.fetch_all_pages(req, &route, policy, first_url, deadline)
                .await
        } else {
            let (value, http_status, attempts) = self
                .single_page(req, &route, policy, first_url, deadline)
                .await?;
            Ok(Dispatched {
                value,
                http_status,
                attempts,
                items_fetched: 0,
            })
        }
    }

    /// One page: the attempt cycle of token → rate permit → round-trip,
    /// repeated under the retry policy. The permit is re-acquired before
    /// every attempt; each upstream attempt consumes real capacity.
    async fn single_page(
        &self,
        req: &DispatchRequest,
        route: &Route,
        policy: RetryPolicy,
        url: Url,
        deadline: Instant,
    ) -> Result<(Value, u16, u32), DispatchError> {
        let raw = req.response_format == ResponseFormat::Raw && !req.fetch_all;
        let mut attempt = 0u32;

        loop {
            attempt += 1;

            let token = match self.tokens.get(route.audience).await {
                Ok(token) => token,
                Err(error) => {
                    let decision = policy.decide(attempt, &error, None);
                    if !decision.retry {
                        return Err(error.with_attempts(attempt));
                    }
                    warn!(reason = %decision.reason, "token acquisition failed, retrying");
                    tokio::time::sleep(decision.delay).await;
                    continue;
                }
            };

            self.limiter.acquire().await;

            let outcome = self
                .http
                .execute(Attempt {
                    method: req.method,
                    url: url.clone(),
                    headers: &req.headers,
                    body: req.body.as_ref(),
                    bearer: &token,
                    raw,
                    timeout: deadline.saturating_duration_since(Instant::now()),
                })
                .await;

            match outcome {
                Ok(success) => {
                    if attempt > 1 {
                        info!(
                            path = url.path(),
                            attempt, "request succeeded after retry"
                        );
                    }
                    return Ok((success.value, success.status, attempt));
                }
                Err(failure) => {
                    let decision = policy.decide(attempt, &failure.error, failure.retry_after);
                    if !decision.retry {
                        return Err(failure.error.with_attempts(attempt));
                    }
                    warn!(
                        path = url.path(),
                        attempt,
                        delay_ms = decision.delay.as_millis() as u64,
                        reason = %decision.reason,
                        "retrying upstream request"
                    );
                    tokio::time::sleep(decision.delay).await;
                }
            }
        }
    }

    /// Walks `@odata.nextLink` cursors, concatenating each page's `value`
    /// array. All-or-nothing: any page failure fails the whole dispatch and
    /// the accumulator is dropped, because a caller cannot tell a truncated
    /// page set from a complete one.
    async fn fetch_all_pages(
        &self,
        req: &DispatchRequest,
        route: &Route,
        policy: RetryPolicy,
        first_url: Url,
        deadline: Instant,
    ) -> Result<Dispatched, DispatchError> {
        let mut items: Vec<Value> = Vec::new();
        let mut first_context: Option<String> = None;
        let mut current = first_url;
        let mut pages = 0u32;
        let mut http_status = 200u16;
        let mut attempts = 1u32;

        loop {
            let (body, status, page_attempts) = self
                .single_page(req, route, policy, current, deadline)
                .await?;
            pages += 1;
            http_status = status;
            attempts = page_attempts;

            if first_context.is_none() {
                first_context = paginate::context(&body).map(str::to_string);
            }

            // The cursor is authoritative: it already carries the host and
            // query, and the audience stays the one resolved for page 1.
            let next = paginate::next_link(&body).map(str::to_string);
            let page_items = paginate::take_items(body)?;
            items.extend(page_items);

            debug!(pages, total_items = items.len(), "fetched page");

            match next {
                Some(link) => {
                    current = Url::parse(&link).map_err(|e| {
                        DispatchError::protocol(format!("invalid nextLink cursor: {e}"))
                    })?;
                }
                None => break,
            }
        }

        let items_fetched = items.len() as u64;
        Ok(Dispatched {
            value: paginate::assemble(first_context, items),
            http_status,
            attempts,
            items_fetched,
        })
    }
}

/// Builds the effective URL for the first request of a dispatch.
///
/// Absolute paths are pagination cursors and are used verbatim; nothing is
/// merged onto them. Relative paths are joined onto the routed base URL and
/// get the caller's query parameters plus the OData options derived from
/// `selectFields`/`expandFields`/`batchSize` (GET only; dropped with a
/// warning otherwise).
fn build_url(route: &Route, req: &DispatchRequest) -> Result<Url, DispatchError> {
    if req.path_is_absolute() {
        return Url::parse(&req.path)
            .map_err(|e| DispatchError::invalid_argument(format!("invalid absolute path: {e}")));
    }

    let joined = match route.audience {
        Audience::Azure => format!("{}{}", route.base_url, req.path),
        Audience::Graph | Audience::Intune => format!(
            "{}/{}{}",
            route.base_url,
            route.api_version.as_deref().unwrap_or_default(),
            req.path
        ),
    };

    let mut url = Url::parse(&joined)
        .map_err(|e| DispatchError::invalid_argument(format!("invalid request path: {e}")))?;

    let odata_options = !req.select_fields.is_empty()
        || !req.expand_fields.is_empty()
        || req.batch_size.is_some();

    {
        let mut pairs = url.query_pairs_mut();

        for (name, value) in &req.query_params {
            pairs.append_pair(name, value);
        }

        if route.audience == Audience::Azure {
            if let Some(version) = &route.api_version {
                pairs.append_pair("api-version", version);
            }
        }

        if req.method.is_get() {
            if !req.select_fields.is_empty() {
                pairs.append_pair("$select", &req.select_fields.join(","));
            }
            if !req.expand_fields.is_empty() {
                pairs.append_pair("$expand", &req.expand_fields.join(","));
            }
            if let Some(top) = req.batch_size {
                pairs.append_pair("$top", &top.to_string());
            }
        }
    }

    if !req.method.is_get() && odata_options {
        warn!(
            method = req.method.as_str(),
            path = %req.path,
            "selectFields/expandFields/batchSize ignored on non-GET request"
        );
    }

    Ok(url)
}

/// Builds [`Engine`] instances; tests use it to point every upstream at a
/// mock server.
#[derive(Debug, Default)]
pub struct EngineBuilder {
    config: Config,
    credentials: Option<CredentialStore>,
    graph_base: Option<String>,
    azure_base: Option<String>,
    token_endpoint: Option<String>,
}

impl EngineBuilder {
    pub fn config(mut self, config: Config) -> Self {
        self.config = config;
        self
    }

    /// Overrides the credentials read from config (tests).
    pub fn credentials(mut self, credentials: CredentialStore) -> Self {
        self.credentials = Some(credentials);
        self
    }

    pub fn graph_base(mut self, base: impl Into<String>) -> Self {
        self.graph_base = Some(base.into());
        self
    }

    pub fn azure_base(mut self, base: impl Into<String>) -> Self {
        self.azure_base = Some(base.into());
        self
    }

    pub fn token_endpoint(mut self, base: impl Into<String>) -> Self {
        self.token_endpoint = Some(base.into());
        self
    }

    pub fn build(self) -> Engine {
        let config = self.config;
        let credentials = Arc::new(
            self.credentials
                .unwrap_or_else(|| CredentialStore::from_config(&config.auth)),
        );

        let client = reqwest::Client::new();

        let mut tokens = TokenCache::new(client.clone(), Arc::clone(&credentials));
        if let Some(base) = self.token_endpoint {
            tokens = tokens.with_endpoint_base(base);
        }

        let router = match (self.graph_base, self.azure_base) {
            (None, None) => EndpointRouter::new(),
            (graph, azure) => EndpointRouter::with_bases(
                graph.unwrap_or_else(|| crate::route::GRAPH_BASE_URL.to_string()),
                azure.unwrap_or_else(|| crate::route::AZURE_BASE_URL.to_string()),
            ),
        };

        Engine {
            credentials,
            tokens,
            limiter: FixedWindowLimiter::new(
                config.rate_limit.max_per_window,
                Duration::from_secs(config.rate_limit.window_secs),
            ),
            http: HttpExecutor::new(client),
            router,
            default_max_retries: config.retry.max_retries,
            default_base_delay_ms: config.retry.base_delay_ms,
            default_timeout_ms: config.request.default_timeout_ms,
        }
    }
}
