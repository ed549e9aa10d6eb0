//! Per-audience bearer-token cache with single-flight refresh.
//!
//! One cached token per [`Audience`]. A cache hit is lock-free apart from a
//! read lock; a miss funnels all concurrent callers for that audience
//! through one refresh (single-flight), while other audiences stay
//! completely independent. Tokens live only in memory and die with the
//! process.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, RwLock};
use std::time::{Duration, Instant};

use serde::Deserialize;
use std::sync::Arc;
use tracing::{debug, warn};

use msbridge_core::domain::Audience;
use msbridge_core::errors::{DispatchError, ErrorKind};

use crate::credentials::CredentialStore;

/// Default host for the Microsoft identity platform token endpoint.
const DEFAULT_TOKEN_ENDPOINT_BASE: &str = "https://login.microsoftonline.com";

/// Safety margin subtracted from expiry so a token never expires mid-flight.
const EXPIRY_SKEW: Duration = Duration::from_secs(60);

/// Deadline for one token-endpoint round-trip.
const TOKEN_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Successful token-endpoint response body.
#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    expires_in: u64,
}

/// Error body returned by the identity platform on a failed grant.
#[derive(Debug, Deserialize)]
struct TokenErrorResponse {
    #[serde(default)]
    error: String,
    #[serde(default)]
    error_description: String,
}

/// A cached bearer token for one audience.
#[derive(Debug, Clone)]
struct CachedToken {
    value: String,
    /// Absolute expiry with the skew already subtracted.
    expires_at: Instant,
}

impl CachedToken {
    /// Fresh enough to hand out: at least one more skew window of life left.
    fn is_fresh(&self, now: Instant) -> bool {
        self.expires_at.saturating_duration_since(now) >= EXPIRY_SKEW
    }
}

/// Per-audience slot: the cached token plus the single-flight machinery.
#[derive(Debug)]
struct AudienceSlot {
    cached: RwLock<Option<CachedToken>>,
    /// Serializes refreshes for this audience only.
    refresh: tokio::sync::Mutex<()>,
    /// Bumped after every refresh attempt, success or failure.
    epoch: AtomicU64,
    /// Error of the most recent failed refresh, shared with waiters that
    /// were queued behind it.
    last_error: Mutex<Option<DispatchError>>,
}

impl AudienceSlot {
    fn new() -> Self {
        Self {
            cached: RwLock::new(None),
            refresh: tokio::sync::Mutex::new(()),
            epoch: AtomicU64::new(0),
            last_error: Mutex::new(None),
        }
    }
}

/// Process-wide token cache, shared by all concurrent dispatches.
#[derive(Debug)]
pub struct TokenCache {
    http: reqwest::Client,
    credentials: Arc<CredentialStore>,
    endpoint_base: String,
    slots: [AudienceSlot; 3],
}

impl TokenCache {
    pub fn new(http: reqwest::Client, credentials: Arc<CredentialStore>) -> Self {
        Self {
            http,
            credentials,
            endpoint_base: DEFAULT_TOKEN_ENDPOINT_BASE.to_string(),
            slots: [AudienceSlot::new(), AudienceSlot::new(), AudienceSlot::new()],
        }
    }

    /// Points the cache at a different identity host (mock server in tests).
    pub fn with_endpoint_base(mut self, base: impl Into<String>) -> Self {
        self.endpoint_base = base.into();
        self
    }

    /// Returns a bearer token for `audience`, refreshing if the cached one
    /// is absent or within the skew window of expiry.
    pub async fn get(&self, audience: Audience) -> Result<String, DispatchError> {
        let slot = &self.slots[audience.index()];

        if let Some(value) = self.fresh_value(slot) {
            return Ok(value);
        }

        // Miss: queue behind any in-flight refresh for this audience.
        let observed_epoch = slot.epoch.load(Ordering::Acquire);
        let _refresh_guard = slot.refresh.lock().await;

        // Another caller may have refreshed while we waited.
        if let Some(value) = self.fresh_value(slot) {
            return Ok(value);
        }

        // A refresh completed while we waited and it failed: share its
        // error instead of hammering the token endpoint once per waiter.
        if slot.epoch.load(Ordering::Acquire) != observed_epoch {
            if let Some(err) = slot.last_error.lock().unwrap().clone() {
                return Err(err);
            }
        }

        let result = self.fetch_token(audience).await;
        slot.epoch.fetch_add(1, Ordering::Release);

        match result {
            Ok(token) => {
                let value = token.value.clone();
                *slot.cached.write().unwrap() = Some(token);
                *slot.last_error.lock().unwrap() = None;
                debug!(audience = %audience, "token refreshed");
                Ok(value)
            }
            Err(err) => {
                *slot.last_error.lock().unwrap() = Some(err.clone());
                Err(err)
            }
        }
    }

    /// Drops the cached token so the next `get` refreshes. Used by error
    /// handlers after an upstream 401/403.
    pub fn invalidate(&self, audience: Audience) {
        let slot = &self.slots[audience.index()];
        *slot.cached.write().unwrap() = None;
        debug!(audience = %audience, "token invalidated");
    }

    /// Audience names currently holding a fresh token, for health output.
    pub fn cached_audiences(&self) -> Vec<String> {
        let now = Instant::now();
        Audience::ALL
            .iter()
            .filter(|audience| {
                self.slots[audience.index()]
                    .cached
                    .read()
                    .unwrap()
                    .as_ref()
                    .is_some_and(|token| token.is_fresh(now))
            })
            .map(|audience| audience.as_str().to_string())
            .collect()
    }

    fn fresh_value(&self, slot: &AudienceSlot) -> Option<String> {
        let cached = slot.cached.read().unwrap();
        cached
            .as_ref()
            .filter(|token| token.is_fresh(Instant::now()))
            .map(|token| token.value.clone())
    }

    /// One client-credentials grant against the identity platform.
    async fn fetch_token(&self, audience: Audience) -> Result<CachedToken, DispatchError> {
        let creds = self.credentials.require()?;
        let scope = CredentialStore::scope_for(audience);
        let url = format!(
            "{}/{}/oauth2/v2.0/token",
            self.endpoint_base, creds.tenant_id
        );

        let form = [
            ("client_id", creds.client_id),
            ("client_secret", creds.client_secret),
            ("grant_type", "client_credentials"),
            ("scope", scope),
        ];

        let response = self
            .http
            .post(&url)
            .form(&form)
            .timeout(TOKEN_REQUEST_TIMEOUT)
            .send()
            .await
            .map_err(|e| {
                // Network-level failure; retryable one level up.
                DispatchError::new(
                    ErrorKind::UpstreamTransient,
                    format!("token endpoint unreachable: {e}"),
                )
            })?;

        let status = response.status();
        if status.is_success() {
            let parsed: TokenResponse = response.json().await.map_err(|e| {
                DispatchError::protocol(format!("malformed token response: {e}"))
            })?;
            return Ok(CachedToken {
                value: parsed.access_token,
                expires_at: Instant::now()
                    + Duration::from_secs(parsed.expires_in.saturating_sub(EXPIRY_SKEW.as_secs())),
            });
        }

        let body = response.text().await.unwrap_or_default();
        let parsed: TokenErrorResponse = serde_json::from_str(&body).unwrap_or_else(|_| {
            TokenErrorResponse {
                error: "unknown".into(),
                error_description: String::new(),
            }
        });

        if status.is_client_error() {
            // invalid_client, bad tenant, revoked secret: fatal, not retried.
            warn!(audience = %audience, error = %parsed.error, "token grant rejected");
            Err(DispatchError::authentication(format!(
                "token grant rejected ({}): {}",
                parsed.error,
                truncate(&parsed.error_description, 200)
            ))
            .with_status(status.as_u16()))
        } else {
            Err(DispatchError::new(
                ErrorKind::UpstreamTransient,
                format!("token endpoint returned {status}"),
            )
            .with_status(status.as_u16()))
        }
    }
}

fn truncate(s: &str, max: usize) -> &str {
    match s.char_indices().nth(max) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}
