//! Dispatch request model
//!
//! A [`DispatchRequest`] describes one logical call against Microsoft Graph
//! or Azure Resource Manager. Tool handlers build one of these from their
//! validated arguments and hand it to the dispatch engine; the engine owns
//! routing, authentication, rate limiting, retries, and pagination.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::domain::Audience;
use crate::errors::DispatchError;

/// Inclusive bounds for `batchSize` (`$top`).
pub const BATCH_SIZE_RANGE: (u32, u32) = (1, 1000);

/// Inclusive bounds for `maxRetries`.
pub const MAX_RETRIES_RANGE: (u32, u32) = (0, 5);

/// Inclusive bounds for `retryBaseDelayMs`.
pub const RETRY_BASE_DELAY_RANGE: (u64, u64) = (100, 10_000);

/// Inclusive bounds for `timeoutMs`.
pub const TIMEOUT_RANGE: (u64, u64) = (5_000, 300_000);

/// HTTP methods accepted by the dispatch engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum HttpMethod {
    #[default]
    Get,
    Post,
    Put,
    Patch,
    Delete,
}

impl HttpMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            HttpMethod::Get => "GET",
            HttpMethod::Post => "POST",
            HttpMethod::Put => "PUT",
            HttpMethod::Patch => "PATCH",
            HttpMethod::Delete => "DELETE",
        }
    }

    pub fn is_get(&self) -> bool {
        matches!(self, HttpMethod::Get)
    }
}

impl std::fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How the upstream body is shaped before it is returned to the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResponseFormat {
    /// Summary object wrapping the body with timing and item metrics.
    #[default]
    Full,
    /// The upstream body untouched (may be non-JSON for downloads).
    Raw,
    /// Just the `value` array when the body is `{ "value": [...] }`.
    Minimal,
}

/// One logical call against an upstream Microsoft API.
///
/// Deserializes directly from tool arguments (camelCase keys); unknown
/// fields are rejected, matching the declared input schema. Optional
/// tuning knobs (`maxRetries`, `retryBaseDelayMs`, `timeoutMs`) fall back to
/// the engine's configured defaults when absent.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct DispatchRequest {
    /// Target audience. `Intune` is never requested directly; the router
    /// derives it from the path.
    pub audience: Audience,

    /// Server-relative path (`/users`) or an absolute pagination cursor.
    pub path: String,

    #[serde(default)]
    pub method: HttpMethod,

    /// API version: defaults to `v1.0` for Graph, required for Azure.
    #[serde(default)]
    pub api_version: Option<String>,

    /// Caller-supplied query parameters, merged with `$select`/`$expand`/`$top`.
    #[serde(default)]
    pub query_params: HashMap<String, String>,

    /// Caller-supplied additional headers.
    #[serde(default)]
    pub headers: HashMap<String, String>,

    /// JSON request body, if any.
    #[serde(default)]
    pub body: Option<Value>,

    /// Follow `@odata.nextLink` cursors and concatenate all pages.
    #[serde(default)]
    pub fetch_all: bool,

    /// Page size, applied as `$top` on GET requests.
    #[serde(default)]
    pub batch_size: Option<u32>,

    /// Field projection, applied as `$select` on GET requests.
    #[serde(default)]
    pub select_fields: Vec<String>,

    /// Relation expansion, applied as `$expand` on GET requests.
    #[serde(default)]
    pub expand_fields: Vec<String>,

    #[serde(default)]
    pub response_format: ResponseFormat,

    #[serde(default)]
    pub max_retries: Option<u32>,

    #[serde(default)]
    pub retry_base_delay_ms: Option<u64>,

    /// Overall deadline for the whole dispatch, retries and pages included.
    #[serde(default)]
    pub timeout_ms: Option<u64>,
}

impl DispatchRequest {
    /// A GET request with every knob at its default.
    pub fn get(audience: Audience, path: impl Into<String>) -> Self {
        Self {
            audience,
            path: path.into(),
            method: HttpMethod::Get,
            api_version: None,
            query_params: HashMap::new(),
            headers: HashMap::new(),
            body: None,
            fetch_all: false,
            batch_size: None,
            select_fields: Vec::new(),
            expand_fields: Vec::new(),
            response_format: ResponseFormat::Full,
            max_retries: None,
            retry_base_delay_ms: None,
            timeout_ms: None,
        }
    }

    /// A request with an explicit method and JSON body.
    pub fn with_body(audience: Audience, method: HttpMethod, path: impl Into<String>, body: Value) -> Self {
        let mut req = Self::get(audience, path);
        req.method = method;
        req.body = Some(body);
        req
    }

    pub fn with_api_version(mut self, version: impl Into<String>) -> Self {
        self.api_version = Some(version.into());
        self
    }

    pub fn with_fetch_all(mut self, fetch_all: bool) -> Self {
        self.fetch_all = fetch_all;
        self
    }

    pub fn with_batch_size(mut self, batch_size: u32) -> Self {
        self.batch_size = Some(batch_size);
        self
    }

    pub fn with_select(mut self, fields: Vec<String>) -> Self {
        self.select_fields = fields;
        self
    }

    pub fn with_response_format(mut self, format: ResponseFormat) -> Self {
        self.response_format = format;
        self
    }

    /// True if `path` is an absolute URL, i.e. a pagination cursor that must
    /// be used verbatim instead of being joined onto a base URL.
    pub fn path_is_absolute(&self) -> bool {
        self.path.starts_with("https://") || self.path.starts_with("http://")
    }

    /// Checks the structural invariants before any I/O happens.
    ///
    /// Violations surface as `InvalidArgument` and the engine guarantees no
    /// token fetch or HTTP call was made.
    pub fn validate(&self) -> Result<(), DispatchError> {
        if self.fetch_all && !self.method.is_get() {
            return Err(DispatchError::invalid_argument(format!(
                "fetchAll requires GET, got {}",
                self.method
            )));
        }

        if self.path.is_empty() {
            return Err(DispatchError::invalid_argument("path must not be empty"));
        }

        if self.audience == Audience::Azure && self.api_version.is_none() && !self.path_is_absolute()
        {
            return Err(DispatchError::invalid_argument(
                "apiVersion is required for Azure requests",
            ));
        }

        if let Some(batch_size) = self.batch_size {
            let (lo, hi) = BATCH_SIZE_RANGE;
            if !(lo..=hi).contains(&batch_size) {
                return Err(DispatchError::invalid_argument(format!(
                    "batchSize {batch_size} outside {lo}..={hi}"
                )));
            }
        }

        if let Some(retries) = self.max_retries {
            let (lo, hi) = MAX_RETRIES_RANGE;
            if !(lo..=hi).contains(&retries) {
                return Err(DispatchError::invalid_argument(format!(
                    "maxRetries {retries} outside {lo}..={hi}"
                )));
            }
        }

        if let Some(delay) = self.retry_base_delay_ms {
            let (lo, hi) = RETRY_BASE_DELAY_RANGE;
            if !(lo..=hi).contains(&delay) {
                return Err(DispatchError::invalid_argument(format!(
                    "retryBaseDelayMs {delay} outside {lo}..={hi}"
                )));
            }
        }

        if let Some(timeout) = self.timeout_ms {
            let (lo, hi) = TIMEOUT_RANGE;
            if !(lo..=hi).contains(&timeout) {
                return Err(DispatchError::invalid_argument(format!(
                    "timeoutMs {timeout} outside {lo}..={hi}"
                )));
            }
        }

        Ok(())
    }
}
