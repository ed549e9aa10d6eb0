//! Dispatch response model.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// The result of one dispatch, shaped per the request's `responseFormat`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DispatchResponse {
    /// Shaped body. For paginated dispatches this is the aggregate
    /// `{"@odata.context", "value", "totalCount", "fetchedAt"}` object.
    pub value: Value,

    /// Wallclock duration of the whole dispatch in milliseconds.
    pub execution_ms: u64,

    /// Items accumulated across pages; 0 for non-paginated dispatches.
    pub items_fetched: u64,

    /// Upstream attempts made for the final page (>= 1 on success).
    pub attempts: u32,

    /// HTTP status of the last upstream response.
    pub http_status: u16,
}

/// Non-blocking engine health snapshot, safe before credentials exist.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthStatus {
    /// True when credentials are configured and the engine can dispatch.
    pub ready: bool,
    pub has_credentials: bool,
    /// Audiences holding a currently-valid cached token.
    pub audiences_with_cached_token: Vec<String>,
}
