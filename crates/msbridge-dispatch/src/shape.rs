//! Response shaping.
//!
//! Applies the request's `responseFormat` to the upstream body. Field
//! projection (`$select`) happens server-side at Microsoft; nothing is
//! filtered locally.

use serde_json::{json, Value};

use msbridge_core::domain::{Audience, HttpMethod, ResponseFormat};

/// Shapes `body` for the caller.
///
/// - `full`: summary object with timing and item metrics, the body verbatim
///   under `body`
/// - `raw`: the body untouched
/// - `minimal`: just the `value` array when the body is a collection wrapper
pub fn shape(
    body: Value,
    format: ResponseFormat,
    audience: Audience,
    method: HttpMethod,
    path: &str,
    execution_ms: u64,
    items_fetched: u64,
) -> Value {
    match format {
        ResponseFormat::Raw => body,
        ResponseFormat::Minimal => match body {
            Value::Object(mut map) => match map.remove("value") {
                Some(Value::Array(items)) => Value::Array(items),
                Some(other) => {
                    map.insert("value".into(), other);
                    Value::Object(map)
                }
                None => Value::Object(map),
            },
            other => other,
        },
        ResponseFormat::Full => json!({
            "summary": format!("Result for {audience} {method} {path}"),
            "executionMs": execution_ms,
            "itemsFetched": items_fetched,
            "body": body,
        }),
    }
}
