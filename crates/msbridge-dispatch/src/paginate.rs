//! OData pagination helpers.
//!
//! Paginated Graph and ARM responses carry their items in a `value` array
//! and the cursor for the next page in `@odata.nextLink` (an absolute URL).
//! The engine drives the page loop; these helpers pick the pages apart and
//! assemble the aggregate result.
//!
//! Progress goes through `tracing` only. Never print from here: on stdio
//! transports, stdout carries JSON-RPC frames.

use serde_json::{json, Value};
use tracing::debug;

use msbridge_core::errors::DispatchError;

/// OData key carrying the next-page cursor.
pub const NEXT_LINK_KEY: &str = "@odata.nextLink";

/// OData key carrying the collection context, preserved from page 1.
pub const CONTEXT_KEY: &str = "@odata.context";

/// The absolute cursor URL of the next page, if one exists.
pub fn next_link(body: &Value) -> Option<&str> {
    body.get(NEXT_LINK_KEY).and_then(Value::as_str)
}

/// The `@odata.context` of a page, if present.
pub fn context(body: &Value) -> Option<&str> {
    body.get(CONTEXT_KEY).and_then(Value::as_str)
}

/// Extracts the page's `value` array, consuming the body.
///
/// A paginated response without an array-valued `value` is malformed; the
/// whole dispatch fails rather than returning a truncated set the caller
/// cannot distinguish from a complete one.
pub fn take_items(body: Value) -> Result<Vec<Value>, DispatchError> {
    match body {
        Value::Object(mut map) => match map.remove("value") {
            Some(Value::Array(items)) => Ok(items),
            Some(other) => Err(DispatchError::protocol(format!(
                "paginated response has non-array value ({})",
                type_name(&other)
            ))),
            None => Err(DispatchError::protocol(
                "paginated response is missing the value array",
            )),
        },
        other => Err(DispatchError::protocol(format!(
            "paginated response is not an object ({})",
            type_name(&other)
        ))),
    }
}

/// Builds the aggregate body after the last page:
/// `{"@odata.context", "value", "totalCount", "fetchedAt"}`.
///
/// The context from page 1 is preserved; all other per-page metadata was
/// discarded along the way.
pub fn assemble(first_context: Option<String>, items: Vec<Value>) -> Value {
    let total = items.len();
    debug!(total, "pagination complete");

    json!({
        "@odata.context": first_context.map(Value::String).unwrap_or(Value::Null),
        "value": items,
        "totalCount": total,
        "fetchedAt": chrono::Utc::now().to_rfc3339(),
    })
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
