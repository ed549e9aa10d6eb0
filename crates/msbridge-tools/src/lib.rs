//! msbridge-tools - Tool handlers over the dispatch engine
//!
//! Every tool is a thin adapter: validate arguments, build one
//! [`DispatchRequest`](msbridge_core::domain::DispatchRequest), dispatch,
//! return the shaped result. All engineering (auth, rate limiting, retries,
//! pagination) lives below in `msbridge-dispatch`.

pub mod registry;
pub mod tools;

use async_trait::async_trait;
use serde_json::Value;

use msbridge_core::errors::DispatchError;

pub use registry::{ToolDescriptor, ToolRegistry};

/// A named remote procedure exposed to MCP clients.
#[async_trait]
pub trait Tool: Send + Sync {
    fn name(&self) -> &'static str;

    fn description(&self) -> &'static str;

    /// JSON Schema for the tool's arguments.
    fn input_schema(&self) -> Value;

    /// Validates `args` and performs the call. Argument problems surface as
    /// `invalid_argument`; everything else is whatever the engine returned.
    async fn call(&self, args: Value) -> Result<Value, DispatchError>;
}

/// Deserializes tool arguments, mapping serde failures to `invalid_argument`.
/// Absent arguments are treated as an empty object.
pub(crate) fn parse_args<T: serde::de::DeserializeOwned>(args: Value) -> Result<T, DispatchError> {
    let args = if args.is_null() {
        Value::Object(serde_json::Map::new())
    } else {
        args
    };
    serde_json::from_value(args)
        .map_err(|e| DispatchError::invalid_argument(format!("invalid arguments: {e}")))
}
