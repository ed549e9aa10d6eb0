//! The generic pass-through tool.
//!
//! Arguments map one-to-one onto a [`DispatchRequest`]: any Graph or ARM
//! endpoint the catalog does not wrap is reachable through this tool. Input
//! schema validation happens here; Graph semantics stay upstream.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{json, Value};

use msbridge_core::domain::DispatchRequest;
use msbridge_core::errors::DispatchError;
use msbridge_dispatch::Engine;

use crate::{parse_args, Tool};

pub struct CallMicrosoftApiTool {
    engine: Arc<Engine>,
}

impl CallMicrosoftApiTool {
    pub fn new(engine: Arc<Engine>) -> Self {
        Self { engine }
    }
}

#[async_trait]
impl Tool for CallMicrosoftApiTool {
    fn name(&self) -> &'static str {
        "call_microsoft_api"
    }

    fn description(&self) -> &'static str {
        "Call any Microsoft Graph or Azure Resource Manager endpoint"
    }

    fn input_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "audience": {
                    "type": "string",
                    "enum": ["Graph", "Azure"],
                    "description": "Target API family"
                },
                "path": {
                    "type": "string",
                    "description": "Server-relative path, e.g. /users or /subscriptions"
                },
                "method": {
                    "type": "string",
                    "enum": ["GET", "POST", "PUT", "PATCH", "DELETE"]
                },
                "apiVersion": {
                    "type": "string",
                    "description": "v1.0 or beta for Graph; required for Azure"
                },
                "queryParams": {
                    "type": "object",
                    "additionalProperties": {"type": "string"}
                },
                "headers": {
                    "type": "object",
                    "additionalProperties": {"type": "string"}
                },
                "body": {
                    "description": "JSON request body for write methods"
                },
                "fetchAll": {"type": "boolean"},
                "batchSize": {"type": "integer", "minimum": 1, "maximum": 1000},
                "selectFields": {"type": "array", "items": {"type": "string"}},
                "expandFields": {"type": "array", "items": {"type": "string"}},
                "responseFormat": {"type": "string", "enum": ["full", "raw", "minimal"]},
                "maxRetries": {"type": "integer", "minimum": 0, "maximum": 5},
                "retryBaseDelayMs": {"type": "integer", "minimum": 100, "maximum": 10000},
                "timeoutMs": {"type": "integer", "minimum": 5000, "maximum": 300000}
            },
            "required": ["audience", "path"],
            "additionalProperties": false
        })
    }

    async fn call(&self, args: Value) -> Result<Value, DispatchError> {
        let req: DispatchRequest = parse_args(args)?;
        let resp = self.engine.dispatch(req).await?;
        Ok(resp.value)
    }
}
