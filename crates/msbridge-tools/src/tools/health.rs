//! Health tool: non-blocking readiness, safe without credentials.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{json, Value};

use msbridge_core::errors::DispatchError;
use msbridge_dispatch::Engine;

use crate::Tool;

pub struct HealthCheckTool {
    engine: Arc<Engine>,
}

impl HealthCheckTool {
    pub fn new(engine: Arc<Engine>) -> Self {
        Self { engine }
    }
}

#[async_trait]
impl Tool for HealthCheckTool {
    fn name(&self) -> &'static str {
        "health_check"
    }

    fn description(&self) -> &'static str {
        "Report engine readiness and cached authentication state"
    }

    fn input_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {},
            "additionalProperties": false
        })
    }

    async fn call(&self, _args: Value) -> Result<Value, DispatchError> {
        let health = self.engine.health_status();
        serde_json::to_value(health)
            .map_err(|e| DispatchError::protocol(format!("health serialization failed: {e}")))
    }
}
