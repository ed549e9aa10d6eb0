//! Intune device-management tools.
//!
//! These paths live under `/deviceManagement`, so the engine mints
//! Intune-scoped tokens for them while still calling the Graph host.

use std::sync::Arc;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};

use msbridge_core::domain::{Audience, DispatchRequest, ResponseFormat};
use msbridge_core::errors::DispatchError;
use msbridge_dispatch::Engine;

use crate::{parse_args, Tool};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
struct IntuneListArgs {
    #[serde(default)]
    filter: Option<String>,
    #[serde(default)]
    select_fields: Vec<String>,
    #[serde(default)]
    fetch_all: bool,
    #[serde(default)]
    response_format: ResponseFormat,
}

impl IntuneListArgs {
    fn into_request(self, path: &str) -> DispatchRequest {
        let mut req = DispatchRequest::get(Audience::Graph, path)
            .with_fetch_all(self.fetch_all)
            .with_response_format(self.response_format);
        if let Some(filter) = self.filter {
            req.query_params.insert("$filter".into(), filter);
        }
        req.select_fields = self.select_fields;
        req
    }
}

fn intune_schema(item: &str) -> Value {
    json!({
        "type": "object",
        "properties": {
            "filter": {
                "type": "string",
                "description": format!("OData $filter expression for {item}")
            },
            "selectFields": {
                "type": "array",
                "items": {"type": "string"}
            },
            "fetchAll": {"type": "boolean"},
            "responseFormat": {
                "type": "string",
                "enum": ["full", "raw", "minimal"]
            }
        },
        "additionalProperties": false
    })
}

pub struct ListManagedDevicesTool {
    engine: Arc<Engine>,
}

impl ListManagedDevicesTool {
    pub fn new(engine: Arc<Engine>) -> Self {
        Self { engine }
    }
}

#[async_trait]
impl Tool for ListManagedDevicesTool {
    fn name(&self) -> &'static str {
        "list_managed_devices"
    }

    fn description(&self) -> &'static str {
        "List Intune managed devices"
    }

    fn input_schema(&self) -> Value {
        intune_schema("managed devices")
    }

    async fn call(&self, args: Value) -> Result<Value, DispatchError> {
        let args: IntuneListArgs = parse_args(args)?;
        let resp = self
            .engine
            .dispatch(args.into_request("/deviceManagement/managedDevices"))
            .await?;
        Ok(resp.value)
    }
}

pub struct ListDeviceConfigurationsTool {
    engine: Arc<Engine>,
}

impl ListDeviceConfigurationsTool {
    pub fn new(engine: Arc<Engine>) -> Self {
        Self { engine }
    }
}

#[async_trait]
impl Tool for ListDeviceConfigurationsTool {
    fn name(&self) -> &'static str {
        "list_device_configurations"
    }

    fn description(&self) -> &'static str {
        "List Intune device configuration profiles"
    }

    fn input_schema(&self) -> Value {
        intune_schema("device configurations")
    }

    async fn call(&self, args: Value) -> Result<Value, DispatchError> {
        let args: IntuneListArgs = parse_args(args)?;
        let resp = self
            .engine
            .dispatch(args.into_request("/deviceManagement/deviceConfigurations"))
            .await?;
        Ok(resp.value)
    }
}
