//! Azure Resource Manager tools.
//!
//! ARM requires an explicit `api-version` on every call; these tools pin
//! known-good versions and let callers override them.

use std::sync::Arc;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};

use msbridge_core::domain::{Audience, DispatchRequest, ResponseFormat};
use msbridge_core::errors::DispatchError;
use msbridge_dispatch::Engine;

use crate::{parse_args, Tool};

/// Default ARM api-version for subscription-level reads.
const SUBSCRIPTIONS_API_VERSION: &str = "2022-12-01";

/// Default ARM api-version for resource-group reads.
const RESOURCE_GROUPS_API_VERSION: &str = "2021-04-01";

pub struct ListSubscriptionsTool {
    engine: Arc<Engine>,
}

impl ListSubscriptionsTool {
    pub fn new(engine: Arc<Engine>) -> Self {
        Self { engine }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
struct ListSubscriptionsArgs {
    #[serde(default)]
    api_version: Option<String>,
    #[serde(default)]
    fetch_all: bool,
    #[serde(default)]
    response_format: ResponseFormat,
}

#[async_trait]
impl Tool for ListSubscriptionsTool {
    fn name(&self) -> &'static str {
        "list_subscriptions"
    }

    fn description(&self) -> &'static str {
        "List Azure subscriptions visible to the service principal"
    }

    fn input_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "apiVersion": {
                    "type": "string",
                    "description": "ARM api-version override"
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

    async fn call(&self, args: Value) -> Result<Value, DispatchError> {
        let args: ListSubscriptionsArgs = parse_args(args)?;
        let req = DispatchRequest::get(Audience::Azure, "/subscriptions")
            .with_api_version(
                args.api_version
                    .unwrap_or_else(|| SUBSCRIPTIONS_API_VERSION.to_string()),
            )
            .with_fetch_all(args.fetch_all)
            .with_response_format(args.response_format);

        let resp = self.engine.dispatch(req).await?;
        Ok(resp.value)
    }
}

pub struct ListResourceGroupsTool {
    engine: Arc<Engine>,
}

impl ListResourceGroupsTool {
    pub fn new(engine: Arc<Engine>) -> Self {
        Self { engine }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
struct ListResourceGroupsArgs {
    subscription_id: String,
    #[serde(default)]
    api_version: Option<String>,
    #[serde(default)]
    fetch_all: bool,
    #[serde(default)]
    response_format: ResponseFormat,
}

#[async_trait]
impl Tool for ListResourceGroupsTool {
    fn name(&self) -> &'static str {
        "list_resource_groups"
    }

    fn description(&self) -> &'static str {
        "List resource groups in an Azure subscription"
    }

    fn input_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "subscriptionId": {
                    "type": "string",
                    "description": "Subscription to enumerate"
                },
                "apiVersion": {"type": "string"},
                "fetchAll": {"type": "boolean"},
                "responseFormat": {
                    "type": "string",
                    "enum": ["full", "raw", "minimal"]
                }
            },
            "required": ["subscriptionId"],
            "additionalProperties": false
        })
    }

    async fn call(&self, args: Value) -> Result<Value, DispatchError> {
        let args: ListResourceGroupsArgs = parse_args(args)?;
        if args.subscription_id.is_empty() {
            return Err(DispatchError::invalid_argument(
                "subscriptionId must not be empty",
            ));
        }

        let req = DispatchRequest::get(
            Audience::Azure,
            format!("/subscriptions/{}/resourcegroups", args.subscription_id),
        )
        .with_api_version(
            args.api_version
                .unwrap_or_else(|| RESOURCE_GROUPS_API_VERSION.to_string()),
        )
        .with_fetch_all(args.fetch_all)
        .with_response_format(args.response_format);

        let resp = self.engine.dispatch(req).await?;
        Ok(resp.value)
    }
}
