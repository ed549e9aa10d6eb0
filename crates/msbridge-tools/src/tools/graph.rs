//! Microsoft Graph directory tools: users and groups.

use std::sync::Arc;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};

use msbridge_core::domain::{Audience, DispatchRequest, ResponseFormat};
use msbridge_core::errors::DispatchError;
use msbridge_dispatch::Engine;

use crate::{parse_args, Tool};

/// Common knobs shared by the directory listing tools.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
struct ListArgs {
    /// OData `$filter` expression, passed through to Graph.
    #[serde(default)]
    filter: Option<String>,
    #[serde(default)]
    select_fields: Vec<String>,
    #[serde(default)]
    batch_size: Option<u32>,
    #[serde(default)]
    fetch_all: bool,
    #[serde(default)]
    response_format: ResponseFormat,
}

impl ListArgs {
    fn into_request(self, path: &str) -> DispatchRequest {
        let mut req = DispatchRequest::get(Audience::Graph, path)
            .with_fetch_all(self.fetch_all)
            .with_response_format(self.response_format);
        if let Some(filter) = self.filter {
            req.query_params.insert("$filter".into(), filter);
        }
        req.select_fields = self.select_fields;
        req.batch_size = self.batch_size;
        req
    }
}

fn list_schema(item: &str) -> Value {
    json!({
        "type": "object",
        "properties": {
            "filter": {
                "type": "string",
                "description": format!("OData $filter expression for {item}")
            },
            "selectFields": {
                "type": "array",
                "items": {"type": "string"},
                "description": "Fields to project with $select"
            },
            "batchSize": {
                "type": "integer",
                "minimum": 1,
                "maximum": 1000,
                "description": "Page size applied as $top"
            },
            "fetchAll": {
                "type": "boolean",
                "description": "Follow @odata.nextLink and return all pages"
            },
            "responseFormat": {
                "type": "string",
                "enum": ["full", "raw", "minimal"]
            }
        },
        "additionalProperties": false
    })
}

// ----------------------------------------------------------------------------
// list_users
// ----------------------------------------------------------------------------

pub struct ListUsersTool {
    engine: Arc<Engine>,
}

impl ListUsersTool {
    pub fn new(engine: Arc<Engine>) -> Self {
        Self { engine }
    }
}

#[async_trait]
impl Tool for ListUsersTool {
    fn name(&self) -> &'static str {
        "list_users"
    }

    fn description(&self) -> &'static str {
        "List users in the directory via Microsoft Graph"
    }

    fn input_schema(&self) -> Value {
        list_schema("users")
    }

    async fn call(&self, args: Value) -> Result<Value, DispatchError> {
        let args: ListArgs = parse_args(args)?;
        let resp = self.engine.dispatch(args.into_request("/users")).await?;
        Ok(resp.value)
    }
}

// ----------------------------------------------------------------------------
// get_user
// ----------------------------------------------------------------------------

pub struct GetUserTool {
    engine: Arc<Engine>,
}

impl GetUserTool {
    pub fn new(engine: Arc<Engine>) -> Self {
        Self { engine }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
struct GetUserArgs {
    /// Object id or userPrincipalName.
    user_id: String,
    #[serde(default)]
    select_fields: Vec<String>,
    #[serde(default)]
    response_format: ResponseFormat,
}

#[async_trait]
impl Tool for GetUserTool {
    fn name(&self) -> &'static str {
        "get_user"
    }

    fn description(&self) -> &'static str {
        "Fetch a single user by object id or userPrincipalName"
    }

    fn input_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "userId": {
                    "type": "string",
                    "description": "Object id or userPrincipalName"
                },
                "selectFields": {
                    "type": "array",
                    "items": {"type": "string"}
                },
                "responseFormat": {
                    "type": "string",
                    "enum": ["full", "raw", "minimal"]
                }
            },
            "required": ["userId"],
            "additionalProperties": false
        })
    }

    async fn call(&self, args: Value) -> Result<Value, DispatchError> {
        let args: GetUserArgs = parse_args(args)?;
        if args.user_id.is_empty() {
            return Err(DispatchError::invalid_argument("userId must not be empty"));
        }

        let mut req = DispatchRequest::get(Audience::Graph, format!("/users/{}", args.user_id))
            .with_response_format(args.response_format);
        req.select_fields = args.select_fields;

        let resp = self.engine.dispatch(req).await?;
        Ok(resp.value)
    }
}

// ----------------------------------------------------------------------------
// list_groups
// ----------------------------------------------------------------------------

pub struct ListGroupsTool {
    engine: Arc<Engine>,
}

impl ListGroupsTool {
    pub fn new(engine: Arc<Engine>) -> Self {
        Self { engine }
    }
}

#[async_trait]
impl Tool for ListGroupsTool {
    fn name(&self) -> &'static str {
        "list_groups"
    }

    fn description(&self) -> &'static str {
        "List groups in the directory via Microsoft Graph"
    }

    fn input_schema(&self) -> Value {
        list_schema("groups")
    }

    async fn call(&self, args: Value) -> Result<Value, DispatchError> {
        let args: ListArgs = parse_args(args)?;
        let resp = self.engine.dispatch(args.into_request("/groups")).await?;
        Ok(resp.value)
    }
}
