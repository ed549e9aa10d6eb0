//! Tool registry: the catalog handed to the transport layer.

use std::collections::BTreeMap;
use std::sync::Arc;

use serde::Serialize;
use serde_json::Value;
use tracing::debug;

use msbridge_dispatch::Engine;

use crate::tools::{
    azure::{ListResourceGroupsTool, ListSubscriptionsTool},
    graph::{GetUserTool, ListGroupsTool, ListUsersTool},
    health::HealthCheckTool,
    intune::{ListDeviceConfigurationsTool, ListManagedDevicesTool},
    passthrough::CallMicrosoftApiTool,
};
use crate::Tool;

/// Listing entry for `tools/list`.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolDescriptor {
    pub name: &'static str,
    pub description: &'static str,
    pub input_schema: Value,
}

/// Name-keyed tool catalog. Built once at startup and shared.
pub struct ToolRegistry {
    tools: BTreeMap<&'static str, Arc<dyn Tool>>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self {
            tools: BTreeMap::new(),
        }
    }

    /// The full catalog backed by `engine`.
    pub fn with_defaults(engine: Arc<Engine>) -> Self {
        let mut registry = Self::new();
        registry.register(Arc::new(ListUsersTool::new(Arc::clone(&engine))));
        registry.register(Arc::new(GetUserTool::new(Arc::clone(&engine))));
        registry.register(Arc::new(ListGroupsTool::new(Arc::clone(&engine))));
        registry.register(Arc::new(ListManagedDevicesTool::new(Arc::clone(&engine))));
        registry.register(Arc::new(ListDeviceConfigurationsTool::new(Arc::clone(
            &engine,
        ))));
        registry.register(Arc::new(ListSubscriptionsTool::new(Arc::clone(&engine))));
        registry.register(Arc::new(ListResourceGroupsTool::new(Arc::clone(&engine))));
        registry.register(Arc::new(CallMicrosoftApiTool::new(Arc::clone(&engine))));
        registry.register(Arc::new(HealthCheckTool::new(engine)));
        registry
    }

    /// Registers a tool; a later registration with the same name wins.
    pub fn register(&mut self, tool: Arc<dyn Tool>) {
        debug!(name = tool.name(), "registering tool");
        self.tools.insert(tool.name(), tool);
    }

    pub fn get(&self, name: &str) -> Option<&Arc<dyn Tool>> {
        self.tools.get(name)
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    /// Descriptors for every registered tool, in name order.
    pub fn list(&self) -> Vec<ToolDescriptor> {
        self.tools
            .values()
            .map(|tool| ToolDescriptor {
                name: tool.name(),
                description: tool.description(),
                input_schema: tool.input_schema(),
            })
            .collect()
    }
}

impl Default for ToolRegistry {
    fn default() -> Self {
        Self::new()
    }
}
