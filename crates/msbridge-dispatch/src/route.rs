//! Endpoint routing: audience, base URL, and API version resolution.
//!
//! Pure classification, no I/O. The one subtlety is Intune: paths under the
//! device-management subtree need a token scoped to `manage.microsoft.com`
//! even though the requests still go to the Graph host. The router
//! reclassifies the audience and leaves the URL alone.

use msbridge_core::domain::Audience;

/// Base URL for Microsoft Graph.
pub const GRAPH_BASE_URL: &str = "https://graph.microsoft.com";

/// Base URL for Azure Resource Manager.
pub const AZURE_BASE_URL: &str = "https://management.azure.com";

/// Default Graph API version when the caller does not override it.
pub const GRAPH_DEFAULT_API_VERSION: &str = "v1.0";

/// Graph paths that require the Intune token scope.
const INTUNE_PATH_PREFIXES: &[&str] = &[
    "/deviceManagement",
    "/deviceAppManagement",
    "/informationProtection",
];

/// Resolved routing for one dispatch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Route {
    /// Possibly reclassified audience (Graph → Intune).
    pub audience: Audience,
    pub base_url: String,
    /// `Some` for Graph (version path segment) and Azure (`api-version`
    /// query parameter); the engine decides where it goes.
    pub api_version: Option<String>,
}

/// Maps `(audience, path)` to the upstream host and API version.
#[derive(Debug, Clone)]
pub struct EndpointRouter {
    graph_base: String,
    azure_base: String,
}

impl Default for EndpointRouter {
    fn default() -> Self {
        Self {
            graph_base: GRAPH_BASE_URL.to_string(),
            azure_base: AZURE_BASE_URL.to_string(),
        }
    }
}

impl EndpointRouter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Custom hosts, used by tests to point at a mock server.
    pub fn with_bases(graph_base: impl Into<String>, azure_base: impl Into<String>) -> Self {
        Self {
            graph_base: graph_base.into(),
            azure_base: azure_base.into(),
        }
    }

    /// Classifies one request. The path itself is never mutated.
    pub fn resolve(&self, audience: Audience, path: &str, api_version: Option<&str>) -> Route {
        match audience {
            Audience::Azure => Route {
                audience: Audience::Azure,
                base_url: self.azure_base.clone(),
                api_version: api_version.map(str::to_string),
            },
            Audience::Graph | Audience::Intune => {
                let audience = if is_intune_path(path) {
                    Audience::Intune
                } else {
                    Audience::Graph
                };
                Route {
                    audience,
                    base_url: self.graph_base.clone(),
                    api_version: Some(
                        api_version.unwrap_or(GRAPH_DEFAULT_API_VERSION).to_string(),
                    ),
                }
            }
        }
    }
}

/// True for paths whose token must be minted for the Intune scope.
fn is_intune_path(path: &str) -> bool {
    INTUNE_PATH_PREFIXES
        .iter()
        .any(|prefix| path.starts_with(prefix))
}
