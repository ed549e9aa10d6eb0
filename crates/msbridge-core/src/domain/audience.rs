//! Token audiences for the Microsoft identity platform.

use serde::{Deserialize, Serialize};

/// The identity-platform resource a bearer token is minted for.
///
/// Callers only ever ask for [`Audience::Graph`] or [`Audience::Azure`];
/// [`Audience::Intune`] is derived by the endpoint router from the request
/// path. Intune uses a distinct OAuth scope but the requests themselves
/// still target the Graph host.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Audience {
    /// Microsoft Graph (`graph.microsoft.com`)
    Graph,
    /// Intune device management (Graph host, `manage.microsoft.com` scope)
    Intune,
    /// Azure Resource Manager (`management.azure.com`)
    Azure,
}

impl Audience {
    /// All audiences, in a stable order. Used by caches keyed per audience.
    pub const ALL: [Audience; 3] = [Audience::Graph, Audience::Intune, Audience::Azure];

    /// Stable lowercase name used in logs and health output.
    pub fn as_str(&self) -> &'static str {
        match self {
            Audience::Graph => "graph",
            Audience::Intune => "intune",
            Audience::Azure => "azure",
        }
    }

    /// Index into fixed per-audience storage slots.
    pub fn index(&self) -> usize {
        match self {
            Audience::Graph => 0,
            Audience::Intune => 1,
            Audience::Azure => 2,
        }
    }
}

impl std::fmt::Display for Audience {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
