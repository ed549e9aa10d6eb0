//! Shared test helpers.
//!
//! Mounts wiremock endpoints for the token endpoint and upstream APIs and
//! hands back an [`Engine`] with every base URL pointed at the mock server.

use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use msbridge_core::config::Config;
use msbridge_dispatch::{CredentialStore, Engine};

/// Tenant id used by every test engine.
pub const TENANT: &str = "tenant-test";

/// Bearer value handed out by the mock token endpoint.
pub const TEST_TOKEN: &str = "mock-access-token";

/// Path of the token endpoint on the mock server.
pub fn token_path() -> String {
    format!("/{TENANT}/oauth2/v2.0/token")
}

/// Mounts a token endpoint that always succeeds with a long-lived token.
pub async fn mount_token_endpoint(server: &MockServer) {
    Mock::given(method("POST"))
        .and(path(token_path()))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "token_type": "Bearer",
            "expires_in": 3600,
            "access_token": TEST_TOKEN
        })))
        .mount(server)
        .await;
}

/// An engine with default config, test credentials, and every upstream
/// (Graph, Azure, identity) pointed at `server`.
pub fn engine_for(server: &MockServer) -> Engine {
    engine_with_config(server, Config::default())
}

pub fn engine_with_config(server: &MockServer, config: Config) -> Engine {
    Engine::builder()
        .config(config)
        .credentials(CredentialStore::new(TENANT, "client-test", "secret-test"))
        .graph_base(server.uri())
        .azure_base(server.uri())
        .token_endpoint(server.uri())
        .build()
}
