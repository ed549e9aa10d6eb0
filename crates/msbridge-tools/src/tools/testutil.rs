//! Test-only helpers: an engine pointed at a wiremock server.

use std::sync::Arc;

use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use msbridge_core::config::Config;
use msbridge_dispatch::{CredentialStore, Engine};

pub const TENANT: &str = "tenant-test";

/// Engine with no credentials: tool-argument validation tests only.
pub fn offline_engine() -> Arc<Engine> {
    Arc::new(
        Engine::builder()
            .config(Config::default())
            .credentials(CredentialStore::unconfigured())
            .build(),
    )
}

/// Engine wired to `server` with a working token endpoint.
pub async fn mock_engine(server: &MockServer) -> Arc<Engine> {
    Mock::given(method("POST"))
        .and(path(format!("/{TENANT}/oauth2/v2.0/token")))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "token_type": "Bearer",
            "expires_in": 3600,
            "access_token": "tool-test-token"
        })))
        .mount(server)
        .await;

    Arc::new(
        Engine::builder()
            .config(Config::default())
            .credentials(CredentialStore::new(TENANT, "client-test", "secret-test"))
            .graph_base(server.uri())
            .azure_base(server.uri())
            .token_endpoint(server.uri())
            .build(),
    )
}
