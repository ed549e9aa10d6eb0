//! Credential store: the client-credentials identity and audience scopes.
//!
//! Holds the tenant id, client id, and client secret loaded once at
//! startup, and maps each [`Audience`] to its OAuth scope string. This is
//! deliberately the simplest correct thing: no rotation, no vault lookups.

use msbridge_core::config::AuthConfig;
use msbridge_core::domain::Audience;
use msbridge_core::errors::DispatchError;

/// OAuth scope requested for each audience (`.default` = app permissions).
const GRAPH_SCOPE: &str = "https://graph.microsoft.com/.default";
const INTUNE_SCOPE: &str = "https://manage.microsoft.com/.default";
const AZURE_SCOPE: &str = "https://management.azure.com/.default";

/// Tenant/client identity for the client-credentials grant.
#[derive(Clone)]
pub struct CredentialStore {
    tenant_id: Option<String>,
    client_id: Option<String>,
    client_secret: Option<String>,
}

// Manual Debug so the secret can never leak through `{:?}`.
impl std::fmt::Debug for CredentialStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CredentialStore")
            .field("tenant_id", &self.tenant_id)
            .field("client_id", &self.client_id)
            .field("client_secret", &self.client_secret.as_ref().map(|_| "***"))
            .finish()
    }
}

impl CredentialStore {
    pub fn new(
        tenant_id: impl Into<String>,
        client_id: impl Into<String>,
        client_secret: impl Into<String>,
    ) -> Self {
        Self {
            tenant_id: Some(tenant_id.into()),
            client_id: Some(client_id.into()),
            client_secret: Some(client_secret.into()),
        }
    }

    pub fn from_config(auth: &AuthConfig) -> Self {
        Self {
            tenant_id: auth.tenant_id.clone(),
            client_id: auth.client_id.clone(),
            client_secret: auth.client_secret.clone(),
        }
    }

    /// An empty store; every `require()` fails, `has_credentials()` is false.
    pub fn unconfigured() -> Self {
        Self {
            tenant_id: None,
            client_id: None,
            client_secret: None,
        }
    }

    /// Non-throwing readiness probe for health reporting.
    pub fn has_credentials(&self) -> bool {
        self.tenant_id.is_some() && self.client_id.is_some() && self.client_secret.is_some()
    }

    /// Borrow the full credential set, or fail with an authentication error
    /// callers can degrade on (the health tool never calls this).
    pub fn require(&self) -> Result<Credentials<'_>, DispatchError> {
        match (&self.tenant_id, &self.client_id, &self.client_secret) {
            (Some(tenant_id), Some(client_id), Some(client_secret)) => Ok(Credentials {
                tenant_id,
                client_id,
                client_secret,
            }),
            _ => Err(DispatchError::authentication(
                "credentials not configured (tenant id, client id, client secret)",
            )),
        }
    }

    /// The OAuth scope string minted for `audience`.
    pub fn scope_for(audience: Audience) -> &'static str {
        match audience {
            Audience::Graph => GRAPH_SCOPE,
            Audience::Intune => INTUNE_SCOPE,
            Audience::Azure => AZURE_SCOPE,
        }
    }
}

/// Borrowed view of a complete credential set.
#[derive(Clone, Copy, Debug)]
pub struct Credentials<'a> {
    pub tenant_id: &'a str,
    pub client_id: &'a str,
    pub client_secret: &'a str,
}
