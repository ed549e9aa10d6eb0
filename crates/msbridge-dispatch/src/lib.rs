//! msbridge-dispatch - The request-dispatch engine
//!
//! Sits between thin tool handlers and the Microsoft REST APIs. One
//! [`Engine`] per process owns the shared singletons (token cache, rate
//! limiter, HTTP client) and orchestrates them for each dispatch:
//!
//! - [`credentials`] - client-credential identity and audience scopes
//! - [`token`] - per-audience bearer-token cache with single-flight refresh
//! - [`rate_limit`] - process-wide fixed-window limiter
//! - [`retry`] - retry decisions and capped, jittered backoff
//! - [`http`] - single round-trip executor with correlation ids
//! - [`route`] - audience and base-URL resolution (incl. Intune rerouting)
//! - [`paginate`] - `@odata.nextLink` helpers for multi-page GETs
//! - [`shape`] - full/raw/minimal response shaping
//! - [`engine`] - the orchestrator tying the above together

pub mod credentials;
pub mod engine;
pub mod http;
pub mod paginate;
pub mod rate_limit;
pub mod retry;
pub mod route;
pub mod shape;
pub mod token;

pub use credentials::CredentialStore;
pub use engine::{Engine, EngineBuilder};
pub use rate_limit::FixedWindowLimiter;
pub use route::EndpointRouter;
