//! Domain types for dispatching requests against Microsoft REST APIs.

pub mod audience;
pub mod request;
pub mod response;

pub use audience::Audience;
pub use request::{DispatchRequest, HttpMethod, ResponseFormat};
pub use response::{DispatchResponse, HealthStatus};
