//! Failure taxonomy for the dispatch engine
//!
//! Every failure a dispatch can produce maps to exactly one [`ErrorKind`].
//! The payload carries correlation ids and the attempt count so callers can
//! join their logs with upstream request logs. It never carries the client
//! secret or a bearer token.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Classification of a dispatch failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ErrorKind {
    /// Schema or invariant violation; rejected before any I/O.
    InvalidArgument,
    /// Token endpoint rejected the credentials, or none are configured.
    Authentication,
    /// Upstream 401/403 after presenting a valid token.
    Authorization,
    /// Upstream 429.
    RateLimited,
    /// 5xx, 408, 423, or a network-level failure.
    UpstreamTransient,
    /// Any other 4xx.
    Client,
    /// Malformed JSON, or a paginated response without a `value` array.
    Protocol,
    /// The caller's context was cancelled.
    Cancelled,
    /// The overall dispatch deadline elapsed.
    Timeout,
}

impl ErrorKind {
    /// Whether the retry controller may schedule another attempt.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            ErrorKind::RateLimited | ErrorKind::UpstreamTransient | ErrorKind::Timeout
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::InvalidArgument => "invalid_argument",
            ErrorKind::Authentication => "authentication",
            ErrorKind::Authorization => "authorization",
            ErrorKind::RateLimited => "rate_limited",
            ErrorKind::UpstreamTransient => "upstream_transient",
            ErrorKind::Client => "client",
            ErrorKind::Protocol => "protocol",
            ErrorKind::Cancelled => "cancelled",
            ErrorKind::Timeout => "timeout",
        }
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A typed dispatch failure.
#[derive(Debug, Clone, Error, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
#[error("{kind}: {message}")]
pub struct DispatchError {
    kind: ErrorKind,
    message: String,
    /// Upstream HTTP status, when the failure came from a response.
    http_status: Option<u16>,
    /// Upstream correlation id (`request-id` response header).
    request_id: Option<String>,
    /// Our correlation id (`client-request-id` request header).
    client_request_id: Option<String>,
    /// Attempt on which the failure occurred (0 when no attempt was made).
    attempts: u32,
}

impl DispatchError {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            http_status: None,
            request_id: None,
            client_request_id: None,
            attempts: 0,
        }
    }

    pub fn invalid_argument(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::InvalidArgument, message)
    }

    pub fn authentication(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Authentication, message)
    }

    pub fn protocol(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Protocol, message)
    }

    pub fn cancelled() -> Self {
        Self::new(ErrorKind::Cancelled, "dispatch cancelled by caller")
    }

    pub fn timeout(budget_ms: u64) -> Self {
        Self::new(
            ErrorKind::Timeout,
            format!("dispatch deadline of {budget_ms} ms elapsed"),
        )
    }

    pub fn with_status(mut self, status: u16) -> Self {
        self.http_status = Some(status);
        self
    }

    pub fn with_request_id(mut self, id: impl Into<String>) -> Self {
        self.request_id = Some(id.into());
        self
    }

    pub fn with_client_request_id(mut self, id: impl Into<String>) -> Self {
        self.client_request_id = Some(id.into());
        self
    }

    pub fn with_attempts(mut self, attempts: u32) -> Self {
        self.attempts = attempts;
        self
    }

    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn http_status(&self) -> Option<u16> {
        self.http_status
    }

    pub fn request_id(&self) -> Option<&str> {
        self.request_id.as_deref()
    }

    pub fn client_request_id(&self) -> Option<&str> {
        self.client_request_id.as_deref()
    }

    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    pub fn is_retryable(&self) -> bool {
        self.kind.is_retryable()
    }
}
