//! Error taxonomy shared by every fleet-mcp crate.
//!
//! Failures are returned as values throughout the workspace; nothing at the
//! connection surface or below escapes as a panic. The variants mirror the
//! failure kinds observable by callers: protocol-level rejections, local
//! deadline and transport faults, resilience refusals, language-model
//! failures, and planning/execution faults.

use std::time::Duration;
use thiserror::Error;

use crate::protocol::jsonrpc::{error_codes, JsonRpcError};

/// Canonical result type for all fleet-mcp operations.
pub type FleetResult<T> = Result<T, FleetError>;

#[derive(Debug, Error)]
pub enum FleetError {
    #[error("parse error: {0}")]
    Parse(String),

    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error("method not found: {0}")]
    MethodNotFound(String),

    #[error("invalid params: {0}")]
    InvalidParams(String),

    #[error("internal error: {0}")]
    Internal(String),

    #[error("request timed out after {0:?}")]
    Timeout(Duration),

    #[error("transport error: {0}")]
    Transport(String),

    #[error("connection closed")]
    ConnectionClosed,

    #[error("rate limited on endpoint '{0}'")]
    RateLimited(String),

    #[error("circuit open on endpoint '{0}'")]
    CircuitOpen(String),

    #[error("authentication failed: {0}")]
    Auth(String),

    #[error("forbidden: {0}")]
    Forbidden(String),

    #[error("blocked by content policy: {0}")]
    ContentPolicy(String),

    #[error("network error: {0}")]
    Network(String),

    #[error("validation failed: {0}")]
    Validation(String),

    #[error("planning failed: {0}")]
    Planning(String),

    #[error("dependency not satisfied: {0}")]
    Dependency(String),

    #[error("connection initialization failed: {0}")]
    Initialization(String),
}

impl FleetError {
    /// Stable lower-case label for the failure kind. Step results capture
    /// this string so a serialized chain report stays readable.
    pub fn kind(&self) -> &'static str {
        match self {
            FleetError::Parse(_) => "parse",
            FleetError::InvalidRequest(_) => "invalid-request",
            FleetError::MethodNotFound(_) => "method-not-found",
            FleetError::InvalidParams(_) => "invalid-params",
            FleetError::Internal(_) => "internal",
            FleetError::Timeout(_) => "timeout",
            FleetError::Transport(_) => "transport",
            FleetError::ConnectionClosed => "connection-closed",
            FleetError::RateLimited(_) => "rate-limited",
            FleetError::CircuitOpen(_) => "circuit-open",
            FleetError::Auth(_) => "auth",
            FleetError::Forbidden(_) => "forbidden",
            FleetError::ContentPolicy(_) => "content-policy",
            FleetError::Network(_) => "network",
            FleetError::Validation(_) => "validation",
            FleetError::Planning(_) => "planning",
            FleetError::Dependency(_) => "dependency",
            FleetError::Initialization(_) => "initialization",
        }
    }

    /// Map a JSON-RPC error object returned by a server into the taxonomy.
    pub fn from_json_rpc(error: &JsonRpcError) -> Self {
        match error.code {
            error_codes::PARSE_ERROR => FleetError::Parse(error.message.clone()),
            error_codes::INVALID_REQUEST => FleetError::InvalidRequest(error.message.clone()),
            error_codes::METHOD_NOT_FOUND => FleetError::MethodNotFound(error.message.clone()),
            error_codes::INVALID_PARAMS => FleetError::InvalidParams(error.message.clone()),
            error_codes::INTERNAL_ERROR => FleetError::Internal(error.message.clone()),
            code => FleetError::Internal(format!("server error {}: {}", code, error.message)),
        }
    }
}

impl From<serde_json::Error> for FleetError {
    fn from(err: serde_json::Error) -> Self {
        FleetError::Parse(err.to_string())
    }
}

impl From<std::io::Error> for FleetError {
    fn from(err: std::io::Error) -> Self {
        FleetError::Transport(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kind_labels_are_stable() {
        assert_eq!(FleetError::ConnectionClosed.kind(), "connection-closed");
        assert_eq!(
            FleetError::Timeout(Duration::from_millis(200)).kind(),
            "timeout"
        );
        assert_eq!(FleetError::RateLimited("x".into()).kind(), "rate-limited");
    }

    #[test]
    fn json_rpc_codes_map_to_matching_kinds() {
        let err = JsonRpcError::new(error_codes::METHOD_NOT_FOUND, "nope".to_string());
        assert_eq!(FleetError::from_json_rpc(&err).kind(), "method-not-found");

        let err = JsonRpcError::new(-32000, "boom".to_string());
        assert_eq!(FleetError::from_json_rpc(&err).kind(), "internal");
    }
}
