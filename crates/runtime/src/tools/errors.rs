use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors that can occur while invoking a tool.
///
/// These are per-call failures: they end or redirect the current turn but
/// never invalidate the registry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Error)]
#[non_exhaustive]
pub enum ToolError {
    #[error("operation not found: {0}")]
    OperationNotFound(String),
    #[error("invalid arguments for {name}: {reason}")]
    ArgumentParse { name: String, reason: String },
    #[error("API call to {operation_id} failed with status {status}")]
    ApiCall { operation_id: String, status: u16 },
    #[error("request to {operation_id} failed: {message}")]
    Network {
        operation_id: String,
        message: String,
    },
    #[error("invalid response from {operation_id}: {message}")]
    InvalidResponse {
        operation_id: String,
        message: String,
    },
    #[error("timeout after {0}ms")]
    Timeout(u64),
}
