//! API description error types.

use thiserror::Error;

/// Errors raised while loading an API description or translating it into
/// tool definitions.
///
/// All of these are construction-time failures: a registry is never built
/// from a description that produced one.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum SchemaError {
    #[error("failed to read API description: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse API description: {0}")]
    Parse(String),

    #[error("unsupported API description format: {0}")]
    UnsupportedFormat(String),

    #[error("API description declares no servers")]
    MissingServer,

    #[error("operation {method} {path} has no operationId")]
    MissingOperationId { method: String, path: String },

    #[error("operationId {0} is declared more than once")]
    DuplicateOperationId(String),

    #[error("operation {operation_id}: parameter {name} collides with a request body property")]
    NameCollision { operation_id: String, name: String },
}

pub type Result<T> = std::result::Result<T, SchemaError>;
