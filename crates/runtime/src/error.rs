use thiserror::Error;

use crate::model::ModelError;
use crate::tools::ToolError;

#[derive(Debug, Error)]
#[non_exhaustive]
pub enum Error {
    #[error("config error: {0}")]
    Config(String),

    #[error(transparent)]
    Schema(#[from] openapi::SchemaError),

    #[error(transparent)]
    Model(#[from] ModelError),

    #[error("tool error: {0}")]
    Tool(#[from] ToolError),

    #[error("tool-call limit exceeded: more than {0} calls in one turn")]
    ToolCallLimitExceeded(usize),
}

pub type Result<T> = std::result::Result<T, Error>;
