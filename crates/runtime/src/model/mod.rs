//! LLM protocol types and the streaming backend trait.

pub mod errors;
pub mod types;

pub use errors::ModelError;
pub use types::{
    Backend, EventStream, FinishReason, Message, ModelEvent, ModelRequest, Part, PendingToolCall,
    Role, ToolCall, ToolResult, ToolSpec,
};
