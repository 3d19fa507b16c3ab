use super::errors::ModelError;
use crate::tools::ToolError;
use futures::stream::BoxStream;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::future::Future;

/// The role of a message sender.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
    Tool,
}

/// A tool call requested by the model, with its arguments decoded.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCall {
    pub id: String,
    pub name: String,
    pub input: Value,
}

/// The result the runtime returned from a tool call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ToolResult {
    Success {
        tool_call_id: String,
        output: Value,
    },
    Failure {
        tool_call_id: String,
        error: ToolError,
    },
}

impl ToolResult {
    pub fn tool_call_id(&self) -> &str {
        match self {
            Self::Success { tool_call_id, .. } | Self::Failure { tool_call_id, .. } => tool_call_id,
        }
    }

    /// The payload handed back to the model.
    pub fn content(&self) -> Value {
        match self {
            Self::Success { output, .. } => output.clone(),
            Self::Failure { error, .. } => serde_json::json!({ "error": error.to_string() }),
        }
    }
}

/// A part of a message, which can be text or a tool interaction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Part {
    Text(String),
    ToolCall(ToolCall),
    ToolResult(ToolResult),
}

/// A message, consisting of a role and one or more parts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub parts: Vec<Part>,
}

impl Message {
    pub fn new(role: Role, text: impl Into<String>) -> Self {
        Self {
            role,
            parts: vec![Part::Text(text.into())],
        }
    }

    pub fn system(text: impl Into<String>) -> Self {
        Self::new(Role::System, text)
    }

    pub fn user(text: impl Into<String>) -> Self {
        Self::new(Role::User, text)
    }

    pub fn assistant(text: impl Into<String>) -> Self {
        Self::new(Role::Assistant, text)
    }

    /// A tool message: the call the model made and what it returned.
    ///
    /// Provider adapters expand this into whatever pair of messages their
    /// API expects, so history grows by exactly one message per call.
    pub fn tool_result(call: ToolCall, result: ToolResult) -> Self {
        Self {
            role: Role::Tool,
            parts: vec![Part::ToolCall(call), Part::ToolResult(result)],
        }
    }

    pub fn from_parts(role: Role, parts: Vec<Part>) -> Self {
        Self { role, parts }
    }

    /// Get combined text content from all text parts.
    pub fn text(&self) -> String {
        self.parts
            .iter()
            .filter_map(|part| match part {
                Part::Text(text) => Some(text.as_str()),
                _ => None,
            })
            .collect::<Vec<_>>()
            .join("")
    }

    /// Extract all tool calls from this message.
    pub fn tool_calls(&self) -> Vec<&ToolCall> {
        self.parts
            .iter()
            .filter_map(|part| match part {
                Part::ToolCall(call) => Some(call),
                _ => None,
            })
            .collect()
    }

    pub fn tool_results(&self) -> Vec<&ToolResult> {
        self.parts
            .iter()
            .filter_map(|part| match part {
                Part::ToolResult(result) => Some(result),
                _ => None,
            })
            .collect()
    }
}

/// A tool definition as offered to the model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolSpec {
    pub name: String,
    pub description: String,
    pub schema: Value,
}

impl From<openapi::ToolDefinition> for ToolSpec {
    fn from(tool: openapi::ToolDefinition) -> Self {
        let schema = serde_json::to_value(&tool.parameters).unwrap_or(Value::Null);
        Self {
            name: tool.name,
            description: tool.description,
            schema,
        }
    }
}

/// A tool call surfaced mid-stream, arguments still JSON-encoded.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PendingToolCall {
    pub id: String,
    pub name: String,
    pub arguments: String,
}

impl PendingToolCall {
    /// Decode the argument string into a JSON object.
    ///
    /// An empty string means no arguments.
    pub fn parse_arguments(&self) -> Result<Map<String, Value>, ToolError> {
        if self.arguments.trim().is_empty() {
            return Ok(Map::new());
        }
        match serde_json::from_str(&self.arguments) {
            Ok(Value::Object(args)) => Ok(args),
            Ok(other) => Err(ToolError::ArgumentParse {
                name: self.name.clone(),
                reason: format!("expected a JSON object, got {other}"),
            }),
            Err(e) => Err(ToolError::ArgumentParse {
                name: self.name.clone(),
                reason: e.to_string(),
            }),
        }
    }
}

/// Why the model stopped generating.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum FinishReason {
    #[default]
    Stop,
    ToolCalls,
    Length,
    ContentFilter,
    Unknown(String),
}

impl FinishReason {
    pub fn parse(reason: &str) -> Self {
        match reason {
            "stop" => Self::Stop,
            "tool_calls" | "function_call" => Self::ToolCalls,
            "length" => Self::Length,
            "content_filter" => Self::ContentFilter,
            other => Self::Unknown(other.to_string()),
        }
    }
}

/// An event delivered by a streaming backend.
#[derive(Debug, Clone, PartialEq)]
pub enum ModelEvent {
    /// A fragment of generated text.
    Text(String),
    /// The model paused to request tool calls.
    ToolCalls(Vec<PendingToolCall>),
    /// Generation ended.
    Finished(FinishReason),
}

pub type EventStream = BoxStream<'static, Result<ModelEvent, ModelError>>;

/// Everything needed for a model request.
#[derive(Debug, Clone)]
pub struct ModelRequest<'a> {
    pub messages: &'a [Message],
    /// Offered with automatic tool choice; the model decides whether to call one.
    pub tools: &'a [ToolSpec],
    pub temperature: Option<f32>,
}

/// Trait for streaming LLM provider backends.
pub trait Backend: Send + Sync {
    /// Start a streamed completion.
    fn stream(
        &self,
        request: ModelRequest<'_>,
    ) -> impl Future<Output = Result<EventStream, ModelError>> + Send;
}
