//! OpenAI-compatible chat completions backend (streamed).

use std::collections::BTreeMap;

use async_stream::try_stream;
use futures::StreamExt;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use tracing::{debug, trace};

use super::sse;
use crate::model::{
    Backend, EventStream, FinishReason, Message, ModelError, ModelEvent, ModelRequest, Part,
    PendingToolCall, Role, ToolSpec,
};

pub const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";

// ─────────────────────────────────────────────────────────────────────────────
// API Wire Types
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Serialize)]
struct ApiRequest<'a> {
    model: &'a str,
    messages: Vec<ApiMessage>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    tools: Vec<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tool_choice: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    stream: bool,
}

#[derive(Debug, Serialize, PartialEq)]
struct ApiMessage {
    role: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    content: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    tool_calls: Vec<ApiToolCall>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tool_call_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    name: Option<String>,
}

impl ApiMessage {
    fn text(role: &'static str, content: String) -> Self {
        Self {
            role,
            content: Some(content),
            tool_calls: Vec::new(),
            tool_call_id: None,
            name: None,
        }
    }
}

#[derive(Debug, Serialize, PartialEq)]
struct ApiToolCall {
    id: String,
    #[serde(rename = "type")]
    kind: &'static str,
    function: ApiFunctionCall,
}

#[derive(Debug, Serialize, PartialEq)]
struct ApiFunctionCall {
    name: String,
    arguments: String,
}

#[derive(Debug, Deserialize)]
struct ApiChunk {
    #[serde(default)]
    choices: Vec<ApiChoice>,
    #[serde(default)]
    error: Option<Value>,
}

#[derive(Debug, Deserialize)]
struct ApiChoice {
    #[serde(default)]
    delta: ApiDelta,
    #[serde(default)]
    finish_reason: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct ApiDelta {
    #[serde(default)]
    content: Option<String>,
    #[serde(default)]
    tool_calls: Vec<ApiToolCallDelta>,
}

#[derive(Debug, Deserialize)]
struct ApiToolCallDelta {
    #[serde(default)]
    index: usize,
    #[serde(default)]
    id: Option<String>,
    #[serde(default)]
    function: ApiFunctionDelta,
}

#[derive(Debug, Default, Deserialize)]
struct ApiFunctionDelta {
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    arguments: Option<String>,
}

// ─────────────────────────────────────────────────────────────────────────────
// Message conversion
// ─────────────────────────────────────────────────────────────────────────────

fn role_to_api(role: Role) -> &'static str {
    match role {
        Role::System => "system",
        Role::User => "user",
        Role::Assistant => "assistant",
        Role::Tool => "tool",
    }
}

/// Convert one message into wire messages.
///
/// A tool message expands into the assistant's call followed by the result.
fn message_to_api(msg: &Message) -> Vec<ApiMessage> {
    if msg.role != Role::Tool {
        return vec![ApiMessage::text(role_to_api(msg.role), msg.text())];
    }

    let calls = msg.tool_calls();
    let text = msg.text();
    let assistant = ApiMessage {
        role: "assistant",
        content: (!text.is_empty()).then_some(text),
        tool_calls: calls
            .iter()
            .map(|call| ApiToolCall {
                id: call.id.clone(),
                kind: "function",
                function: ApiFunctionCall {
                    name: call.name.clone(),
                    arguments: match &call.input {
                        Value::String(raw) => raw.clone(),
                        input => input.to_string(),
                    },
                },
            })
            .collect(),
        tool_call_id: None,
        name: None,
    };

    let mut out = vec![assistant];
    for part in &msg.parts {
        if let Part::ToolResult(result) = part {
            let id = result.tool_call_id();
            let name = calls.iter().find(|c| c.id == id).map(|c| c.name.clone());
            out.push(ApiMessage {
                role: "tool",
                content: Some(result.content().to_string()),
                tool_calls: Vec::new(),
                tool_call_id: Some(id.to_string()),
                name,
            });
        }
    }
    out
}

fn tool_to_api(spec: &ToolSpec) -> Value {
    json!({
        "type": "function",
        "function": {
            "name": spec.name,
            "description": spec.description,
            "parameters": spec.schema,
        }
    })
}

// ─────────────────────────────────────────────────────────────────────────────
// Chunk accumulation
// ─────────────────────────────────────────────────────────────────────────────

/// Turns streamed chunks into model events, assembling tool-call fragments
/// by index until the model finishes.
#[derive(Debug, Default)]
struct ChunkAccumulator {
    calls: BTreeMap<usize, PendingToolCall>,
    finished: bool,
}

impl ChunkAccumulator {
    fn push(&mut self, chunk: ApiChunk) -> Result<Vec<ModelEvent>, ModelError> {
        if let Some(error) = chunk.error {
            return Err(ModelError::Api(error.to_string()));
        }

        let mut events = Vec::new();
        let Some(choice) = chunk.choices.into_iter().next() else {
            return Ok(events);
        };

        if let Some(text) = choice.delta.content.filter(|t| !t.is_empty()) {
            events.push(ModelEvent::Text(text));
        }

        for delta in choice.delta.tool_calls {
            let call = self.calls.entry(delta.index).or_default();
            if let Some(id) = delta.id {
                call.id = id;
            }
            if let Some(name) = delta.function.name {
                call.name.push_str(&name);
            }
            if let Some(arguments) = delta.function.arguments {
                call.arguments.push_str(&arguments);
            }
        }

        if let Some(reason) = choice.finish_reason {
            events.extend(self.flush(FinishReason::parse(&reason)));
        }
        Ok(events)
    }

    fn finish(&mut self) -> Vec<ModelEvent> {
        if self.finished {
            return Vec::new();
        }
        self.flush(FinishReason::Stop)
    }

    fn flush(&mut self, reason: FinishReason) -> Vec<ModelEvent> {
        self.finished = true;
        let mut events = Vec::new();
        if !self.calls.is_empty() {
            let calls = std::mem::take(&mut self.calls).into_values().collect();
            events.push(ModelEvent::ToolCalls(calls));
        }
        events.push(ModelEvent::Finished(reason));
        events
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Backend Implementation
// ─────────────────────────────────────────────────────────────────────────────

/// Builder for creating an OpenAI-compatible backend.
#[derive(Debug, Clone)]
pub struct OpenAiBackendBuilder {
    api_key: String,
    model: String,
    base_url: String,
}

impl OpenAiBackendBuilder {
    pub fn new(api_key: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            model: model.into(),
            base_url: DEFAULT_BASE_URL.to_string(),
        }
    }

    /// Point the backend at another OpenAI-compatible server.
    pub fn base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    pub fn build(self) -> OpenAiBackend {
        OpenAiBackend {
            client: reqwest::Client::new(),
            api_key: self.api_key,
            model: self.model,
            base_url: self.base_url,
        }
    }
}

/// Streaming chat completions backend.
pub struct OpenAiBackend {
    client: reqwest::Client,
    api_key: String,
    model: String,
    base_url: String,
}

impl OpenAiBackend {
    pub fn builder(api_key: impl Into<String>, model: impl Into<String>) -> OpenAiBackendBuilder {
        OpenAiBackendBuilder::new(api_key, model)
    }

    fn endpoint(&self) -> String {
        format!("{}/chat/completions", self.base_url.trim_end_matches('/'))
    }

    /// Tool choice is left to the model, and only sent when tools are offered.
    fn api_request(&self, request: &ModelRequest<'_>) -> ApiRequest<'_> {
        let tools: Vec<Value> = request.tools.iter().map(tool_to_api).collect();
        ApiRequest {
            model: &self.model,
            messages: request.messages.iter().flat_map(message_to_api).collect(),
            tool_choice: (!tools.is_empty()).then_some("auto"),
            tools,
            temperature: request.temperature,
            stream: true,
        }
    }
}

impl std::fmt::Display for OpenAiBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "openai({}, {})", self.model, self.base_url)
    }
}

impl Backend for OpenAiBackend {
    async fn stream(&self, request: ModelRequest<'_>) -> Result<EventStream, ModelError> {
        let api_request = self.api_request(&request);
        debug!(
            backend = %self,
            messages = api_request.messages.len(),
            tools = api_request.tools.len(),
            "requesting completion"
        );

        let response = self
            .client
            .post(self.endpoint())
            .bearer_auth(&self.api_key)
            .header("accept", "text/event-stream")
            .json(&api_request)
            .send()
            .await
            .map_err(|e| ModelError::Network(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(ModelError::Api(format!("{status}: {body}")));
        }

        let mut frames = Box::pin(sse::frames(Box::pin(response.bytes_stream())));
        let events: EventStream = Box::pin(try_stream! {
            let mut acc = ChunkAccumulator::default();
            while let Some(frame) = frames.next().await {
                let frame = frame?;
                trace!(%frame, "completion chunk");
                let chunk: ApiChunk = serde_json::from_str(&frame)
                    .map_err(|e| ModelError::InvalidResponse(e.to_string()))?;
                for event in acc.push(chunk)? {
                    yield event;
                }
            }
            for event in acc.finish() {
                yield event;
            }
        });
        Ok(events)
    }
}
