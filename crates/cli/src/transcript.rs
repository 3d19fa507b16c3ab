//! Conversion of runtime messages into stored transcripts.

use runtime::{Message, Role};
use serde_json::json;
use storage::StoredMessage;

/// Flatten a history into storable messages.
///
/// A tool message is stored as one JSON document naming the tool, its
/// arguments and the result it returned, plus any text the model streamed
/// before calling it.
pub fn to_stored(messages: &[Message]) -> Vec<StoredMessage> {
    messages.iter().map(stored).collect()
}

fn stored(message: &Message) -> StoredMessage {
    let role = match message.role {
        Role::System => storage::Role::System,
        Role::User => storage::Role::User,
        Role::Assistant => storage::Role::Assistant,
        Role::Tool => storage::Role::Tool,
    };

    if message.role != Role::Tool {
        return StoredMessage::new(role, message.text());
    }

    let calls: Vec<_> = message
        .tool_calls()
        .into_iter()
        .map(|call| json!({ "id": call.id, "name": call.name, "arguments": call.input }))
        .collect();
    let results: Vec<_> = message.tool_results().iter().map(|r| r.content()).collect();
    let mut content = json!({ "calls": calls, "results": results });
    let text = message.text();
    if !text.is_empty() {
        content["text"] = json!(text);
    }
    StoredMessage::new(role, content.to_string())
}
