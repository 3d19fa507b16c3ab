//! Chat records.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Longest title kept for a chat, in characters.
pub const TITLE_LEN: usize = 100;

/// A unique identifier for a chat.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ChatId(pub Uuid);

impl ChatId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for ChatId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for ChatId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::str::FromStr for ChatId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.parse().map(Self)
    }
}

/// The role of a message in the conversation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
    System,
    Tool,
}

/// One message of a saved transcript.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredMessage {
    pub role: Role,
    pub content: String,
}

impl StoredMessage {
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
        }
    }
}

/// A completed conversation as persisted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatRecord {
    pub id: ChatId,
    pub title: String,
    pub user_id: String,
    pub created_at: DateTime<Utc>,
    pub path: String,
    pub messages: Vec<StoredMessage>,
}

impl ChatRecord {
    /// Build a record stamped with the current time.
    ///
    /// The title is the first user message (or the first message, if there
    /// is no user message) cut to [`TITLE_LEN`] characters.
    pub fn new(id: ChatId, user_id: impl Into<String>, messages: Vec<StoredMessage>) -> Self {
        let title = messages
            .iter()
            .find(|m| m.role == Role::User)
            .or(messages.first())
            .map(|m| m.content.chars().take(TITLE_LEN).collect())
            .unwrap_or_default();
        Self {
            id,
            title,
            user_id: user_id.into(),
            created_at: Utc::now(),
            path: format!("/chat/{id}"),
            messages,
        }
    }
}

/// Summary of a saved chat.
#[derive(Debug, Clone, PartialEq)]
pub struct ChatSummary {
    pub id: ChatId,
    pub title: String,
    pub path: String,
    pub created_at: DateTime<Utc>,
    pub message_count: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn title_is_first_user_message_truncated() {
        let long = "é".repeat(150);
        let record = ChatRecord::new(
            ChatId::new(),
            "u1",
            vec![
                StoredMessage::new(Role::System, "be brief"),
                StoredMessage::new(Role::User, long),
            ],
        );
        assert_eq!(record.title.chars().count(), TITLE_LEN);
        assert!(record.title.chars().all(|c| c == 'é'));
    }

    #[test]
    fn title_falls_back_to_first_message() {
        let record = ChatRecord::new(
            ChatId::new(),
            "u1",
            vec![StoredMessage::new(Role::Assistant, "hello")],
        );
        assert_eq!(record.title, "hello");

        let empty = ChatRecord::new(ChatId::new(), "u1", Vec::new());
        assert_eq!(empty.title, "");
    }

    #[test]
    fn path_uses_the_chat_id() {
        let id = ChatId::new();
        let record = ChatRecord::new(id, "u1", Vec::new());
        assert_eq!(record.path, format!("/chat/{id}"));
    }

    #[test]
    fn chat_id_round_trips_through_display() {
        let id = ChatId::new();
        assert_eq!(id.to_string().parse::<ChatId>().unwrap(), id);
    }
}
