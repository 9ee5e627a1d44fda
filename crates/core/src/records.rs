//! Record families persisted by the local store.

use std::fmt;

use chrono::Utc;
use serde::{Deserialize, Serialize};

/// Current time in epoch milliseconds, the timestamp unit used across
/// records and backup documents.
pub fn now_millis() -> i64 {
    Utc::now().timestamp_millis()
}

/// Author role of one message inside a chat session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageRole {
    User,
    Assistant,
    System,
}

/// One message in a chat session transcript.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatMessage {
    pub role: MessageRole,
    pub content: String,
    pub timestamp: i64,
}

/// A persisted chat session. Natural key: `id`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatRecord {
    pub id: String,
    pub title: String,
    /// Model the session is pinned to, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    #[serde(default)]
    pub messages: Vec<ChatMessage>,
    pub created_at: i64,
    pub updated_at: i64,
}

/// An auxiliary workspace board (pinned prompts, scratch notes, saved
/// snippets). Natural key: `id`. Card contents are free-form JSON owned by
/// the UI layer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BoardRecord {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub cards: Vec<serde_json::Value>,
    pub updated_at: i64,
}

/// The three persisted record categories, each with its own natural key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecordFamily {
    Chats,
    Settings,
    Boards,
}

impl RecordFamily {
    pub fn as_str(&self) -> &'static str {
        match self {
            RecordFamily::Chats => "chats",
            RecordFamily::Settings => "settings",
            RecordFamily::Boards => "boards",
        }
    }
}

impl fmt::Display for RecordFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
