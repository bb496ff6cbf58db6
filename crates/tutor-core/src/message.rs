//! Conversation Messages
//!
//! Role-tagged messages and the bounded store that owns a conversation.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::tool::{ToolCallRequest, ToolCallResult};

/// Default maximum number of retained messages
pub const DEFAULT_MAX_HISTORY: usize = 50;

/// Role of a message sender
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// System prompt/instructions
    System,
    /// User input
    User,
    /// Assistant (LLM) response
    Assistant,
    /// Tool result
    Tool,
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::System => write!(f, "system"),
            Self::User => write!(f, "user"),
            Self::Assistant => write!(f, "assistant"),
            Self::Tool => write!(f, "tool"),
        }
    }
}

impl std::str::FromStr for Role {
    type Err = crate::error::TutorError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "system" => Ok(Self::System),
            "user" => Ok(Self::User),
            "assistant" => Ok(Self::Assistant),
            "tool" => Ok(Self::Tool),
            other => Err(crate::error::TutorError::Parse(format!("unknown role '{other}'"))),
        }
    }
}

/// A single message in a conversation
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Message {
    /// Message role
    pub role: Role,

    /// Text content
    pub content: String,

    /// Correlates a tool-role message with the assistant's request
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_call_id: Option<String>,

    /// Tool requests issued by an assistant turn
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tool_calls: Vec<ToolCallRequest>,

    /// Timestamp
    #[serde(default = "Utc::now")]
    pub timestamp: DateTime<Utc>,
}

impl Message {
    /// Create a new message
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
            tool_call_id: None,
            tool_calls: Vec::new(),
            timestamp: Utc::now(),
        }
    }

    /// Create a system message
    pub fn system(content: impl Into<String>) -> Self {
        Self::new(Role::System, content)
    }

    /// Create a user message
    pub fn user(content: impl Into<String>) -> Self {
        Self::new(Role::User, content)
    }

    /// Create an assistant message
    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(Role::Assistant, content)
    }

    /// Create an assistant message that requests tool calls
    pub fn assistant_tool_calls(content: impl Into<String>, calls: Vec<ToolCallRequest>) -> Self {
        let mut msg = Self::new(Role::Assistant, content);
        msg.tool_calls = calls;
        msg
    }

    /// Create a tool result message
    pub fn tool(content: impl Into<String>, tool_call_id: impl Into<String>) -> Self {
        let mut msg = Self::new(Role::Tool, content);
        msg.tool_call_id = Some(tool_call_id.into());
        msg
    }

    pub fn tool_result(result: &ToolCallResult) -> Self {
        Self::tool(result.output.clone(), result.tool_call_id.clone())
    }

    pub fn has_tool_calls(&self) -> bool {
        !self.tool_calls.is_empty()
    }
}

/// Bounded, ordered conversation history
///
/// Appends evict the oldest messages once the store grows past its maximum.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ConversationStore {
    messages: Vec<Message>,

    /// Maximum number of retained messages
    #[serde(default = "default_max_history")]
    max_history: usize,
}

const fn default_max_history() -> usize {
    DEFAULT_MAX_HISTORY
}

impl Default for ConversationStore {
    fn default() -> Self {
        Self::new()
    }
}

impl ConversationStore {
    pub const fn new() -> Self {
        Self::with_max_history(DEFAULT_MAX_HISTORY)
    }

    pub const fn with_max_history(max_history: usize) -> Self {
        Self {
            messages: Vec::new(),
            max_history,
        }
    }

    /// Append a plain message
    pub fn append(&mut self, role: Role, content: impl Into<String>) {
        self.push(Message::new(role, content));
    }

    /// Append a fully built message
    pub fn push(&mut self, message: Message) {
        self.messages.push(message);
        self.evict();
    }

    fn evict(&mut self) {
        if self.messages.len() > self.max_history {
            let excess = self.messages.len() - self.max_history;
            self.messages.drain(..excess);
        }
    }

    /// Most recent `limit` messages, oldest first.
    ///
    /// A zero or negative limit returns the whole history.
    pub fn recent(&self, limit: isize) -> &[Message] {
        match usize::try_from(limit) {
            Ok(limit) if limit > 0 => {
                let start = self.messages.len().saturating_sub(limit);
                &self.messages[start..]
            }
            _ => &self.messages,
        }
    }

    /// Recent messages suitable for sending to a provider.
    ///
    /// The window starts at a user message. Anything before the first one is
    /// dropped, so tool results never lose their requesting assistant turn.
    pub fn context_window(&self, limit: usize) -> &[Message] {
        let window = self.recent(isize::try_from(limit).unwrap_or(isize::MAX));
        let skip = window
            .iter()
            .position(|m| m.role == Role::User)
            .unwrap_or(window.len());
        &window[skip..]
    }

    /// Get all messages
    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    /// Get the last message
    pub fn last(&self) -> Option<&Message> {
        self.messages.last()
    }

    pub fn clear(&mut self) {
        self.messages.clear();
    }

    pub fn count(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    /// Remove the newest message; false if the store was empty
    pub fn remove_last(&mut self) -> bool {
        self.messages.pop().is_some()
    }

    pub const fn max_history(&self) -> usize {
        self.max_history
    }

    /// Change the maximum and trim immediately
    pub fn set_max_history(&mut self, max_history: usize) {
        self.max_history = max_history;
        self.evict();
    }

    /// Short recap of the last few exchanges
    pub fn summary(&self) -> String {
        if self.messages.is_empty() {
            return "No conversation yet.".into();
        }

        let mut summary = String::from("Recent conversation:\n");
        for msg in self.recent(4) {
            let who = if msg.role == Role::User { "You" } else { "AI" };
            let preview: String = msg.content.chars().take(100).collect();
            let ellipsis = if msg.content.chars().count() > 100 { "..." } else { "" };
            summary.push_str(&format!("{who}: {preview}{ellipsis}\n"));
        }

        summary.trim_end().to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_message_creation() {
        let msg = Message::user("Hello");
        assert_eq!(msg.role, Role::User);
        assert_eq!(msg.content, "Hello");
        assert!(msg.tool_call_id.is_none());

        let tool = Message::tool("listing", "call_1");
        assert_eq!(tool.tool_call_id.as_deref(), Some("call_1"));
    }

    #[test]
    fn test_eviction_keeps_most_recent() {
        let mut store = ConversationStore::with_max_history(5);
        for i in 0..12 {
            store.append(Role::User, format!("m{i}"));
        }

        assert_eq!(store.count(), 5);
        let contents: Vec<_> = store.recent(5).iter().map(|m| m.content.as_str()).collect();
        assert_eq!(contents, vec!["m7", "m8", "m9", "m10", "m11"]);
    }

    #[test]
    fn test_default_limit_is_fifty() {
        let mut store = ConversationStore::new();
        for i in 0..75 {
            store.append(Role::Assistant, i.to_string());
        }
        assert_eq!(store.count(), 50);
        assert_eq!(store.messages()[0].content, "25");
    }

    #[test]
    fn test_recent_zero_or_negative_returns_everything() {
        let mut store = ConversationStore::new();
        store.append(Role::User, "a");
        store.append(Role::Assistant, "b");
        store.append(Role::User, "c");

        assert_eq!(store.recent(0).len(), 3);
        assert_eq!(store.recent(-4).len(), 3);
        assert_eq!(store.recent(2)[0].content, "b");
        assert_eq!(store.recent(10).len(), 3);
    }

    #[test]
    fn test_remove_last_and_clear() {
        let mut store = ConversationStore::new();
        assert!(!store.remove_last());

        store.append(Role::User, "hi");
        store.append(Role::Assistant, "hello");
        assert!(store.remove_last());
        assert_eq!(store.last().map(|m| m.content.as_str()), Some("hi"));

        store.clear();
        assert_eq!(store.count(), 0);
    }

    #[test]
    fn test_set_max_history_trims() {
        let mut store = ConversationStore::new();
        for i in 0..10 {
            store.append(Role::User, i.to_string());
        }
        store.set_max_history(3);
        assert_eq!(store.count(), 3);
        assert_eq!(store.messages()[0].content, "7");
    }

    #[test]
    fn test_context_window_starts_at_a_user_message() {
        let mut store = ConversationStore::new();
        store.append(Role::User, "read it");
        store.push(Message::assistant_tool_calls(
            "",
            vec![ToolCallRequest::new("c1", "read_file", serde_json::json!({"file_path": "a"}))],
        ));
        store.push(Message::tool("contents", "c1"));
        store.append(Role::Assistant, "done");

        assert!(store.context_window(2).is_empty());
        assert!(store.context_window(3).is_empty());
        let window = store.context_window(4);
        assert_eq!(window.len(), 4);
        assert_eq!(window[0].role, Role::User);

        store.append(Role::User, "thanks");
        let window = store.context_window(2);
        assert_eq!(window.len(), 1);
        assert_eq!(window[0].content, "thanks");
    }

    #[test]
    fn test_summary() {
        let mut store = ConversationStore::new();
        assert_eq!(store.summary(), "No conversation yet.");

        store.append(Role::User, "x".repeat(120));
        store.append(Role::Assistant, "short");
        let summary = store.summary();
        assert!(summary.starts_with("Recent conversation:\nYou: "));
        assert!(summary.contains("..."));
        assert!(summary.ends_with("AI: short"));
    }
}
