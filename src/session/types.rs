//! Session types for AptoClaw
//!
//! A [`Session`] is the durable conversation memory of one agent thread
//! (`thread_id = user_id`). Messages use the chat-completions shape: roles,
//! assistant tool calls and tool results linked by call id.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Conversation memory of one thread.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    /// Thread identifier; the owning user's id
    pub key: String,
    /// Ordered list of messages, oldest first. Never holds the system prompt.
    pub messages: Vec<Message>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Session {
    /// Create a new empty session with the given key.
    ///
    /// # Example
    /// ```
    /// use aptoclaw::session::Session;
    ///
    /// let session = Session::new("12345");
    /// assert!(session.messages.is_empty());
    /// ```
    pub fn new(key: &str) -> Self {
        let now = Utc::now();
        Self {
            key: key.to_string(),
            messages: Vec::new(),
            created_at: now,
            updated_at: now,
        }
    }

    /// Add a message to this session.
    pub fn add_message(&mut self, message: Message) {
        self.messages.push(message);
        self.updated_at = Utc::now();
    }

    pub fn clear(&mut self) {
        self.messages.clear();
        self.updated_at = Utc::now();
    }

    pub fn message_count(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    pub fn last_message(&self) -> Option<&Message> {
        self.messages.last()
    }

    /// Drop the oldest messages so at most `max` remain.
    ///
    /// The window always starts at a user message, so an assistant tool call
    /// is never separated from its results. When the newest user turn alone
    /// is longer than `max`, that whole turn is kept.
    ///
    /// # Example
    /// ```
    /// use aptoclaw::session::{Message, Session};
    ///
    /// let mut session = Session::new("7");
    /// session.add_message(Message::user("hi"));
    /// session.add_message(Message::assistant("hello"));
    /// session.add_message(Message::user("balance?"));
    /// session.add_message(Message::assistant("1 APT"));
    /// session.trim_to(3);
    /// assert_eq!(session.messages.len(), 2);
    /// assert_eq!(session.messages[0].content, "balance?");
    /// ```
    pub fn trim_to(&mut self, max: usize) {
        let len = self.messages.len();
        if len <= max {
            return;
        }
        let earliest = len - max;
        let start = self.messages[earliest..]
            .iter()
            .position(|m| m.role == Role::User)
            .map(|offset| earliest + offset)
            .or_else(|| self.messages.iter().rposition(|m| m.role == Role::User));

        match start {
            Some(0) => {}
            Some(start) => {
                self.messages.drain(..start);
                self.updated_at = Utc::now();
            }
            None => self.clear(),
        }
    }

    /// Answer every tool call of the last assistant turn that has no result
    /// yet with `content`. Returns how many results were added.
    ///
    /// Used after an interrupted reasoning step so the stored conversation
    /// stays acceptable to the provider.
    pub fn close_pending_tool_calls(&mut self, content: &str) -> usize {
        let Some(turn) = self.messages.iter().rposition(|m| m.has_tool_calls()) else {
            return 0;
        };
        let answered: Vec<String> = self.messages[turn + 1..]
            .iter()
            .filter_map(|m| m.tool_call_id.clone())
            .collect();
        let pending: Vec<String> = self.messages[turn]
            .tool_calls
            .iter()
            .flatten()
            .filter(|c| !answered.contains(&c.id))
            .map(|c| c.id.clone())
            .collect();
        for id in &pending {
            self.add_message(Message::tool_result(id, content));
        }
        pending.len()
    }
}

/// A single message in a conversation.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Message {
    pub role: Role,
    pub content: String,
    /// Tool calls requested by the assistant
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_calls: Option<Vec<ToolCall>>,
    /// The call this message answers (tool results only)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_call_id: Option<String>,
}

impl Message {
    fn plain(role: Role, content: &str) -> Self {
        Self {
            role,
            content: content.to_string(),
            tool_calls: None,
            tool_call_id: None,
        }
    }

    pub fn user(content: &str) -> Self {
        Self::plain(Role::User, content)
    }

    pub fn assistant(content: &str) -> Self {
        Self::plain(Role::Assistant, content)
    }

    pub fn system(content: &str) -> Self {
        Self::plain(Role::System, content)
    }

    /// Result of a tool call, linked to the call by id.
    pub fn tool_result(tool_call_id: &str, content: &str) -> Self {
        Self {
            role: Role::Tool,
            content: content.to_string(),
            tool_calls: None,
            tool_call_id: Some(tool_call_id.to_string()),
        }
    }

    /// Assistant turn that requests tool calls.
    pub fn assistant_with_tools(content: &str, tool_calls: Vec<ToolCall>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.to_string(),
            tool_calls: Some(tool_calls),
            tool_call_id: None,
        }
    }

    pub fn has_tool_calls(&self) -> bool {
        self.tool_calls.as_ref().is_some_and(|c| !c.is_empty())
    }

    pub fn is_tool_result(&self) -> bool {
        self.role == Role::Tool && self.tool_call_id.is_some()
    }
}

/// The role of a message sender in a conversation.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
    Tool,
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Role::System => write!(f, "system"),
            Role::User => write!(f, "user"),
            Role::Assistant => write!(f, "assistant"),
            Role::Tool => write!(f, "tool"),
        }
    }
}

/// A tool call made by the assistant.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ToolCall {
    pub id: String,
    pub name: String,
    /// JSON-encoded arguments
    pub arguments: String,
}

impl ToolCall {
    pub fn new(id: &str, name: &str, arguments: &str) -> Self {
        Self {
            id: id.to_string(),
            name: name.to_string(),
            arguments: arguments.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn turn(session: &mut Session, question: &str, with_tool: bool) {
        session.add_message(Message::user(question));
        if with_tool {
            session.add_message(Message::assistant_with_tools(
                "",
                vec![ToolCall::new("c1", "aptos_get_balance", "{}")],
            ));
            session.add_message(Message::tool_result("c1", r#"{"balance_apt":"1"}"#));
        }
        session.add_message(Message::assistant("answer"));
    }

    #[test]
    fn test_message_constructors() {
        assert_eq!(Message::user("hi").role, Role::User);
        assert_eq!(Message::system("s").role, Role::System);
        let tr = Message::tool_result("call_1", "ok");
        assert!(tr.is_tool_result());
        assert_eq!(tr.tool_call_id.as_deref(), Some("call_1"));
        let a = Message::assistant_with_tools("", vec![ToolCall::new("c", "t", "{}")]);
        assert!(a.has_tool_calls());
        assert!(!Message::assistant_with_tools("", vec![]).has_tool_calls());
    }

    #[test]
    fn test_message_serialization_skips_empty_fields() {
        let json = serde_json::to_string(&Message::user("hi")).unwrap();
        assert_eq!(json, r#"{"role":"user","content":"hi"}"#);
        let back: Message = serde_json::from_str(&json).unwrap();
        assert_eq!(back, Message::user("hi"));
    }

    #[test]
    fn test_trim_noop_when_short() {
        let mut session = Session::new("u");
        turn(&mut session, "q1", false);
        session.trim_to(10);
        assert_eq!(session.message_count(), 2);
    }

    #[test]
    fn test_trim_never_orphans_tool_results() {
        let mut session = Session::new("u");
        turn(&mut session, "q1", true); // 4 messages
        turn(&mut session, "q2", true); // 8 messages
        session.trim_to(6);
        // Cutting at index 2 would start on a tool result; window starts at q2.
        assert_eq!(session.message_count(), 4);
        assert_eq!(session.messages[0].content, "q2");
        assert_eq!(session.messages[0].role, Role::User);
    }

    #[test]
    fn test_trim_keeps_oversized_last_turn() {
        let mut session = Session::new("u");
        turn(&mut session, "q1", false);
        turn(&mut session, "q2", true);
        session.trim_to(2);
        assert_eq!(session.messages[0].content, "q2");
        assert_eq!(session.message_count(), 4);
    }

    #[test]
    fn test_close_pending_tool_calls() {
        let mut session = Session::new("u");
        session.add_message(Message::user("send 1 APT to 0x2 and check balance"));
        session.add_message(Message::assistant_with_tools(
            "",
            vec![
                ToolCall::new("c1", "aptos_transfer", "{}"),
                ToolCall::new("c2", "aptos_get_balance", "{}"),
            ],
        ));
        session.add_message(Message::tool_result("c1", "ok"));

        assert_eq!(session.close_pending_tool_calls("interrupted"), 1);
        let last = session.last_message().unwrap();
        assert_eq!(last.tool_call_id.as_deref(), Some("c2"));
        assert_eq!(last.content, "interrupted");
        // already settled
        assert_eq!(session.close_pending_tool_calls("interrupted"), 0);
    }

    #[test]
    fn test_trim_without_user_messages_clears() {
        let mut session = Session::new("u");
        session.add_message(Message::assistant("a"));
        session.add_message(Message::assistant("b"));
        session.trim_to(1);
        assert!(session.is_empty());
    }
}
