//! Core types for Converse
//!
//! Defines the fundamental domain types:
//! - Conversation, request, and model identifiers
//! - Chat messages and roles
//! - The immutable per-invocation `Request`

use serde::{Deserialize, Serialize};
use ulid::Ulid;

/// Unique request identifier (ULID for sortability)
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct RequestId(pub Ulid);

impl RequestId {
    /// Generate new request ID
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self(Ulid::new())
    }
}

impl Default for RequestId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for RequestId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Conversation identity, the unit sessions are keyed by
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ConversationId(String);

impl ConversationId {
    /// Create conversation ID from any string-like value
    #[inline]
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Get the raw identifier
    #[inline]
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for ConversationId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

impl From<String> for ConversationId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

impl std::fmt::Display for ConversationId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Selected model identifier
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ModelId(String);

impl ModelId {
    /// Create model ID from any string-like value
    #[inline]
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Get the raw identifier
    #[inline]
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for ModelId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

impl std::fmt::Display for ModelId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Author of a chat message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Role {
    /// End user
    User,
    /// Assistant response
    Assistant,
    /// System / instruction message
    System,
}

/// One message of the conversation history
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    /// Message author
    pub role: Role,
    /// Message text
    pub content: String,
}

impl ChatMessage {
    /// Create a user message
    #[inline]
    #[must_use]
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    /// Create an assistant message
    #[inline]
    #[must_use]
    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }

    /// Create a system message
    #[inline]
    #[must_use]
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
        }
    }
}

/// One inbound user turn, immutable for its whole lifetime.
///
/// A `Request` is created when a caller invokes the orchestrator and is
/// never mutated afterwards. A newer `Request` on the same conversation
/// supersedes it; the superseded request is preempted, not destroyed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Request {
    /// Per-invocation identity
    pub id: RequestId,
    /// Conversation this request belongs to
    pub conversation: ConversationId,
    /// Model selected for this turn
    pub model: ModelId,
    /// Ordered message history preceding this turn
    pub history: Vec<ChatMessage>,
    /// The latest user message text
    pub input: String,
}

impl Request {
    /// Create a request with an empty history
    #[inline]
    #[must_use]
    pub fn new(
        conversation: impl Into<ConversationId>,
        model: impl Into<ModelId>,
        input: impl Into<String>,
    ) -> Self {
        Self {
            id: RequestId::new(),
            conversation: conversation.into(),
            model: model.into(),
            history: Vec::new(),
            input: input.into(),
        }
    }

    /// With ordered message history
    #[inline]
    #[must_use]
    pub fn with_history(mut self, history: Vec<ChatMessage>) -> Self {
        self.history = history;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_ids_are_unique() {
        let a = RequestId::new();
        let b = RequestId::new();
        assert_ne!(a, b);
    }

    #[test]
    fn request_builder() {
        let request = Request::new("conv-1", "gpt-x", "hello")
            .with_history(vec![ChatMessage::user("earlier")]);

        assert_eq!(request.conversation.as_str(), "conv-1");
        assert_eq!(request.model.as_str(), "gpt-x");
        assert_eq!(request.input, "hello");
        assert_eq!(request.history.len(), 1);
    }

    #[test]
    fn chat_message_roles_serialize_kebab_case() {
        let json = serde_json::to_string(&Role::Assistant).unwrap();
        assert_eq!(json, "\"assistant\"");
    }
}
