use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

// =============================================================================
// Message Types
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    System,
    User,
    Assistant,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub role: MessageRole,
    pub content: String,
}

impl Message {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: MessageRole::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: MessageRole::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: MessageRole::Assistant,
            content: content.into(),
        }
    }
}

// =============================================================================
// Prompt / Completion
// =============================================================================

/// The request payload handed to a chat model: either one bare string, or an
/// explicit message list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Prompt {
    Text(String),
    Messages(Vec<Message>),
}

impl Prompt {
    /// Flatten into a message list. A bare string becomes a single user turn.
    pub fn into_messages(self) -> Vec<Message> {
        match self {
            Prompt::Text(text) => vec![Message::user(text)],
            Prompt::Messages(messages) => messages,
        }
    }

    /// System turns joined with blank lines, for providers that take the
    /// system prompt out of band.
    pub fn system_text(messages: &[Message]) -> Option<String> {
        let parts: Vec<&str> = messages
            .iter()
            .filter(|m| m.role == MessageRole::System)
            .map(|m| m.content.as_str())
            .collect();
        if parts.is_empty() {
            None
        } else {
            Some(parts.join("\n\n"))
        }
    }
}

impl From<String> for Prompt {
    fn from(text: String) -> Self {
        Prompt::Text(text)
    }
}

impl From<&str> for Prompt {
    fn from(text: &str) -> Self {
        Prompt::Text(text.to_string())
    }
}

impl From<Vec<Message>> for Prompt {
    fn from(messages: Vec<Message>) -> Self {
        Prompt::Messages(messages)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Completion {
    pub content: String,
}

impl Completion {
    pub fn new(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
        }
    }
}

// =============================================================================
// ChatModel Trait
// =============================================================================

/// A single request/response call against an LLM backend.
///
/// Object safe so callers can hold `Arc<dyn ChatModel>` and swap providers
/// (or a scripted model in tests) without touching stage code.
#[async_trait]
pub trait ChatModel: Send + Sync {
    /// Provider/model label used in logs.
    fn name(&self) -> &str;

    async fn invoke(&self, prompt: Prompt) -> Result<Completion>;
}

#[async_trait]
impl<M: ChatModel + ?Sized> ChatModel for std::sync::Arc<M> {
    fn name(&self) -> &str {
        (**self).name()
    }

    async fn invoke(&self, prompt: Prompt) -> Result<Completion> {
        (**self).invoke(prompt).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn text_prompt_becomes_single_user_turn() {
        let messages = Prompt::from("hello").into_messages();
        assert_eq!(messages, vec![Message::user("hello")]);
    }

    #[test]
    fn system_text_joins_system_turns_only() {
        let messages = vec![
            Message::system("be terse"),
            Message::user("hi"),
            Message::system("reply in json"),
        ];
        assert_eq!(
            Prompt::system_text(&messages).as_deref(),
            Some("be terse\n\nreply in json")
        );
        assert_eq!(Prompt::system_text(&[Message::user("hi")]), None);
    }
}
