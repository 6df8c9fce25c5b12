//! The `Message` unit carried on an [`crate::AgentResponse`].

use serde::{Deserialize, Serialize};

/// Token accounting for one assistant message, as reported by the agent collaborator.
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
pub struct TokenUsage {
    pub total: u64,
}

/// A tool invocation recorded on an assistant message.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct ObservedToolCall {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub args: Option<serde_json::Value>,
}

/// Content of an assistant message: text plus whatever tool calls and usage it carried.
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
pub struct AssistantContent {
    pub content: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tool_calls: Vec<ObservedToolCall>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token_usage: Option<TokenUsage>,
}

/// One message in a conversation or agent response.
///
/// Message text is never inspected by the core beyond extracting tool-call
/// names and summing token usage off the `Assistant` variant.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(tag = "role", rename_all = "snake_case")]
pub enum Message {
    System(String),
    User(String),
    Assistant(AssistantContent),
}

impl Message {
    pub fn system(content: impl Into<String>) -> Self {
        Message::System(content.into())
    }

    pub fn user(content: impl Into<String>) -> Self {
        Message::User(content.into())
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Message::Assistant(AssistantContent {
            content: content.into(),
            ..Default::default()
        })
    }

    /// Plain-text content regardless of role.
    pub fn content(&self) -> &str {
        match self {
            Message::System(c) => c,
            Message::User(c) => c,
            Message::Assistant(c) => &c.content,
        }
    }
}
