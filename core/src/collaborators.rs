//! Collaborator interfaces (§1): the three externally supplied implementations
//! this engine consumes but never provides itself.

use async_trait::async_trait;

use crate::domain::{AgentResponse, ValidationVerdict};
use crate::error::{AgentError, ValidatorError};

/// A fragment of a streaming agent reply, used by the Chat Relay (§4.G).
#[derive(Clone, Debug, PartialEq)]
pub enum AgentStreamEvent {
    /// A text delta.
    Token(String),
    /// A tool invocation the agent requested.
    ToolCall {
        name: String,
        args: serde_json::Value,
        id: Option<String>,
    },
    /// The result of a tool invocation.
    ToolOutput {
        tool_name: String,
        tool_call_id: Option<String>,
        content: String,
    },
}

/// The user agent callable: `query(prompt) -> structured response`, plus a
/// streaming variant the Chat Relay drives.
#[async_trait]
pub trait Agent: Send + Sync {
    async fn query(&self, prompt: &str) -> Result<AgentResponse, AgentError>;

    /// Streams a reply to `history` plus `prompt`, forwarding each fragment to
    /// `sink` in generation order. Returns the concatenated text of every
    /// `Token` fragment once the stream ends.
    async fn stream(
        &self,
        history: &[crate::message::Message],
        prompt: &str,
        sink: &mut (dyn FnMut(AgentStreamEvent) + Send),
    ) -> Result<String, AgentError>;
}

/// The validator collaborator: a pure function from `(response, expectations)`
/// to a verdict (§9 "Validator interface").
#[async_trait]
pub trait Validator: Send + Sync {
    async fn judge(
        &self,
        response: &AgentResponse,
        expectations: &[String],
    ) -> Result<ValidationVerdict, ValidatorError>;
}
