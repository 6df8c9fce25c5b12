//! Wire shape of one chat-relay stream event (type + payload).
//!
//! Mirrors the five event kinds the relay emits while bridging a client
//! connection to a streaming agent call: `message`, `token`, `tool_call`,
//! `tool_output`, `message_end`, `error`. Envelope fields (run id, sequence
//! number) are applied separately by [`crate::envelope`].

use serde::Serialize;
use serde_json::Value;

/// One event in a chat/run stream.
#[derive(Clone, Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ChatEvent {
    /// Echo of a user (or assistant) message appended to the conversation.
    Message { data: MessageData },
    /// A text delta from the agent's streaming output.
    Token { data: TokenData },
    /// A tool invocation the agent requested.
    ToolCall { data: ToolCallData },
    /// The result of a tool invocation.
    ToolOutput { data: ToolOutputData },
    /// Stream finished normally.
    MessageEnd,
    /// Stream aborted; the connection is closed after this event.
    Error { data: ErrorData },
}

#[derive(Clone, Debug, Serialize)]
pub struct MessageData {
    pub role: String,
    pub content: String,
}

#[derive(Clone, Debug, Serialize)]
pub struct TokenData {
    pub content: String,
}

#[derive(Clone, Debug, Serialize)]
pub struct ToolCallData {
    pub name: String,
    pub args: Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
}

#[derive(Clone, Debug, Serialize)]
pub struct ToolOutputData {
    pub tool_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_call_id: Option<String>,
    pub content: String,
}

#[derive(Clone, Debug, Serialize)]
pub struct ErrorData {
    pub message: String,
}

impl ChatEvent {
    /// Serializes this event to a JSON object (type + payload only; no envelope).
    pub fn to_value(&self) -> Result<Value, serde_json::Error> {
        serde_json::to_value(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn token_event_serializes_with_tag() {
        let ev = ChatEvent::Token {
            data: TokenData {
                content: "hi".to_string(),
            },
        };
        let v = ev.to_value().unwrap();
        assert_eq!(v["type"], "token");
        assert_eq!(v["data"]["content"], "hi");
    }

    #[test]
    fn message_end_has_no_data_field() {
        let ev = ChatEvent::MessageEnd;
        let v = ev.to_value().unwrap();
        assert_eq!(v["type"], "message_end");
        assert!(v.get("data").is_none());
    }
}
