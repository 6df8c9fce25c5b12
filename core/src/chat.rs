//! Chat Relay (§4.G): per-conversation state, bridging a client connection to
//! a streaming agent call.
//!
//! Grounded in `serve/src/run/{mod,request,stream,delivery}.rs`: the
//! agent-task-vs-delivery-task split (one task drives the agent and forwards
//! fragments into a channel; the consuming task writes them out and only
//! then joins the agent task) and the `RunStreamSender` abstraction over the
//! transport, here renamed `ChatSink` since this relay has no WebSocket
//! dependency of its own — `server` supplies the sink and translates
//! [`RelayEvent`] into `protocol::ChatEvent` for the wire.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use dashmap::DashMap;
use serde_json::Value;
use tokio::sync::{mpsc, Mutex};

use crate::collaborators::{Agent, AgentStreamEvent};
use crate::discovery::Discovery;
use crate::domain::Conversation;
use crate::error::ChatError;
use crate::message::Message;

/// One event the relay forwards to its sink, mirroring the five wire kinds
/// of §4.G's per-message protocol.
#[derive(Clone, Debug, PartialEq)]
pub enum RelayEvent {
    Message { role: String, content: String },
    Token { content: String },
    ToolCall { name: String, args: Value, id: Option<String> },
    ToolOutput { tool_name: String, tool_call_id: Option<String>, content: String },
    MessageEnd,
    Error { message: String },
}

/// Destination for relay events; `server` implements this over a WebSocket.
#[async_trait]
pub trait ChatSink: Send {
    async fn send(&mut self, event: RelayEvent) -> Result<(), String>;
}

/// Builds a fresh agent instance for a conversation's model, per §4.G step 2
/// ("build a fresh agent instance via `agentFactory(model)`").
pub trait AgentFactory: Send + Sync {
    fn build(&self, model: &str) -> Arc<dyn Agent>;
}

/// Conversation map plus the collaborators needed to drive a stream.
///
/// `conversations` is a `DashMap` of per-id `tokio::sync::Mutex`, matching
/// §5's "conversation map (single-writer per id)"; a second concurrent
/// `send_message` for the same id fails fast via `try_lock` rather than
/// queuing (§4.G "Concurrency & ordering").
pub struct ChatRelay {
    conversations: DashMap<String, Arc<Mutex<Conversation>>>,
    agent_factory: Arc<dyn AgentFactory>,
    discovery: Arc<dyn Discovery>,
}

impl ChatRelay {
    pub fn new(agent_factory: Arc<dyn AgentFactory>, discovery: Arc<dyn Discovery>) -> Self {
        Self {
            conversations: DashMap::new(),
            agent_factory,
            discovery,
        }
    }

    pub fn create_conversation(&self, agent_id: String, model: String, title: Option<String>) -> Conversation {
        let now = Utc::now().to_rfc3339();
        let conversation = Conversation {
            id: uuid::Uuid::new_v4().to_string(),
            agent_id,
            model,
            title,
            messages: Vec::new(),
            created_at: now.clone(),
            updated_at: now,
        };
        self.conversations.insert(
            conversation.id.clone(),
            Arc::new(Mutex::new(conversation.clone())),
        );
        conversation
    }

    pub async fn list_conversations(&self) -> Vec<Conversation> {
        let mut out = Vec::with_capacity(self.conversations.len());
        for entry in self.conversations.iter() {
            out.push(entry.value().lock().await.clone());
        }
        out.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        out
    }

    pub async fn get_conversation(&self, id: &str) -> Result<Conversation, ChatError> {
        let entry = self
            .conversations
            .get(id)
            .ok_or_else(|| ChatError::ConversationNotFound(id.to_string()))?;
        Ok(entry.value().lock().await.clone())
    }

    pub fn delete_conversation(&self, id: &str) -> Result<(), ChatError> {
        self.conversations
            .remove(id)
            .map(|_| ())
            .ok_or_else(|| ChatError::ConversationNotFound(id.to_string()))
    }

    /// Drops messages but keeps the id (§4.G "clearConversation").
    pub async fn clear_conversation(&self, id: &str) -> Result<(), ChatError> {
        let entry = self
            .conversations
            .get(id)
            .ok_or_else(|| ChatError::ConversationNotFound(id.to_string()))?;
        let mut conversation = entry.value().lock().await;
        conversation.messages.clear();
        conversation.updated_at = Utc::now().to_rfc3339();
        Ok(())
    }

    /// Runs the per-message protocol of §4.G for one `send_message` call.
    /// Rejects a second concurrent call for the same conversation id.
    pub async fn send_message(&self, id: &str, content: String, sink: &mut dyn ChatSink) -> Result<(), ChatError> {
        let handle = self
            .conversations
            .get(id)
            .ok_or_else(|| ChatError::ConversationNotFound(id.to_string()))?
            .clone();

        let mut conversation = handle
            .try_lock()
            .map_err(|_| ChatError::ConcurrentSend(id.to_string()))?;

        tracing::info!(conversation_id = %id, "chat send_message started");

        // Step 1: echo the user message and append it.
        sink.send(RelayEvent::Message {
            role: "human".to_string(),
            content: content.clone(),
        })
        .await
        .map_err(|e| ChatError::Agent(crate::error::AgentError::Failed(e)))?;
        conversation.messages.push(Message::user(content.clone()));

        // Step 2: reload source, then build a fresh agent for this model.
        // Policy decision (DESIGN.md Open Question): always reload before a
        // stream, since a chat turn is infrequent relative to test runs and
        // staleness here is more visible to a human than to the test runner.
        self.discovery.reload().await;
        let agent = self.agent_factory.build(&conversation.model);

        // Step 3+4: stream the agent reply. The agent task forwards
        // fragments into a channel; this task consumes and forwards to the
        // sink, then joins the agent task (grounded in `serve::run::stream`
        // + `serve::run::delivery`'s task split). Unbounded, not `try_send`
        // into a bounded channel: the sink side can run behind the agent
        // (a slow WebSocket write), and §4.G requires every fragment to
        // produce exactly one event rather than dropping under backpressure.
        let history = conversation.messages.clone();
        let prompt = content.clone();
        let (tx, mut rx) = mpsc::unbounded_channel::<AgentStreamEvent>();
        let agent_task = tokio::spawn(async move {
            let mut forward = move |event: AgentStreamEvent| {
                let _ = tx.send(event);
            };
            agent.stream(&history, &prompt, &mut forward).await
        });

        let mut any_token = false;
        while let Some(event) = rx.recv().await {
            let relay_event = match event {
                AgentStreamEvent::Token(text) => {
                    any_token = true;
                    RelayEvent::Token { content: text }
                }
                AgentStreamEvent::ToolCall { name, args, id } => RelayEvent::ToolCall { name, args, id },
                AgentStreamEvent::ToolOutput {
                    tool_name,
                    tool_call_id,
                    content,
                } => RelayEvent::ToolOutput {
                    tool_name,
                    tool_call_id,
                    content,
                },
            };
            if sink.send(relay_event).await.is_err() {
                tracing::debug!(conversation_id = %id, "sink closed, aborting agent stream");
                agent_task.abort();
                return Ok(());
            }
        }

        let outcome = agent_task.await;
        conversation.updated_at = Utc::now().to_rfc3339();

        match outcome {
            Ok(Ok(full_text)) => {
                tracing::info!(conversation_id = %id, any_token, "chat stream completed");
                if any_token {
                    conversation.messages.push(Message::assistant(full_text.clone()));
                }
                let _ = sink.send(RelayEvent::MessageEnd).await;
                Ok(())
            }
            Ok(Err(agent_error)) => {
                tracing::warn!(conversation_id = %id, "agent stream failed: {}", agent_error);
                let _ = sink
                    .send(RelayEvent::Error {
                        message: agent_error.to_string(),
                    })
                    .await;
                Ok(())
            }
            Err(join_error) => {
                tracing::warn!(conversation_id = %id, "agent task join failed: {}", join_error);
                let _ = sink
                    .send(RelayEvent::Error {
                        message: join_error.to_string(),
                    })
                    .await;
                Ok(())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::discovery::DiscoveryResult;
    use crate::domain::{AgentResponse, CaseSpec, TestDescriptor};
    use crate::error::{AgentError, DiscoveryError};

    struct NoopDiscovery;

    #[async_trait]
    impl Discovery for NoopDiscovery {
        async fn list_tests(&self) -> DiscoveryResult {
            DiscoveryResult::default()
        }
        async fn reload(&self) {}
        async fn load_case(&self, _descriptor: &TestDescriptor) -> Result<Vec<CaseSpec>, DiscoveryError> {
            Ok(vec![])
        }
    }

    struct StreamingAgent;

    #[async_trait]
    impl Agent for StreamingAgent {
        async fn query(&self, _prompt: &str) -> Result<AgentResponse, AgentError> {
            unimplemented!()
        }
        async fn stream(
            &self,
            _history: &[Message],
            prompt: &str,
            sink: &mut (dyn FnMut(AgentStreamEvent) + Send),
        ) -> Result<String, AgentError> {
            sink(AgentStreamEvent::Token("hel".to_string()));
            sink(AgentStreamEvent::Token("lo ".to_string()));
            sink(AgentStreamEvent::ToolCall {
                name: "lookup".to_string(),
                args: serde_json::json!({"q": prompt}),
                id: Some("call-1".to_string()),
            });
            sink(AgentStreamEvent::ToolOutput {
                tool_name: "lookup".to_string(),
                tool_call_id: Some("call-1".to_string()),
                content: "42".to_string(),
            });
            sink(AgentStreamEvent::Token("world".to_string()));
            Ok("hello world".to_string())
        }
    }

    struct FailingAgent;

    #[async_trait]
    impl Agent for FailingAgent {
        async fn query(&self, _prompt: &str) -> Result<AgentResponse, AgentError> {
            unimplemented!()
        }
        async fn stream(
            &self,
            _history: &[Message],
            _prompt: &str,
            _sink: &mut (dyn FnMut(AgentStreamEvent) + Send),
        ) -> Result<String, AgentError> {
            Err(AgentError::Failed("upstream timeout".to_string()))
        }
    }

    struct Factory<F: Fn() -> Arc<dyn Agent> + Send + Sync>(F);
    impl<F: Fn() -> Arc<dyn Agent> + Send + Sync> AgentFactory for Factory<F> {
        fn build(&self, _model: &str) -> Arc<dyn Agent> {
            (self.0)()
        }
    }

    struct RecordingSink(Vec<RelayEvent>);
    #[async_trait]
    impl ChatSink for RecordingSink {
        async fn send(&mut self, event: RelayEvent) -> Result<(), String> {
            self.0.push(event);
            Ok(())
        }
    }

    fn relay(agent: Arc<dyn Agent>) -> ChatRelay {
        let factory: Arc<dyn AgentFactory> = Arc::new(Factory(move || agent.clone()));
        ChatRelay::new(factory, Arc::new(NoopDiscovery))
    }

    #[tokio::test]
    async fn send_message_emits_events_in_order_and_appends_final_message() {
        let relay = relay(Arc::new(StreamingAgent));
        let conversation = relay.create_conversation("a1".to_string(), "m1".to_string(), None);
        let mut sink = RecordingSink(Vec::new());

        relay
            .send_message(&conversation.id, "hi".to_string(), &mut sink)
            .await
            .unwrap();

        assert!(matches!(sink.0[0], RelayEvent::Message { .. }));
        assert!(matches!(sink.0.last(), Some(RelayEvent::MessageEnd)));
        assert!(sink.0.iter().any(|e| matches!(e, RelayEvent::ToolCall { .. })));
        assert!(sink.0.iter().any(|e| matches!(e, RelayEvent::ToolOutput { .. })));

        let stored = relay.get_conversation(&conversation.id).await.unwrap();
        assert_eq!(stored.messages.len(), 2);
        assert_eq!(stored.messages[1].content(), "hello world");
    }

    #[tokio::test]
    async fn agent_failure_emits_error_event_not_a_relay_error() {
        let relay = relay(Arc::new(FailingAgent));
        let conversation = relay.create_conversation("a1".to_string(), "m1".to_string(), None);
        let mut sink = RecordingSink(Vec::new());

        relay
            .send_message(&conversation.id, "hi".to_string(), &mut sink)
            .await
            .unwrap();

        assert!(matches!(sink.0.last(), Some(RelayEvent::Error { .. })));
    }

    struct SlowAgent;

    #[async_trait]
    impl Agent for SlowAgent {
        async fn query(&self, _prompt: &str) -> Result<AgentResponse, AgentError> {
            unimplemented!()
        }
        async fn stream(
            &self,
            _history: &[Message],
            _prompt: &str,
            sink: &mut (dyn FnMut(AgentStreamEvent) + Send),
        ) -> Result<String, AgentError> {
            sink(AgentStreamEvent::Token("slow".to_string()));
            tokio::time::sleep(std::time::Duration::from_millis(100)).await;
            Ok("slow".to_string())
        }
    }

    #[tokio::test]
    async fn concurrent_send_message_for_same_conversation_is_rejected() {
        let relay = Arc::new(relay(Arc::new(SlowAgent)));
        let conversation = relay.create_conversation("a1".to_string(), "m1".to_string(), None);
        let id = conversation.id.clone();

        let relay_bg = relay.clone();
        let id_bg = id.clone();
        let first = tokio::spawn(async move {
            let mut sink = RecordingSink(Vec::new());
            relay_bg.send_message(&id_bg, "first".to_string(), &mut sink).await
        });

        tokio::time::sleep(std::time::Duration::from_millis(20)).await;

        let mut sink = RecordingSink(Vec::new());
        let err = relay.send_message(&id, "second".to_string(), &mut sink).await.unwrap_err();
        assert!(matches!(err, ChatError::ConcurrentSend(_)));

        first.await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn clear_conversation_drops_messages_but_keeps_id() {
        let relay = relay(Arc::new(StreamingAgent));
        let conversation = relay.create_conversation("a1".to_string(), "m1".to_string(), None);
        let mut sink = RecordingSink(Vec::new());
        relay
            .send_message(&conversation.id, "hi".to_string(), &mut sink)
            .await
            .unwrap();

        relay.clear_conversation(&conversation.id).await.unwrap();
        let stored = relay.get_conversation(&conversation.id).await.unwrap();
        assert_eq!(stored.id, conversation.id);
        assert!(stored.messages.is_empty());
    }

    #[tokio::test]
    async fn delete_conversation_removes_it() {
        let relay = relay(Arc::new(StreamingAgent));
        let conversation = relay.create_conversation("a1".to_string(), "m1".to_string(), None);
        relay.delete_conversation(&conversation.id).unwrap();
        assert!(matches!(
            relay.get_conversation(&conversation.id).await,
            Err(ChatError::ConversationNotFound(_))
        ));
    }
}
