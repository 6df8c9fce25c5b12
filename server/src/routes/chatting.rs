//! Chatting routes (§6 "Chatting"): agent catalog, conversations, and the
//! per-message WebSocket protocol.
//!
//! Grounded in `serve::app::ws_handler`'s upgrade shape, generalized from a
//! single fixed socket to one conversation per id; event framing is handed
//! off to [`protocol::to_json`] so the wire format matches whatever `protocol`
//! defines rather than being re-derived here.

use std::sync::Arc;

use async_trait::async_trait;
use axum::extract::ws::{Message as WsMessage, WebSocket, WebSocketUpgrade};
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::Response;
use axum::Json;
use futures::stream::SplitSink;
use futures::{SinkExt, StreamExt};
use orc_core::chat::{ChatSink, RelayEvent};
use orc_core::Conversation;
use protocol::{ChatEvent, EnvelopeState};
use serde::Deserialize;

use crate::app::{AgentCatalogEntry, AppState};
use crate::error::ApiError;

pub async fn list_agents(State(state): State<Arc<AppState>>) -> Json<Vec<AgentCatalogEntry>> {
    Json(state.agents.clone())
}

pub async fn get_agent(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<AgentCatalogEntry>, ApiError> {
    state
        .agents
        .iter()
        .find(|a| a.id == id)
        .cloned()
        .map(Json)
        .ok_or_else(|| ApiError::not_found(format!("agent {id} not found")))
}

#[derive(Deserialize)]
pub struct CreateConversationBody {
    agent_id: String,
    model: String,
    #[serde(default)]
    title: Option<String>,
}

pub async fn create_conversation(
    State(state): State<Arc<AppState>>,
    Json(body): Json<CreateConversationBody>,
) -> Result<Json<Conversation>, ApiError> {
    if !state.agents.iter().any(|a| a.id == body.agent_id) {
        return Err(ApiError::bad_request(format!("unknown agent: {}", body.agent_id)));
    }
    Ok(Json(state.chat.create_conversation(body.agent_id, body.model, body.title)))
}

pub async fn list_conversations(State(state): State<Arc<AppState>>) -> Json<Vec<Conversation>> {
    Json(state.chat.list_conversations().await)
}

pub async fn get_conversation(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<Conversation>, ApiError> {
    Ok(Json(state.chat.get_conversation(&id).await?))
}

pub async fn delete_conversation(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<StatusCode, ApiError> {
    state.chat.delete_conversation(&id)?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn clear_conversation(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<StatusCode, ApiError> {
    state.chat.clear_conversation(&id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// `WS /chatting/ws/conversations/{id}` (§6): one `{"type":"send_message","content":...}`
/// client message drives one run of the §4.G per-message protocol; the
/// relay's events stream back enveloped with a run id of the conversation id.
pub async fn ws_conversation(
    ws: WebSocketUpgrade,
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Response {
    ws.on_upgrade(move |socket| handle_conversation_socket(socket, state, id))
}

#[derive(Deserialize)]
struct IncomingMessage {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    content: String,
}

struct WsChatSink<'a> {
    write: &'a mut SplitSink<WebSocket, WsMessage>,
    envelope: EnvelopeState,
}

impl WsChatSink<'_> {
    async fn send_raw(&mut self, event: &ChatEvent) -> Result<(), String> {
        let value = protocol::to_json(event, &mut self.envelope).map_err(|e| e.to_string())?;
        self.write
            .send(WsMessage::Text(value.to_string()))
            .await
            .map_err(|e| e.to_string())
    }
}

#[async_trait]
impl ChatSink for WsChatSink<'_> {
    async fn send(&mut self, event: RelayEvent) -> Result<(), String> {
        let wire = to_chat_event(event);
        self.send_raw(&wire).await
    }
}

fn to_chat_event(event: RelayEvent) -> ChatEvent {
    use protocol::event::{ErrorData, MessageData, ToolCallData, ToolOutputData, TokenData};
    match event {
        RelayEvent::Message { role, content } => ChatEvent::Message {
            data: MessageData { role, content },
        },
        RelayEvent::Token { content } => ChatEvent::Token {
            data: TokenData { content },
        },
        RelayEvent::ToolCall { name, args, id } => ChatEvent::ToolCall {
            data: ToolCallData { name, args, id },
        },
        RelayEvent::ToolOutput {
            tool_name,
            tool_call_id,
            content,
        } => ChatEvent::ToolOutput {
            data: ToolOutputData {
                tool_name,
                tool_call_id,
                content,
            },
        },
        RelayEvent::MessageEnd => ChatEvent::MessageEnd,
        RelayEvent::Error { message } => ChatEvent::Error {
            data: ErrorData { message },
        },
    }
}

async fn handle_conversation_socket(socket: WebSocket, state: Arc<AppState>, id: String) {
    let (mut write, mut read) = socket.split();

    while let Some(Ok(msg)) = read.next().await {
        let WsMessage::Text(text) = msg else { continue };
        let Ok(incoming) = serde_json::from_str::<IncomingMessage>(&text) else {
            continue;
        };
        if incoming.kind != "send_message" {
            continue;
        }

        let mut sink = WsChatSink {
            write: &mut write,
            envelope: EnvelopeState::new(id.clone()),
        };

        if let Err(e) = state.chat.send_message(&id, incoming.content, &mut sink).await {
            let _ = sink.send_raw(&ChatEvent::Error { data: error_data(e.to_string()) }).await;
            break;
        }
    }
}

fn error_data(message: String) -> protocol::event::ErrorData {
    protocol::event::ErrorData { message }
}
