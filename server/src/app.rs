//! Axum app: shared state and router assembly.
//!
//! Grounded in `serve::app`'s `AppState`/`router()` shape, generalized from
//! one WebSocket route to the full HTTP + WS surface of §6.

use std::sync::Arc;

use axum::routing::{delete, get, post};
use axum::Router;
use orc_core::chat::ChatRelay;
use orc_core::discovery::Discovery;
use orc_core::history::HistoryStore;
use orc_core::tools::ToolBackend;
use orc_core::{Dispatcher, EventBus};
use tower_http::trace::TraceLayer;

use crate::routes::{chatting, health, testing, tooling};

/// One agent the chat relay can target, for `GET /chatting/agents` (§6).
#[derive(Clone, Debug, serde::Serialize)]
pub struct AgentCatalogEntry {
    pub id: String,
    pub name: String,
    pub models: Vec<String>,
}

/// Shared state reachable from every handler.
pub struct AppState {
    pub discovery: Arc<dyn Discovery>,
    pub dispatcher: Dispatcher,
    pub history: Arc<dyn HistoryStore>,
    pub event_bus: Arc<EventBus>,
    pub tools: Arc<ToolBackend>,
    pub chat: Arc<ChatRelay>,
    pub agents: Vec<AgentCatalogEntry>,
}

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(health::health))
        .route("/testing/tests", get(testing::list_tests))
        .route("/testing/runs", get(testing::list_runs).post(testing::create_run))
        .route("/testing/runs/:id", get(testing::get_run))
        .route("/testing/history", get(testing::list_history).delete(testing::truncate_all_history))
        .route(
            "/testing/history/:qualified_name",
            get(testing::list_history_for).delete(testing::truncate_history_for),
        )
        .route(
            "/testing/history/:qualified_name/:index",
            delete(testing::delete_history_at),
        )
        .route("/testing/ws/runs", get(testing::ws_runs))
        .route("/tooling/tools", get(tooling::list_tools))
        .route("/tooling/tools/:name", get(tooling::get_tool))
        .route("/tooling/tools/:name/invoke", post(tooling::invoke_tool))
        .route("/chatting/agents", get(chatting::list_agents))
        .route("/chatting/agents/:id", get(chatting::get_agent))
        .route(
            "/chatting/conversations",
            get(chatting::list_conversations).post(chatting::create_conversation),
        )
        .route(
            "/chatting/conversations/:id",
            get(chatting::get_conversation).delete(chatting::delete_conversation),
        )
        .route("/chatting/conversations/:id/clear", post(chatting::clear_conversation))
        .route("/chatting/ws/conversations/:id", get(chatting::ws_conversation))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
