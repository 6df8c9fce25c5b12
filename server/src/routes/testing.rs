//! Testing routes (§6 "Testing"): discovery, runs, history.

use std::sync::Arc;

use axum::extract::ws::{Message as WsMessage, WebSocket, WebSocketUpgrade};
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::Response;
use axum::Json;
use orc_core::{BusEvent, Job, TestDescriptor, TestResult};
use serde::{Deserialize, Serialize};

use crate::app::AppState;
use crate::error::ApiError;

#[derive(Serialize)]
struct DiscoveryResponse {
    tests: Vec<TestDescriptor>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

pub async fn list_tests(State(state): State<Arc<AppState>>) -> Json<DiscoveryResponse> {
    let result = state.discovery.list_tests().await;
    Json(DiscoveryResponse {
        tests: result.tests,
        error: result.error,
    })
}

pub async fn list_runs(State(state): State<Arc<AppState>>) -> Json<Vec<Job>> {
    Json(state.dispatcher.list_jobs().await)
}

pub async fn get_run(State(state): State<Arc<AppState>>, Path(id): Path<String>) -> Result<Json<Job>, ApiError> {
    Ok(Json(state.dispatcher.get_job(&id).await?))
}

#[derive(Deserialize, Default)]
pub struct CreateRunBody {
    #[serde(default)]
    tests: Option<Vec<String>>,
}

pub async fn create_run(State(state): State<Arc<AppState>>, body: Option<Json<CreateRunBody>>) -> Json<Job> {
    let tests = body.and_then(|Json(b)| b.tests);
    Json(state.dispatcher.create_job(tests).await)
}

pub async fn list_history(
    State(state): State<Arc<AppState>>,
) -> Result<Json<std::collections::HashMap<String, TestResult>>, ApiError> {
    Ok(Json(state.history.list_all().await?))
}

pub async fn list_history_for(
    State(state): State<Arc<AppState>>,
    Path(qualified_name): Path<String>,
) -> Result<Json<Vec<TestResult>>, ApiError> {
    Ok(Json(state.history.list(&qualified_name).await?))
}

pub async fn truncate_all_history(State(state): State<Arc<AppState>>) -> Result<StatusCode, ApiError> {
    state.history.truncate_all().await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn truncate_history_for(
    State(state): State<Arc<AppState>>,
    Path(qualified_name): Path<String>,
) -> Result<StatusCode, ApiError> {
    state.history.truncate(&qualified_name).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn delete_history_at(
    State(state): State<Arc<AppState>>,
    Path((qualified_name, index)): Path<(String, usize)>,
) -> Result<StatusCode, ApiError> {
    state.history.delete_at(&qualified_name, index).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// `WS /testing/ws/runs` (§6): sends a snapshot on connect, then one `job`
/// message per state change. Client-to-server messages are ignored.
pub async fn ws_runs(ws: WebSocketUpgrade, State(state): State<Arc<AppState>>) -> Response {
    ws.on_upgrade(move |socket| stream_runs(socket, state))
}

async fn stream_runs(mut socket: WebSocket, state: Arc<AppState>) {
    let mut subscription = state.dispatcher.subscribe().await;
    loop {
        tokio::select! {
            event = subscription.next() => {
                let Some(event) = event else { break };
                let payload = match event {
                    BusEvent::Snapshot(jobs) => serde_json::json!({"type": "snapshot", "jobs": jobs}),
                    BusEvent::JobDelta(job) => serde_json::json!({"type": "job", "job": job}),
                };
                let text = payload.to_string();
                if socket.send(WsMessage::Text(text)).await.is_err() {
                    break;
                }
            }
            incoming = socket.recv() => {
                // Client-to-server messages are ignored (§6); only a closed
                // socket or transport error ends the stream.
                if incoming.is_none() {
                    break;
                }
                if let Some(Err(_)) = incoming {
                    break;
                }
            }
        }
    }
}
