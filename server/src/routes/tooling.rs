//! Tooling routes (§6 "Tooling"): introspect and invoke the agent-visible tool set.

use std::collections::HashMap;
use std::sync::Arc;

use axum::extract::{Path, State};
use axum::Json;
use orc_core::tools::{InvokeOutcome, ToolDescription, ToolSummary};
use serde::Deserialize;

use crate::app::AppState;
use crate::error::ApiError;

pub async fn list_tools(State(state): State<Arc<AppState>>) -> Json<Vec<ToolSummary>> {
    Json(state.tools.list_tools())
}

pub async fn get_tool(
    State(state): State<Arc<AppState>>,
    Path(name): Path<String>,
) -> Result<Json<ToolDescription>, ApiError> {
    Ok(Json(state.tools.schema(&name)?))
}

#[derive(Deserialize, Default)]
pub struct InvokeToolBody {
    #[serde(default)]
    args: HashMap<String, String>,
}

/// Always `200 OK`: a failed invocation is reported in the outcome body, not
/// via the HTTP status (§4.F "Execution" — success and error share one shape).
pub async fn invoke_tool(
    State(state): State<Arc<AppState>>,
    Path(name): Path<String>,
    body: Option<Json<InvokeToolBody>>,
) -> Json<InvokeOutcome> {
    let args = body.map(|Json(b)| b.args).unwrap_or_default();
    Json(state.tools.invoke(&name, args).await)
}
