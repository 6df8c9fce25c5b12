//! HTTP + WebSocket protocol surface for `orc` (§6): an axum [`Router`] over
//! `orc-core`'s collaborator-agnostic engine.
//!
//! Grounded in `serve::lib`'s `run_serve`/`run_serve_on_listener` split: a
//! thin `serve` wraps a `TcpListener` bind around [`axum::serve`], so a
//! caller that already has a bound listener (tests, or a supervisor that
//! wants the chosen port back) can skip straight to [`serve_on_listener`].

pub mod app;
pub mod error;
pub mod routes;

use std::sync::Arc;

use tokio::net::TcpListener;

pub use app::{router, AgentCatalogEntry, AppState};
pub use error::ApiError;

/// Binds `addr` and serves the §6 router until the process is interrupted.
pub async fn serve(addr: &str, state: Arc<AppState>) -> std::io::Result<()> {
    let listener = TcpListener::bind(addr).await?;
    tracing::info!(%addr, "orc server listening");
    serve_on_listener(listener, state).await
}

/// Serves the §6 router on an already-bound listener.
pub async fn serve_on_listener(listener: TcpListener, state: Arc<AppState>) -> std::io::Result<()> {
    axum::serve(listener, router(state)).await
}
