//! Wires `orc-config` settings into a runnable `server::AppState` and starts
//! the HTTP/WS server (§0 "orc serve"), mirroring the framework's
//! `serve::run_serve` entry point but assembling the full collaborator set
//! instead of a single fixed WebSocket route.

use std::error::Error;
use std::sync::Arc;

use orc_config::OrcConfig;
use orc_core::chat::ChatRelay;
use orc_core::discovery::{CachedDiscovery, FsDiscovery};
use orc_core::history::SqliteHistoryStore;
use orc_core::tools::ToolBackend;
use orc_core::{Dispatcher, EventBus};
use server::{AgentCatalogEntry, AppState};

use crate::process::{ProcessAgent, ProcessAgentFactory, ProcessValidator};

/// Command run when no agent/validator collaborator is configured. Fails
/// immediately rather than hanging, so a misconfigured `orc serve` shows up
/// at the first test run instead of at startup.
const NO_COLLABORATOR_COMMAND: &str = "false";

pub async fn run(config: OrcConfig) -> Result<(), Box<dyn Error + Send + Sync>> {
    let discovery = Arc::new(CachedDiscovery::new(FsDiscovery::new(config.discovery_root.clone())));
    let history = Arc::new(SqliteHistoryStore::new(&config.history_db_path)?);
    let event_bus = Arc::new(EventBus::new(config.event_queue_capacity));

    let agent_command = std::env::var("ORC_AGENT_CMD").unwrap_or_else(|_| NO_COLLABORATOR_COMMAND.to_string());
    let validator_command =
        std::env::var("ORC_VALIDATOR_CMD").unwrap_or_else(|_| NO_COLLABORATOR_COMMAND.to_string());

    let agent: Arc<dyn orc_core::Agent> = Arc::new(ProcessAgent::new(agent_command.clone()));
    let validator: Arc<dyn orc_core::Validator> = Arc::new(ProcessValidator::new(validator_command));

    let dispatcher = Dispatcher::spawn(
        discovery.clone(),
        agent,
        validator,
        history.clone(),
        event_bus.clone(),
        config.worker_count,
        config.task_queue_capacity,
    );

    let tools = match std::env::var("ORC_TOOLS_MANIFEST") {
        Ok(path) => crate::tools_manifest::load(std::path::Path::new(&path))?,
        Err(_) => Vec::new(),
    };
    let tools = Arc::new(ToolBackend::new(tools, discovery.clone()));

    let agent_factory = Arc::new(ProcessAgentFactory::new(agent_command));
    let chat = Arc::new(ChatRelay::new(agent_factory, discovery.clone()));

    let agents = vec![AgentCatalogEntry {
        id: "default".to_string(),
        name: "default".to_string(),
        models: vec!["default".to_string()],
    }];

    let state = Arc::new(AppState {
        discovery,
        dispatcher,
        history,
        event_bus,
        tools,
        chat,
        agents,
    });

    server::serve(&config.listen_addr, state).await?;
    Ok(())
}
