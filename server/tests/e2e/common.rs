//! Shared fakes and app-spawning helper for e2e tests, mirroring
//! `examples/hi-youichi-loom/serve/tests/e2e/common.rs`'s "bind a random
//! port, spawn the server, return its URL" shape — generalized to the HTTP +
//! WS surface of `orc`'s §6 instead of one fixed WebSocket route.

use std::sync::Arc;

use async_trait::async_trait;
use orc_core::chat::{AgentFactory, ChatRelay};
use orc_core::discovery::{Discovery, DiscoveryResult};
use orc_core::error::{AgentError, DiscoveryError, ValidatorError};
use orc_core::tools::ToolBackend;
use orc_core::{
    Agent, AgentResponse, AgentStreamEvent, CaseSpec, Dispatcher, EventBus, Message,
    TestDescriptor, ValidationVerdict, Validator,
};
use server::{AgentCatalogEntry, AppState};
use tokio::net::TcpListener;

/// Discovery with one fixed test: `m::ping`, case `prompt="ping"`,
/// `expectations=["agent replies with pong"]` (spec §8 scenario 1).
pub struct PingDiscovery;

#[async_trait]
impl Discovery for PingDiscovery {
    async fn list_tests(&self) -> DiscoveryResult {
        DiscoveryResult {
            tests: vec![TestDescriptor::new("m", "ping")],
            error: None,
        }
    }

    async fn reload(&self) {}

    async fn load_case(&self, _descriptor: &TestDescriptor) -> Result<Vec<CaseSpec>, DiscoveryError> {
        Ok(vec![CaseSpec {
            prompt: "ping".to_string(),
            expectations: vec!["agent replies with pong".to_string()],
            expected_tool_calls: vec![],
        }])
    }
}

/// Agent that always answers "pong" and, when streamed, emits one token.
pub struct PongAgent;

#[async_trait]
impl Agent for PongAgent {
    async fn query(&self, _prompt: &str) -> Result<AgentResponse, AgentError> {
        Ok(AgentResponse {
            messages: vec![Message::assistant("pong")],
        })
    }

    async fn stream(
        &self,
        _history: &[Message],
        prompt: &str,
        sink: &mut (dyn FnMut(AgentStreamEvent) + Send),
    ) -> Result<String, AgentError> {
        let reply = format!("echo: {prompt}");
        sink(AgentStreamEvent::Token(reply.clone()));
        Ok(reply)
    }
}

/// Validator that always reports success.
pub struct AlwaysPassValidator;

#[async_trait]
impl Validator for AlwaysPassValidator {
    async fn judge(
        &self,
        _response: &AgentResponse,
        _expectations: &[String],
    ) -> Result<ValidationVerdict, ValidatorError> {
        Ok(ValidationVerdict {
            success: true,
            reasoning: String::new(),
            unmet: vec![],
            failure_reasons: Default::default(),
        })
    }
}

struct FixedAgentFactory;

impl AgentFactory for FixedAgentFactory {
    fn build(&self, _model: &str) -> Arc<dyn Agent> {
        Arc::new(PongAgent)
    }
}

/// Spawns a full `orc` server backed by the fakes above, on a random port.
/// Returns its base HTTP URL; the server runs for the lifetime of the test
/// process (tests don't need to tear it down individually).
pub async fn spawn_app() -> String {
    let discovery: Arc<dyn Discovery> = Arc::new(PingDiscovery);
    let agent: Arc<dyn Agent> = Arc::new(PongAgent);
    let validator: Arc<dyn Validator> = Arc::new(AlwaysPassValidator);

    let history_file = tempfile::NamedTempFile::new().unwrap();
    let history = Arc::new(orc_core::SqliteHistoryStore::new(history_file.path()).unwrap());
    std::mem::forget(history_file); // keep the backing file alive for the test run

    let event_bus = Arc::new(EventBus::new(64));
    let dispatcher = Dispatcher::spawn(
        discovery.clone(),
        agent,
        validator,
        history.clone(),
        event_bus.clone(),
        2,
        16,
    );

    let tools = Arc::new(ToolBackend::new(vec![], discovery.clone()));
    let chat = Arc::new(ChatRelay::new(Arc::new(FixedAgentFactory), discovery.clone()));
    let agents = vec![AgentCatalogEntry {
        id: "default".to_string(),
        name: "default agent".to_string(),
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

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(server::serve_on_listener(listener, state));

    format!("http://{addr}")
}

pub fn ws_url(base_url: &str, path: &str) -> String {
    format!("ws{}{path}", base_url.strip_prefix("http").unwrap())
}
