//! `orc-core`: the test-orchestration engine for LLM agents.
//!
//! Discovery (`discovery`) enumerates declared tests; the pipeline
//! (`pipeline`) runs one to a [`domain::TestResult`]; the dispatcher
//! (`dispatcher`) schedules a job's worth of tests across a worker pool,
//! persisting to the history store (`history`) and publishing to the event
//! bus (`event_bus`). The tool invoker (`tools`) and chat relay (`chat`) are
//! independent surfaces over the same collaborator traits
//! (`collaborators`). None of this crate depends on a transport; `server`
//! wires it to HTTP and WebSocket.

pub mod chat;
pub mod collaborators;
pub mod discovery;
pub mod dispatcher;
pub mod domain;
pub mod error;
pub mod event_bus;
pub mod history;
pub mod message;
pub mod pipeline;
pub mod tools;

pub use collaborators::{Agent, AgentStreamEvent, Validator};
pub use dispatcher::Dispatcher;
pub use domain::{
    AgentResponse, CaseSpec, Conversation, ErrorType, Job, JobStatus, TestDescriptor, TestResult,
    TestStatus, ValidationVerdict,
};
pub use event_bus::{BusEvent, EventBus, EventBusSubscription};
pub use history::{HistoryStore, SqliteHistoryStore};
pub use message::Message;
pub use pipeline::run_pipeline;
