//! Per-component error taxonomy (§7). Each boundary gets its own `thiserror` enum;
//! nothing here is meant to cross the pipeline boundary (see [`crate::pipeline`]).

use thiserror::Error;

#[derive(Debug, Error, Clone)]
pub enum DiscoveryError {
    #[error("discovery root could not be scanned: {0}")]
    RootUnreadable(String),
    #[error("case file {file} failed to parse: {message}")]
    CaseParse { file: String, message: String },
}

#[derive(Debug, Error)]
pub enum HistoryError {
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("serialize result: {0}")]
    Serialize(#[from] serde_json::Error),
    #[error("blocking task join: {0}")]
    Join(#[from] tokio::task::JoinError),
    #[error("index {index} out of range for {qualified_name}")]
    IndexOutOfRange { qualified_name: String, index: usize },
}

#[derive(Debug, Error)]
pub enum AgentError {
    #[error("agent call failed: {0}")]
    Failed(String),
}

#[derive(Debug, Error)]
pub enum ValidatorError {
    #[error("validator call failed: {0}")]
    Failed(String),
}

#[derive(Debug, Error)]
pub enum DispatcherError {
    #[error("unknown test name(s): {0:?}")]
    UnknownTests(Vec<String>),
    #[error("job {0} not found")]
    JobNotFound(String),
    #[error("discovery unavailable: {0}")]
    DiscoveryUnavailable(String),
}

#[derive(Debug, Error)]
pub enum CoerceError {
    #[error("cannot coerce {value:?} to {type_name}: {message}")]
    Invalid {
        value: String,
        type_name: String,
        message: String,
    },
}

#[derive(Debug, Error)]
pub enum ToolInvokeError {
    #[error("unknown tool: {0}")]
    UnknownTool(String),
    #[error(transparent)]
    Coerce(#[from] CoerceError),
}

#[derive(Debug, Error)]
pub enum ChatError {
    #[error("conversation {0} not found")]
    ConversationNotFound(String),
    #[error("a send_message is already in flight for conversation {0}")]
    ConcurrentSend(String),
    #[error(transparent)]
    Agent(#[from] AgentError),
}
