//! Out-of-process `Agent`/`Validator` collaborators (§9 "Hot reload without a
//! package manager" names an out-of-process helper as a legitimate plugin
//! shape; this is that shape applied to the agent and validator seams too).
//!
//! Each call shells out to a user-configured command, writing one JSON
//! request line to its stdin and reading JSON back from its stdout. This
//! keeps `orc serve` runnable standalone without linking any particular LLM
//! SDK into the engine.

use std::process::Stdio;
use std::sync::Arc;

use async_trait::async_trait;
use orc_core::{Agent, AgentResponse, AgentStreamEvent, Message, Validator, ValidationVerdict};
use orc_core::error::{AgentError, ValidatorError};
use serde::{Deserialize, Serialize};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::process::{Child, Command};

async fn spawn(command: &str, request: &impl Serialize) -> Result<Child, String> {
    let mut child = Command::new("sh")
        .arg("-c")
        .arg(command)
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::null())
        .spawn()
        .map_err(|e| format!("spawning {command:?}: {e}"))?;

    let payload = serde_json::to_vec(request).map_err(|e| e.to_string())?;
    let mut stdin = child.stdin.take().expect("piped stdin");
    stdin.write_all(&payload).await.map_err(|e| e.to_string())?;
    stdin.write_all(b"\n").await.map_err(|e| e.to_string())?;
    drop(stdin);

    Ok(child)
}

/// Reads one line from the child's stdout, then waits for it to exit.
async fn read_one_line(mut child: Child) -> Result<String, String> {
    let stdout = child.stdout.take().expect("piped stdout");
    let line = BufReader::new(stdout)
        .lines()
        .next_line()
        .await
        .map_err(|e| e.to_string())?;
    let status = child.wait().await.map_err(|e| e.to_string())?;
    if !status.success() {
        return Err(format!("process exited with {status}"));
    }
    line.ok_or_else(|| "process produced no output".to_string())
}

/// `Agent` realized as a shell command. `query`/`stream` each invoke the
/// command fresh, matching the one-shot, no-persistent-connection shape
/// simplest to keep correct under the §4.C/§4.G concurrency model.
pub struct ProcessAgent {
    command: String,
}

impl ProcessAgent {
    pub fn new(command: impl Into<String>) -> Self {
        Self { command: command.into() }
    }
}

#[derive(Serialize)]
struct QueryRequest<'a> {
    mode: &'static str,
    prompt: &'a str,
}

#[derive(Serialize)]
struct StreamRequest<'a> {
    mode: &'static str,
    prompt: &'a str,
    history: &'a [Message],
}

#[derive(Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum StreamLine {
    Token {
        content: String,
    },
    ToolCall {
        name: String,
        args: serde_json::Value,
        #[serde(default)]
        id: Option<String>,
    },
    ToolOutput {
        tool_name: String,
        #[serde(default)]
        tool_call_id: Option<String>,
        content: String,
    },
}

#[async_trait]
impl Agent for ProcessAgent {
    async fn query(&self, prompt: &str) -> Result<AgentResponse, AgentError> {
        let request = QueryRequest { mode: "query", prompt };
        let child = spawn(&self.command, &request).await.map_err(AgentError::Failed)?;
        let line = read_one_line(child).await.map_err(AgentError::Failed)?;
        serde_json::from_str(&line).map_err(|e| AgentError::Failed(e.to_string()))
    }

    async fn stream(
        &self,
        history: &[Message],
        prompt: &str,
        sink: &mut (dyn FnMut(AgentStreamEvent) + Send),
    ) -> Result<String, AgentError> {
        let request = StreamRequest { mode: "stream", prompt, history };
        let mut child = spawn(&self.command, &request).await.map_err(AgentError::Failed)?;
        let stdout = child.stdout.take().expect("piped stdout");
        let mut lines = BufReader::new(stdout).lines();

        let mut full_text = String::new();
        loop {
            let next = lines.next_line().await.map_err(|e| AgentError::Failed(e.to_string()))?;
            let Some(line) = next else { break };
            if line.trim().is_empty() {
                continue;
            }
            let parsed: StreamLine =
                serde_json::from_str(&line).map_err(|e| AgentError::Failed(format!("{e}: {line}")))?;
            match parsed {
                StreamLine::Token { content } => {
                    full_text.push_str(&content);
                    sink(AgentStreamEvent::Token(content));
                }
                StreamLine::ToolCall { name, args, id } => sink(AgentStreamEvent::ToolCall { name, args, id }),
                StreamLine::ToolOutput { tool_name, tool_call_id, content } => {
                    sink(AgentStreamEvent::ToolOutput { tool_name, tool_call_id, content })
                }
            }
        }

        let status = child.wait().await.map_err(|e| AgentError::Failed(e.to_string()))?;
        if !status.success() {
            return Err(AgentError::Failed(format!("process exited with {status}")));
        }
        Ok(full_text)
    }
}

/// `Validator` realized as a shell command, judging one `(response,
/// expectations)` pair per call.
pub struct ProcessValidator {
    command: String,
}

impl ProcessValidator {
    pub fn new(command: impl Into<String>) -> Self {
        Self { command: command.into() }
    }
}

#[derive(Serialize)]
struct JudgeRequest<'a> {
    response: &'a AgentResponse,
    expectations: &'a [String],
}

#[async_trait]
impl Validator for ProcessValidator {
    async fn judge(
        &self,
        response: &AgentResponse,
        expectations: &[String],
    ) -> Result<ValidationVerdict, ValidatorError> {
        let request = JudgeRequest { response, expectations };
        let child = spawn(&self.command, &request).await.map_err(ValidatorError::Failed)?;
        let line = read_one_line(child).await.map_err(ValidatorError::Failed)?;
        serde_json::from_str(&line).map_err(|e| ValidatorError::Failed(e.to_string()))
    }
}

/// Builds a fresh [`ProcessAgent`] per model, passing it through as `--model`
/// on the configured base command (§4.G step 2).
pub struct ProcessAgentFactory {
    base_command: String,
}

impl ProcessAgentFactory {
    pub fn new(base_command: impl Into<String>) -> Self {
        Self { base_command: base_command.into() }
    }
}

impl orc_core::chat::AgentFactory for ProcessAgentFactory {
    fn build(&self, model: &str) -> Arc<dyn Agent> {
        Arc::new(ProcessAgent::new(format!("{} --model {}", self.base_command, shell_escape(model))))
    }
}

/// Wraps `value` in single quotes, escaping any embedded ones, so a
/// caller-supplied model name cannot break out of the `sh -c` command line.
fn shell_escape(value: &str) -> String {
    format!("'{}'", value.replace('\'', "'\\''"))
}
