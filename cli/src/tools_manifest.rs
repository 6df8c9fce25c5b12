//! Loads a JSON manifest of process-backed tools for the Tool Invoker
//! (§4.F). Each entry pairs a `ToolSpec` with a shell command that receives
//! the coerced call arguments as a JSON object on stdin and must print one
//! JSON value to stdout.

use std::path::Path;
use std::process::Stdio;

use async_trait::async_trait;
use orc_core::tools::{Tool, ToolSpec};
use serde::Deserialize;
use serde_json::Value;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::process::Command;

#[derive(Deserialize)]
struct ManifestEntry {
    name: String,
    #[serde(default)]
    description: Option<String>,
    input_schema: Value,
    command: String,
}

struct ProcessTool {
    spec: ToolSpec,
    command: String,
}

#[async_trait]
impl Tool for ProcessTool {
    fn name(&self) -> &str {
        &self.spec.name
    }

    fn spec(&self) -> ToolSpec {
        self.spec.clone()
    }

    async fn call(&self, args: Value) -> Result<Value, String> {
        let mut child = Command::new("sh")
            .arg("-c")
            .arg(&self.command)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .spawn()
            .map_err(|e| e.to_string())?;

        let mut stdin = child.stdin.take().expect("piped stdin");
        let payload = serde_json::to_vec(&args).map_err(|e| e.to_string())?;
        stdin.write_all(&payload).await.map_err(|e| e.to_string())?;
        stdin.write_all(b"\n").await.map_err(|e| e.to_string())?;
        drop(stdin);

        let stdout = child.stdout.take().expect("piped stdout");
        let line = BufReader::new(stdout)
            .lines()
            .next_line()
            .await
            .map_err(|e| e.to_string())?;
        let status = child.wait().await.map_err(|e| e.to_string())?;
        if !status.success() {
            return Err(format!("tool process exited with {status}"));
        }
        let line = line.ok_or_else(|| "tool produced no output".to_string())?;
        serde_json::from_str(&line).map_err(|e| e.to_string())
    }
}

/// Parses a manifest file into the `Tool` set a `ToolBackend` registers.
pub fn load(path: &Path) -> Result<Vec<Box<dyn Tool>>, String> {
    let contents = std::fs::read_to_string(path).map_err(|e| format!("{}: {e}", path.display()))?;
    let entries: Vec<ManifestEntry> = serde_json::from_str(&contents).map_err(|e| e.to_string())?;
    Ok(entries
        .into_iter()
        .map(|entry| {
            Box::new(ProcessTool {
                spec: ToolSpec {
                    name: entry.name,
                    description: entry.description,
                    input_schema: entry.input_schema,
                },
                command: entry.command,
            }) as Box<dyn Tool>
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn load_parses_entries_into_tools() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tools.json");
        std::fs::write(
            &path,
            serde_json::json!([
                {
                    "name": "echo",
                    "description": "echoes input",
                    "input_schema": {"type": "object", "properties": {}},
                    "command": "cat"
                }
            ])
            .to_string(),
        )
        .unwrap();

        let tools = load(&path).unwrap();
        assert_eq!(tools.len(), 1);
        assert_eq!(tools[0].name(), "echo");
    }

    #[test]
    fn load_missing_file_is_an_error() {
        assert!(load(Path::new("/nonexistent/tools.json")).is_err());
    }
}
