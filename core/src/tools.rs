//! Tool Invoker (§4.F): introspects and executes the agent-visible tool set.
//!
//! Grounded in `loom::tools::Tool` (`tools/trait.rs`): a `name()`/`spec()`/
//! `async call(args)` trait object registered by name. `ToolSpec`'s JSON
//! Schema `input_schema` is reused as-is rather than inventing a parallel
//! schema language, the way `loom::tool_source::yaml_specs` reuses JSON
//! Schema for YAML-declared tool specs.

use std::collections::HashMap;
use std::str::FromStr;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::discovery::Discovery;
use crate::error::{CoerceError, ToolInvokeError};

/// JSON-Schema-shaped description of one tool, mirroring the framework's
/// `ToolSpec` (`name`, `description`, `input_schema`).
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct ToolSpec {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub input_schema: Value,
}

/// One agent-visible tool. Implementors supply name, schema, and the call.
#[async_trait]
pub trait Tool: Send + Sync {
    fn name(&self) -> &str;
    fn spec(&self) -> ToolSpec;
    async fn call(&self, args: Value) -> Result<Value, String>;
}

/// `{name, typeName, description, required, default?}` derived from a tool's
/// `input_schema` (§4.F "listTools"/"schema").
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct ParameterSchema {
    pub name: String,
    pub type_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub required: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default: Option<Value>,
}

/// `{name, description, parameters}` — the fully-resolved schema for one tool.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct ToolDescription {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub parameters: Vec<ParameterSchema>,
}

/// Summary row for `listTools()` (§4.F).
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct ToolSummary {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub parameter_count: usize,
}

/// Outcome of `invoke()`: either the tool's result or a textual error,
/// never both (§4.F "Execution").
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct InvokeOutcome {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// A registry of tools plus the discovery handle that backs reload (§4.F).
pub struct ToolBackend {
    tools: HashMap<String, Box<dyn Tool>>,
    discovery: Arc<dyn Discovery>,
}

impl ToolBackend {
    pub fn new(tools: Vec<Box<dyn Tool>>, discovery: Arc<dyn Discovery>) -> Self {
        let tools = tools.into_iter().map(|t| (t.name().to_string(), t)).collect();
        Self { tools, discovery }
    }

    pub fn list_tools(&self) -> Vec<ToolSummary> {
        let mut out: Vec<ToolSummary> = self
            .tools
            .values()
            .map(|t| {
                let spec = t.spec();
                ToolSummary {
                    name: spec.name,
                    description: spec.description,
                    parameter_count: parameters_of(&spec.input_schema).len(),
                }
            })
            .collect();
        out.sort_by(|a, b| a.name.cmp(&b.name));
        out
    }

    pub fn schema(&self, name: &str) -> Result<ToolDescription, ToolInvokeError> {
        let tool = self
            .tools
            .get(name)
            .ok_or_else(|| ToolInvokeError::UnknownTool(name.to_string()))?;
        let spec = tool.spec();
        Ok(ToolDescription {
            name: spec.name,
            description: spec.description,
            parameters: parameters_of(&spec.input_schema),
        })
    }

    /// Coerces `args` (raw strings from a form-like caller) against the
    /// tool's schema, then calls it. Coercion failure short-circuits without
    /// invoking the tool (§4.F "Type handling").
    pub async fn invoke(&self, name: &str, args: HashMap<String, String>) -> InvokeOutcome {
        let tool = match self.tools.get(name) {
            Some(t) => t,
            None => {
                return InvokeOutcome {
                    success: false,
                    result: None,
                    error: Some(ToolInvokeError::UnknownTool(name.to_string()).to_string()),
                }
            }
        };

        let parameters = parameters_of(&tool.spec().input_schema);
        let mut coerced = serde_json::Map::new();
        for param in &parameters {
            let Some(raw) = args.get(&param.name) else {
                continue;
            };
            match coerce(raw, &param.type_name) {
                Ok(value) => {
                    coerced.insert(param.name.clone(), value);
                }
                Err(e) => {
                    return InvokeOutcome {
                        success: false,
                        result: None,
                        error: Some(e.to_string()),
                    }
                }
            }
        }

        match tool.call(Value::Object(coerced)).await {
            Ok(result) => InvokeOutcome {
                success: true,
                result: Some(result),
                error: None,
            },
            Err(message) => InvokeOutcome {
                success: false,
                result: None,
                error: Some(message),
            },
        }
    }

    /// Invalidates cached tool-bearing source through the same seam §4.A
    /// uses for test discovery.
    pub async fn reload_tools(&self) {
        self.discovery.reload().await;
    }
}

/// Reads `{name, typeName, required, default}` per property out of a JSON
/// Schema `input_schema` object (`properties`/`required` keys).
fn parameters_of(schema: &Value) -> Vec<ParameterSchema> {
    let Some(properties) = schema.get("properties").and_then(Value::as_object) else {
        return Vec::new();
    };
    let required: Vec<&str> = schema
        .get("required")
        .and_then(Value::as_array)
        .map(|a| a.iter().filter_map(Value::as_str).collect())
        .unwrap_or_default();

    let mut out: Vec<ParameterSchema> = properties
        .iter()
        .map(|(name, prop)| ParameterSchema {
            name: name.clone(),
            type_name: prop
                .get("type")
                .and_then(Value::as_str)
                .unwrap_or("string")
                .to_string(),
            description: prop
                .get("description")
                .and_then(Value::as_str)
                .map(String::from),
            required: required.contains(&name.as_str()),
            default: prop.get("default").cloned(),
        })
        .collect();
    out.sort_by(|a, b| a.name.cmp(&b.name));
    out
}

/// Coerces a raw string value to the JSON representation of `type_name`
/// (§4.F "Type handling").
pub fn coerce(value: &str, type_name: &str) -> Result<Value, CoerceError> {
    let invalid = |message: String| CoerceError::Invalid {
        value: value.to_string(),
        type_name: type_name.to_string(),
        message,
    };

    match type_name {
        "integer" => i64::from_str(value)
            .map(Value::from)
            .map_err(|e| invalid(e.to_string())),
        "number" => f64::from_str(value)
            .map(Value::from)
            .map_err(|e| invalid(e.to_string())),
        "boolean" => match value {
            "true" => Ok(Value::Bool(true)),
            "false" => Ok(Value::Bool(false)),
            other => Err(invalid(format!("{other:?} is not \"true\" or \"false\""))),
        },
        "array" | "object" => {
            serde_json::from_str(value).map_err(|e| invalid(e.to_string()))
        }
        _ => Ok(Value::String(value.to_string())),
    }
}
