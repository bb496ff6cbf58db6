//! Tool System
//!
//! Tool definitions advertised to providers, the request/result types that
//! flow through an orchestration round, and the catalog that executes them.
//! Execution never fails from the caller's point of view: every error is
//! rendered into the result text so the model can read it.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};
use std::sync::Arc;

use crate::error::{Result, TutorError};

/// Tool call request emitted by a provider
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ToolCallRequest {
    /// Opaque correlation token
    pub id: String,

    /// Tool identifier
    pub name: String,

    /// Arguments, normally a JSON object. Undecodable vendor argument text is
    /// kept verbatim as a JSON string.
    #[serde(default)]
    pub arguments: Value,
}

impl ToolCallRequest {
    pub fn new(id: impl Into<String>, name: impl Into<String>, arguments: Value) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            arguments,
        }
    }

    /// Create a request for a provider that did not supply an ID
    pub fn with_generated_id(name: impl Into<String>, arguments: Value) -> Self {
        Self::new(Self::generate_id(), name, arguments)
    }

    /// A fresh `call_`-prefixed request ID
    pub fn generate_id() -> String {
        format!("call_{}", uuid::Uuid::new_v4().simple())
    }

    /// Arguments as an object; `null` counts as no arguments
    pub fn arguments_object(&self) -> Option<Map<String, Value>> {
        match &self.arguments {
            Value::Object(map) => Some(map.clone()),
            Value::Null => Some(Map::new()),
            _ => None,
        }
    }

    pub fn argument(&self, key: &str) -> Option<&Value> {
        self.arguments.get(key).filter(|v| !v.is_null())
    }

    pub fn str_argument(&self, key: &str) -> Option<&str> {
        self.argument(key).and_then(Value::as_str)
    }

    /// Integer argument, accepting numeric strings
    pub fn usize_argument(&self, key: &str) -> Option<usize> {
        match self.argument(key)? {
            Value::Number(n) => n.as_u64().and_then(|n| usize::try_from(n).ok()),
            Value::String(s) => s.trim().parse().ok(),
            _ => None,
        }
    }

    /// Boolean argument, accepting "true", "1", "yes" and "on"
    pub fn bool_argument(&self, key: &str) -> Option<bool> {
        match self.argument(key)? {
            Value::Bool(b) => Some(*b),
            Value::String(s) => Some(matches!(
                s.trim().to_lowercase().as_str(),
                "true" | "1" | "yes" | "on"
            )),
            Value::Number(n) => Some(n.as_i64() != Some(0)),
            _ => None,
        }
    }
}

/// Result from tool execution
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolCallResult {
    /// Matches the request ID
    pub tool_call_id: String,

    /// Tool that was called
    pub name: String,

    /// Whether execution succeeded
    pub success: bool,

    /// Output text (success output or error description)
    pub output: String,
}

impl ToolCallResult {
    pub fn success(call: &ToolCallRequest, output: impl Into<String>) -> Self {
        Self {
            tool_call_id: call.id.clone(),
            name: call.name.clone(),
            success: true,
            output: output.into(),
        }
    }

    pub fn failure(call: &ToolCallRequest, error: impl Into<String>) -> Self {
        Self {
            tool_call_id: call.id.clone(),
            name: call.name.clone(),
            success: false,
            output: error.into(),
        }
    }
}

/// Parameter definition for tool schema
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ParameterSchema {
    /// Parameter name
    pub name: String,

    /// JSON Schema type (string, integer, boolean, ...)
    #[serde(rename = "type")]
    pub param_type: String,

    /// Human-readable description
    pub description: String,

    /// Whether this parameter is required
    #[serde(default)]
    pub required: bool,

    /// Default value if not provided
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default: Option<Value>,
}

impl ParameterSchema {
    pub fn required(name: &str, param_type: &str, description: &str) -> Self {
        Self {
            name: name.into(),
            param_type: param_type.into(),
            description: description.into(),
            required: true,
            default: None,
        }
    }

    pub fn optional(name: &str, param_type: &str, description: &str, default: Option<Value>) -> Self {
        Self {
            name: name.into(),
            param_type: param_type.into(),
            description: description.into(),
            required: false,
            default,
        }
    }
}

/// Tool definition (for provider function calling)
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ToolDefinition {
    /// Unique tool identifier
    pub name: String,

    /// Human-readable description (shown to the model)
    pub description: String,

    /// Parameter definitions
    pub parameters: Vec<ParameterSchema>,
}

impl ToolDefinition {
    /// Render the parameters as a JSON Schema object
    pub fn json_schema(&self) -> Value {
        let mut properties = Map::new();
        let mut required = Vec::new();

        for param in &self.parameters {
            let mut property = json!({
                "type": param.param_type,
                "description": param.description,
            });
            if let Some(default) = &param.default {
                property["default"] = default.clone();
            }
            properties.insert(param.name.clone(), property);

            if param.required {
                required.push(Value::String(param.name.clone()));
            }
        }

        json!({
            "type": "object",
            "properties": properties,
            "required": required,
        })
    }
}

/// Tool trait - implement to add new capabilities
#[async_trait]
pub trait Tool: Send + Sync {
    /// Get the tool's definition for provider function calling
    fn definition(&self) -> ToolDefinition;

    /// Execute the tool, returning its text output
    async fn execute(&self, call: &ToolCallRequest) -> Result<String>;

    /// Human-readable description of a call, for activity feedback
    fn describe(&self, call: &ToolCallRequest) -> String {
        format!("Running {}", call.name)
    }

    /// Validate arguments before execution
    fn validate(&self, call: &ToolCallRequest) -> Result<()> {
        let Some(arguments) = call.arguments_object() else {
            return Err(TutorError::ToolExecution(format!(
                "Invalid JSON arguments for {}",
                call.name
            )));
        };

        for param in self.definition().parameters {
            let present = arguments.get(&param.name).is_some_and(|v| !v.is_null());
            if param.required && !present {
                return Err(TutorError::Validation(format!(
                    "Missing required parameter: {}",
                    param.name
                )));
            }
        }

        Ok(())
    }
}

/// Ordered catalog of available tools
#[derive(Clone, Default)]
pub struct ToolCatalog {
    tools: Vec<Arc<dyn Tool>>,
}

impl ToolCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a new tool, replacing any tool with the same name
    pub fn register<T: Tool + 'static>(&mut self, tool: T) {
        self.register_shared(Arc::new(tool));
    }

    pub fn register_shared(&mut self, tool: Arc<dyn Tool>) {
        let name = tool.definition().name;
        self.tools.retain(|t| t.definition().name != name);
        self.tools.push(tool);
    }

    /// Get a tool by name
    pub fn get(&self, name: &str) -> Option<Arc<dyn Tool>> {
        self.tools
            .iter()
            .find(|t| t.definition().name == name)
            .cloned()
    }

    /// All definitions, in registration order
    pub fn definitions(&self) -> Vec<ToolDefinition> {
        self.tools.iter().map(|t| t.definition()).collect()
    }

    pub fn names(&self) -> Vec<String> {
        self.tools.iter().map(|t| t.definition().name).collect()
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    /// Describe a call for activity feedback
    pub fn describe(&self, call: &ToolCallRequest) -> String {
        self.get(&call.name)
            .map_or_else(|| format!("Unknown tool {}", call.name), |t| t.describe(call))
    }

    /// Execute a tool call. Failures become the result text.
    pub async fn execute(&self, call: &ToolCallRequest) -> ToolCallResult {
        let Some(tool) = self.get(&call.name) else {
            tracing::warn!(tool = %call.name, "Unknown tool requested");
            return ToolCallResult::failure(call, format!("Error: Unknown tool '{}'", call.name));
        };

        let outcome = match tool.validate(call) {
            Ok(()) => tool.execute(call).await,
            Err(e) => Err(e),
        };

        match outcome {
            Ok(output) => ToolCallResult::success(call, output),
            Err(e) => {
                tracing::debug!(tool = %call.name, error = %e, "Tool call failed");
                let output = match e {
                    TutorError::ToolExecution(msg) => format!("Error: {msg}"),
                    TutorError::Validation(msg) => format!("Error executing {}: {msg}", call.name),
                    other => format!("Error executing {}: {other}", call.name),
                };
                ToolCallResult::failure(call, output)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct EchoTool;

    #[async_trait]
    impl Tool for EchoTool {
        fn definition(&self) -> ToolDefinition {
            ToolDefinition {
                name: "echo".into(),
                description: "Echo the text back".into(),
                parameters: vec![ParameterSchema::required("text", "string", "Text to echo")],
            }
        }

        async fn execute(&self, call: &ToolCallRequest) -> Result<String> {
            match call.str_argument("text") {
                Some("fail") => Err(TutorError::ToolExecution("echo refused".into())),
                Some(text) => Ok(text.to_string()),
                None => Ok(String::new()),
            }
        }
    }

    #[test]
    fn test_json_schema_rendering() {
        let schema = EchoTool.definition().json_schema();
        assert_eq!(schema["type"], "object");
        assert_eq!(schema["properties"]["text"]["type"], "string");
        assert_eq!(schema["required"], json!(["text"]));
    }

    #[tokio::test]
    async fn test_catalog_execution_never_fails() {
        let mut catalog = ToolCatalog::new();
        catalog.register(EchoTool);

        let ok = catalog
            .execute(&ToolCallRequest::new("1", "echo", json!({"text": "hi"})))
            .await;
        assert!(ok.success);
        assert_eq!(ok.output, "hi");
        assert_eq!(ok.tool_call_id, "1");

        let failed = catalog
            .execute(&ToolCallRequest::new("2", "echo", json!({"text": "fail"})))
            .await;
        assert!(!failed.success);
        assert_eq!(failed.output, "Error: echo refused");

        let missing = catalog
            .execute(&ToolCallRequest::new("3", "echo", json!({})))
            .await;
        assert_eq!(missing.output, "Error executing echo: Missing required parameter: text");

        let unknown = catalog
            .execute(&ToolCallRequest::new("4", "rm", json!({})))
            .await;
        assert_eq!(unknown.output, "Error: Unknown tool 'rm'");

        let garbled = catalog
            .execute(&ToolCallRequest::new("5", "echo", Value::String("{oops".into())))
            .await;
        assert_eq!(garbled.output, "Error: Invalid JSON arguments for echo");
    }

    #[test]
    fn test_lenient_arguments() {
        let call = ToolCallRequest::new(
            "1",
            "list_files",
            json!({"show_hidden": "yes", "max_lines": "12", "pattern": null}),
        );
        assert_eq!(call.bool_argument("show_hidden"), Some(true));
        assert_eq!(call.usize_argument("max_lines"), Some(12));
        assert_eq!(call.str_argument("pattern"), None);
    }
}
