//! Tools the model can call during a turn
//!
//! A [`ToolRegistry`] holds the registered tools and resolves model-issued
//! [`ToolCall`]s against them: case-insensitive lookup, permissive argument
//! parsing and text serialization of the result.

mod builtin;

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{Map, Value};
use tokio_util::sync::CancellationToken;

use crate::agent::{ToolCall, ToolDefinition};
use crate::{Error, Result};

pub use builtin::CurrentTimeTool;

/// Arguments passed to a tool
pub type ToolArgs = Map<String, Value>;

/// A capability the model can invoke
#[async_trait]
pub trait Tool: Send + Sync {
    /// Name the model uses to call the tool
    fn name(&self) -> &str;

    /// Human readable description for the model
    fn description(&self) -> &str {
        ""
    }

    /// JSON schema of the arguments
    fn parameters(&self) -> Value {
        serde_json::json!({ "type": "object", "properties": {} })
    }

    /// Run the tool
    ///
    /// A `Value::String` result is handed to the model verbatim; anything
    /// else is serialized as JSON.
    ///
    /// # Errors
    ///
    /// Any error is reported back to the model as the tool result
    async fn execute(&self, args: ToolArgs, cancel: &CancellationToken) -> Result<Value>;
}

/// Registered tools keyed by lowercase name
#[derive(Default, Clone)]
pub struct ToolRegistry {
    tools: HashMap<String, Arc<dyn Tool>>,
    /// Registration order, for stable definitions
    order: Vec<String>,
}

impl std::fmt::Debug for ToolRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ToolRegistry")
            .field("tools", &self.order)
            .finish()
    }
}

impl ToolRegistry {
    /// Empty registry
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with the built-in tools
    ///
    /// # Errors
    ///
    /// Returns `Error::Config` if two built-ins share a name
    pub fn with_builtins() -> Result<Self> {
        let mut registry = Self::new();
        registry.register(CurrentTimeTool)?;
        Ok(registry)
    }

    /// Add a tool
    ///
    /// # Errors
    ///
    /// Returns `Error::Config` if the name is empty or already taken (ignoring case)
    pub fn register<T: Tool + 'static>(&mut self, tool: T) -> Result<()> {
        self.register_arc(Arc::new(tool))
    }

    /// Add a shared tool
    ///
    /// # Errors
    ///
    /// Returns `Error::Config` if the name is empty or already taken (ignoring case)
    pub fn register_arc(&mut self, tool: Arc<dyn Tool>) -> Result<()> {
        let key = tool.name().to_lowercase();
        if key.is_empty() {
            return Err(Error::Config("tool name must not be empty".to_string()));
        }
        if self.tools.contains_key(&key) {
            return Err(Error::Config(format!(
                "duplicate tool name: {}",
                tool.name()
            )));
        }

        tracing::debug!(tool = %tool.name(), "registered tool");
        self.order.push(key.clone());
        self.tools.insert(key, tool);
        Ok(())
    }

    /// Look up a tool ignoring case
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&Arc<dyn Tool>> {
        self.tools.get(&name.to_lowercase())
    }

    /// Number of registered tools
    #[must_use]
    pub fn len(&self) -> usize {
        self.tools.len()
    }

    /// Whether no tools are registered
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    /// Definitions advertised to the model, in registration order
    #[must_use]
    pub fn definitions(&self) -> Vec<ToolDefinition> {
        self.order
            .iter()
            .filter_map(|key| self.tools.get(key))
            .map(|tool| {
                ToolDefinition::function(tool.name(), tool.description(), tool.parameters())
            })
            .collect()
    }

    /// Execute a model-issued call and render the result as text
    ///
    /// # Errors
    ///
    /// Returns `Error::UnknownTool` naming the requested tool when nothing
    /// matches, or whatever the tool itself fails with
    pub async fn resolve(&self, call: &ToolCall, cancel: &CancellationToken) -> Result<String> {
        let tool = self
            .get(call.name())
            .ok_or_else(|| Error::UnknownTool(call.name().to_string()))?;

        let args = parse_arguments(call.arguments());
        tracing::debug!(tool = %tool.name(), id = %call.id, args = args.len(), "executing tool");

        let value = tool.execute(args, cancel).await?;
        render_result(value)
    }
}

/// Parse raw arguments; anything but a JSON object becomes an empty set
fn parse_arguments(raw: &str) -> ToolArgs {
    match serde_json::from_str::<Value>(raw) {
        Ok(Value::Object(args)) => args,
        _ => {
            if !raw.trim().is_empty() {
                tracing::debug!(raw = %raw, "ignoring malformed tool arguments");
            }
            Map::new()
        }
    }
}

fn render_result(value: Value) -> Result<String> {
    match value {
        Value::String(text) => Ok(text),
        other => Ok(serde_json::to_string(&other)?),
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use serde_json::json;

    use super::*;

    /// Records the arguments it was called with
    #[derive(Default)]
    struct Recorder {
        seen: Mutex<Vec<ToolArgs>>,
    }

    #[async_trait]
    impl Tool for Recorder {
        fn name(&self) -> &str {
            "Turn_Lights"
        }

        async fn execute(&self, args: ToolArgs, _cancel: &CancellationToken) -> Result<Value> {
            self.seen.lock().unwrap().push(args);
            Ok(Value::String("ok".to_string()))
        }
    }

    struct Structured;

    #[async_trait]
    impl Tool for Structured {
        fn name(&self) -> &str {
            "status"
        }

        async fn execute(&self, _args: ToolArgs, _cancel: &CancellationToken) -> Result<Value> {
            Ok(json!({"on": true, "level": 3}))
        }
    }

    struct Failing;

    #[async_trait]
    impl Tool for Failing {
        fn name(&self) -> &str {
            "broken"
        }

        async fn execute(&self, _args: ToolArgs, _cancel: &CancellationToken) -> Result<Value> {
            Err(Error::Tool("bulb missing".to_string()))
        }
    }

    #[tokio::test]
    async fn lookup_ignores_case() {
        let recorder = Arc::new(Recorder::default());
        let mut registry = ToolRegistry::new();
        registry.register_arc(recorder.clone()).unwrap();

        let call = ToolCall::new("1", "turn_lights", r#"{"on":true}"#);
        let result = registry.resolve(&call, &CancellationToken::new()).await.unwrap();

        assert_eq!(result, "ok");
        let seen = recorder.seen.lock().unwrap();
        assert_eq!(seen[0].get("on"), Some(&Value::Bool(true)));
    }

    #[tokio::test]
    async fn malformed_arguments_become_empty() {
        let recorder = Arc::new(Recorder::default());
        let mut registry = ToolRegistry::new();
        registry.register_arc(recorder.clone()).unwrap();

        for raw in ["{not json", "", "[1,2]", "\"on\""] {
            let call = ToolCall::new("1", "TURN_LIGHTS", raw);
            registry.resolve(&call, &CancellationToken::new()).await.unwrap();
        }

        let seen = recorder.seen.lock().unwrap();
        assert_eq!(seen.len(), 4);
        assert!(seen.iter().all(Map::is_empty));
    }

    #[tokio::test]
    async fn unknown_tool_names_the_tool() {
        let registry = ToolRegistry::new();
        let call = ToolCall::new("1", "launch_rocket", "{}");
        let err = registry.resolve(&call, &CancellationToken::new()).await.unwrap_err();
        assert!(matches!(err, Error::UnknownTool(_)));
        assert!(err.to_string().contains("launch_rocket"));
    }

    #[tokio::test]
    async fn structured_results_are_serialized() {
        let mut registry = ToolRegistry::new();
        registry.register(Structured).unwrap();
        let call = ToolCall::new("1", "status", "{}");
        let result = registry.resolve(&call, &CancellationToken::new()).await.unwrap();
        assert_eq!(
            serde_json::from_str::<Value>(&result).unwrap(),
            json!({"on": true, "level": 3})
        );
    }

    #[tokio::test]
    async fn tool_errors_propagate() {
        let mut registry = ToolRegistry::new();
        registry.register(Failing).unwrap();
        let call = ToolCall::new("1", "broken", "{}");
        let err = registry.resolve(&call, &CancellationToken::new()).await.unwrap_err();
        assert_eq!(err.to_string(), "tool error: bulb missing");
    }

    #[test]
    fn duplicate_names_rejected_ignoring_case() {
        let mut registry = ToolRegistry::new();
        registry.register(Recorder::default()).unwrap();
        let err = registry.register(Recorder::default()).unwrap_err();
        assert!(matches!(err, Error::Config(_)));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn builtins_register_cleanly() {
        let registry = ToolRegistry::with_builtins().unwrap();
        assert_eq!(registry.len(), 1);
        assert!(registry.get("CURRENT_TIME").is_some());
    }

    #[test]
    fn definitions_follow_registration_order() {
        let mut registry = ToolRegistry::with_builtins().unwrap();
        registry.register(Structured).unwrap();
        let names: Vec<_> = registry
            .definitions()
            .into_iter()
            .map(|d| d.function.name)
            .collect();
        assert_eq!(names, vec!["current_time", "status"]);
    }
}
