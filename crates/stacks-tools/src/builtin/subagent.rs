//! `subagent_spawn`, `subagent_delegate` (§4.5, §4.6 depth bound).
//!
//! Defined here rather than in the loop crate so the loop can depend on
//! `stacks-tools` for its registry without `stacks-tools` depending back on
//! the loop: the loop implements [`SubagentRunner`] for its own type and
//! supplies it at registration time.

use std::sync::Arc;

use async_trait::async_trait;
use indexmap::IndexMap;
use serde_json::Value;

use crate::registry::{ToolHandler, ToolRegistry};
use crate::types::{ParamDef, ToolDefinition};

#[async_trait]
pub trait SubagentRunner: Send + Sync {
    /// Runs a self-contained task to completion and returns its final text.
    async fn spawn(&self, task: &str, depth: u32) -> Result<String, String>;

    /// Delegates a single prompt without the bookkeeping of a fresh task.
    async fn delegate(&self, prompt: &str) -> Result<String, String>;
}

struct SpawnHandler {
    runner: Arc<dyn SubagentRunner>,
    depth: u32,
}

#[async_trait]
impl ToolHandler for SpawnHandler {
    async fn call(&self, arguments: &IndexMap<String, Value>) -> Result<String, String> {
        let task = arguments.get("task").and_then(|v| v.as_str()).ok_or("missing 'task'")?;
        self.runner.spawn(task, self.depth).await
    }
}

struct DelegateHandler(Arc<dyn SubagentRunner>);

#[async_trait]
impl ToolHandler for DelegateHandler {
    async fn call(&self, arguments: &IndexMap<String, Value>) -> Result<String, String> {
        let prompt = arguments.get("prompt").and_then(|v| v.as_str()).ok_or("missing 'prompt'")?;
        self.0.delegate(prompt).await
    }
}

/// Registers the subagent tools at `depth`, bounded by `max_depth`. When
/// `depth >= max_depth` the tools are omitted entirely rather than
/// registered-then-refused, so a model at the depth limit never sees them
/// advertised in its system prompt.
pub fn register_subagent_tools(
    registry: &mut ToolRegistry,
    runner: Arc<dyn SubagentRunner>,
    depth: u32,
    max_depth: u32,
) {
    if depth >= max_depth {
        return;
    }

    registry.register(
        ToolDefinition {
            name: "subagent_spawn".to_string(),
            description: "Run a self-contained task in a nested agent loop and return its result".to_string(),
            parameters: IndexMap::from([(
                "task".to_string(),
                ParamDef::required("string", "task description for the subagent"),
            )]),
            category: Some("subagent".to_string()),
            annotations: None,
        },
        Arc::new(SpawnHandler { runner: Arc::clone(&runner), depth: depth + 1 }),
    );
    registry.register(
        ToolDefinition {
            name: "subagent_delegate".to_string(),
            description: "Send a single prompt to a nested agent and return its reply".to_string(),
            parameters: IndexMap::from([(
                "prompt".to_string(),
                ParamDef::required("string", "prompt to delegate"),
            )]),
            category: Some("subagent".to_string()),
            annotations: None,
        },
        Arc::new(DelegateHandler(runner)),
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    struct StubRunner;

    #[async_trait]
    impl SubagentRunner for StubRunner {
        async fn spawn(&self, task: &str, depth: u32) -> Result<String, String> {
            Ok(format!("spawned[{depth}]: {task}"))
        }

        async fn delegate(&self, prompt: &str) -> Result<String, String> {
            Ok(format!("delegated: {prompt}"))
        }
    }

    #[test]
    fn omitted_entirely_at_max_depth() {
        let mut registry = ToolRegistry::new();
        register_subagent_tools(&mut registry, Arc::new(StubRunner), 2, 2);
        assert!(registry.is_empty());
    }

    #[test]
    fn registered_below_max_depth() {
        let mut registry = ToolRegistry::new();
        register_subagent_tools(&mut registry, Arc::new(StubRunner), 0, 2);
        let names: Vec<String> = registry.get_tool_definitions().iter().map(|d| d.name.clone()).collect();
        assert!(names.contains(&"subagent_spawn".to_string()));
        assert!(names.contains(&"subagent_delegate".to_string()));
    }

    #[tokio::test]
    async fn spawn_handler_increments_depth() {
        let mut registry = ToolRegistry::new();
        register_subagent_tools(&mut registry, Arc::new(StubRunner), 0, 2);
        let mut args = IndexMap::new();
        args.insert("task".to_string(), Value::String("build".to_string()));
        let result = registry
            .execute(crate::types::ToolCallRequest {
                id: "1".into(),
                name: "subagent_spawn".into(),
                arguments: args,
            })
            .await;
        assert!(!result.is_error);
        assert_eq!(result.output, "spawned[1]: build");
    }
}
