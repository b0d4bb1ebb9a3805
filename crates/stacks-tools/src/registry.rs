use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use indexmap::IndexMap;
use regex::Regex;
use serde_json::Value;

use crate::mcp::{schema_to_params, McpToolSource};
use crate::permission::{AllowAll, Permission, PermissionResolver};
use crate::types::{ParsedToolCalls, ToolCallRequest, ToolCallResult, ToolDefinition};

#[async_trait]
pub trait ToolHandler: Send + Sync {
    async fn call(&self, arguments: &IndexMap<String, Value>) -> Result<String, String>;
}

struct Registration {
    definition: ToolDefinition,
    handler: Arc<dyn ToolHandler>,
}

/// A uniform dispatch layer over built-in, host, and MCP-provided tools
/// (§4.5). Registration order is preserved for `format_for_system_prompt`.
pub struct ToolRegistry {
    tools: IndexMap<String, Registration>,
    permission_resolver: Arc<dyn PermissionResolver>,
    next_call_id: std::sync::atomic::AtomicU64,
}

impl Default for ToolRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self {
            tools: IndexMap::new(),
            permission_resolver: Arc::new(AllowAll),
            next_call_id: std::sync::atomic::AtomicU64::new(1),
        }
    }

    pub fn with_permission_resolver(mut self, resolver: Arc<dyn PermissionResolver>) -> Self {
        self.permission_resolver = resolver;
        self
    }

    pub fn register(&mut self, definition: ToolDefinition, handler: Arc<dyn ToolHandler>) {
        self.tools.insert(definition.name.clone(), Registration { definition, handler });
    }

    pub fn unregister(&mut self, name: &str) {
        self.tools.shift_remove(name);
    }

    pub fn get_tool_definitions(&self) -> Vec<ToolDefinition> {
        self.tools.values().map(|r| r.definition.clone()).collect()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    /// A deterministic block: a preamble describing the `<tool_use>` JSON
    /// protocol, then one `- name: description` / parameter line per tool.
    /// Empty when no tools are registered. `parse_tool_calls` is the dual
    /// of this formatter — both must agree on the grammar.
    pub fn format_for_system_prompt(&self) -> String {
        if self.tools.is_empty() {
            return String::new();
        }
        let mut out = String::new();
        out.push_str(
            "You have access to tools. To call one, emit a block of the form:\n\
             <tool_use>\n{\"id\": \"call_1\", \"name\": \"<tool_name>\", \"arguments\": {...}}\n</tool_use>\n\
             You may emit zero or more tool_use blocks in a response. Available tools:\n",
        );
        for reg in self.tools.values() {
            out.push_str(&format!("- {}: {}\n", reg.definition.name, reg.definition.description));
            if !reg.definition.parameters.is_empty() {
                let params: Vec<String> = reg
                    .definition
                    .parameters
                    .iter()
                    .map(|(name, def)| {
                        if def.required {
                            format!("{} ({}, required)", name, def.type_tag)
                        } else {
                            format!("{} ({})", name, def.type_tag)
                        }
                    })
                    .collect();
                out.push_str(&format!("  Parameters: {}\n", params.join(", ")));
            }
        }
        out
    }

    /// Looks up by name, permission-gates, executes, measures duration.
    /// Missing tools and denied permission and handler failures all map to
    /// an in-band `is_error = true` result rather than propagating.
    pub async fn execute(&self, call: ToolCallRequest) -> ToolCallResult {
        let Some(reg) = self.tools.get(&call.name) else {
            return ToolCallResult {
                id: call.id,
                name: call.name.clone(),
                output: format!("Tool not found: {}", call.name),
                is_error: true,
                duration_ms: None,
            };
        };

        if self.permission_resolver.check(&call) == Permission::Deny {
            return ToolCallResult {
                id: call.id,
                name: call.name,
                output: "Permission denied".to_string(),
                is_error: true,
                duration_ms: None,
            };
        }

        let started = Instant::now();
        let result = reg.handler.call(&call.arguments).await;
        let duration_ms = started.elapsed().as_millis() as u64;

        match result {
            Ok(output) => ToolCallResult {
                id: call.id,
                name: call.name,
                output,
                is_error: false,
                duration_ms: Some(duration_ms),
            },
            Err(message) => ToolCallResult {
                id: call.id,
                name: call.name,
                output: message,
                is_error: true,
                duration_ms: Some(duration_ms),
            },
        }
    }

    /// Scans for `<tool_use>...</tool_use>` blocks (DOTALL); malformed JSON
    /// blocks are silently skipped. `id` defaults to `call_<N>`, 1-based
    /// across the whole response; `arguments` defaults to `{}`.
    pub fn parse_tool_calls(&self, response: &str) -> ParsedToolCalls {
        let re = Regex::new(r"(?s)<tool_use>(.*?)</tool_use>").expect("static regex is valid");
        let mut tool_calls = Vec::new();
        let mut counter = 0u64;

        for caps in re.captures_iter(response) {
            counter += 1;
            let Some(inner) = caps.get(1) else { continue };
            let Ok(value) = serde_json::from_str::<Value>(inner.as_str().trim()) else { continue };
            let Some(name) = value.get("name").and_then(|n| n.as_str()) else { continue };
            let id = value
                .get("id")
                .and_then(|i| i.as_str())
                .map(|s| s.to_string())
                .unwrap_or_else(|| format!("call_{counter}"));
            let arguments = value
                .get("arguments")
                .and_then(|a| a.as_object())
                .map(|obj| obj.iter().map(|(k, v)| (k.clone(), v.clone())).collect())
                .unwrap_or_default();
            tool_calls.push(ToolCallRequest { id, name: name.to_string(), arguments });
        }

        let text = re.replace_all(response, "").trim().to_string();
        ParsedToolCalls { text, tool_calls }
    }

    /// Clears, re-registers built-ins via `register_builtins`, then
    /// enumerates connected MCP sources, registering each tool under a
    /// qualified `mcp:<server>/<tool>` name. Sources that fail to enumerate
    /// are logged and skipped.
    pub async fn discover(
        &mut self,
        register_builtins: impl FnOnce(&mut ToolRegistry),
        mcp_sources: &[Arc<dyn McpToolSource>],
    ) {
        self.tools.clear();
        register_builtins(self);

        for source in mcp_sources {
            match source.list_tools().await {
                Ok(specs) => {
                    for spec in specs {
                        let qualified_name = format!("mcp:{}/{}", spec.server_name, spec.tool_name);
                        let parameters = schema_to_params(&spec.json_schema);
                        self.register(
                            ToolDefinition {
                                name: qualified_name,
                                description: spec.description,
                                parameters,
                                category: Some("mcp".to_string()),
                                annotations: None,
                            },
                            Arc::new(McpPlaceholderHandler),
                        );
                    }
                }
                Err(err) => {
                    tracing::warn!(error = %err, "MCP server failed to enumerate tools, skipping");
                }
            }
        }
    }

    pub fn next_call_id(&self) -> String {
        let n = self.next_call_id.fetch_add(1, std::sync::atomic::Ordering::Relaxed);
        format!("call_{n}")
    }
}

/// Discovered MCP tools are dispatched through the host's MCP client, which
/// is outside the core's scope (§1 — "stdio bridges to third-party LLM
/// runtimes" and MCP wire format are non-goals). This placeholder exists so
/// `discover()` leaves a complete, inspectable catalog even before a real
/// dispatcher is wired in by the host.
struct McpPlaceholderHandler;

#[async_trait]
impl ToolHandler for McpPlaceholderHandler {
    async fn call(&self, _arguments: &IndexMap<String, Value>) -> Result<String, String> {
        Err("MCP tool dispatch is provided by the host, not the core".to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct EchoHandler;

    #[async_trait]
    impl ToolHandler for EchoHandler {
        async fn call(&self, arguments: &IndexMap<String, Value>) -> Result<String, String> {
            Ok(arguments.get("q").and_then(|v| v.as_str()).unwrap_or("").to_string())
        }
    }

    fn sample_def() -> ToolDefinition {
        ToolDefinition {
            name: "test_tool".to_string(),
            description: "Echoes its q parameter".to_string(),
            parameters: IndexMap::from([(
                "q".to_string(),
                crate::types::ParamDef::required("string", "query"),
            )]),
            category: None,
            annotations: None,
        }
    }

    #[test]
    fn format_for_system_prompt_empty_when_no_tools() {
        let registry = ToolRegistry::new();
        assert_eq!(registry.format_for_system_prompt(), "");
    }

    #[test]
    fn format_for_system_prompt_lists_registered_tools() {
        let mut registry = ToolRegistry::new();
        registry.register(sample_def(), Arc::new(EchoHandler));
        let prompt = registry.format_for_system_prompt();
        assert!(prompt.contains("test_tool"));
        assert!(prompt.contains("q (string, required)"));
    }

    #[tokio::test]
    async fn execute_missing_tool_is_in_band_error() {
        let registry = ToolRegistry::new();
        let result = registry
            .execute(ToolCallRequest { id: "1".into(), name: "nope".into(), arguments: IndexMap::new() })
            .await;
        assert!(result.is_error);
        assert!(result.output.contains("nope"));
    }

    #[tokio::test]
    async fn execute_runs_registered_handler() {
        let mut registry = ToolRegistry::new();
        registry.register(sample_def(), Arc::new(EchoHandler));
        let mut args = IndexMap::new();
        args.insert("q".to_string(), Value::String("hello".to_string()));
        let result = registry
            .execute(ToolCallRequest { id: "1".into(), name: "test_tool".into(), arguments: args })
            .await;
        assert!(!result.is_error);
        assert_eq!(result.output, "hello");
    }

    #[test]
    fn parse_tool_calls_extracts_and_strips_blocks() {
        let registry = ToolRegistry::new();
        let response = "Let me search.\n<tool_use>\n{\"id\":\"call_1\",\"name\":\"test_tool\",\"arguments\":{\"q\":\"hello\"}}\n</tool_use>";
        let parsed = registry.parse_tool_calls(response);
        assert_eq!(parsed.tool_calls.len(), 1);
        assert_eq!(parsed.tool_calls[0].name, "test_tool");
        assert_eq!(parsed.text, "Let me search.");
    }

    #[test]
    fn parse_tool_calls_skips_malformed_json_but_keeps_surrounding_text() {
        let registry = ToolRegistry::new();
        let response = "Some text <tool_use>\n{invalid json}\n</tool_use> more text";
        let parsed = registry.parse_tool_calls(response);
        assert!(parsed.tool_calls.is_empty());
        assert!(parsed.text.contains("Some text"));
        assert!(parsed.text.contains("more text"));
    }

    #[test]
    fn parse_tool_calls_is_idempotent_on_stripped_text() {
        let registry = ToolRegistry::new();
        let response = "a <tool_use>{\"name\":\"t\"}</tool_use> b";
        let first = registry.parse_tool_calls(response);
        let second = registry.parse_tool_calls(&first.text);
        assert!(second.tool_calls.is_empty());
    }

    #[test]
    fn parse_tool_calls_defaults_id_and_arguments() {
        let registry = ToolRegistry::new();
        let response = "<tool_use>{\"name\":\"t\"}</tool_use>";
        let parsed = registry.parse_tool_calls(response);
        assert_eq!(parsed.tool_calls[0].id, "call_1");
        assert!(parsed.tool_calls[0].arguments.is_empty());
    }

    struct DenyAll;

    impl crate::permission::PermissionResolver for DenyAll {
        fn check(&self, _call: &ToolCallRequest) -> Permission {
            Permission::Deny
        }
    }

    #[tokio::test]
    async fn execute_is_denied_by_a_custom_permission_resolver() {
        let mut registry = ToolRegistry::new().with_permission_resolver(Arc::new(DenyAll));
        registry.register(sample_def(), Arc::new(EchoHandler));
        let result = registry
            .execute(ToolCallRequest { id: "1".into(), name: "test_tool".into(), arguments: IndexMap::new() })
            .await;
        assert!(result.is_error);
        assert_eq!(result.output, "Permission denied");
    }

    use crate::mcp::McpToolSpec;

    struct FakeMcpSource {
        specs: Vec<McpToolSpec>,
    }

    #[async_trait]
    impl McpToolSource for FakeMcpSource {
        async fn list_tools(&self) -> Result<Vec<McpToolSpec>, String> {
            Ok(self.specs.clone())
        }
    }

    struct FailingMcpSource;

    #[async_trait]
    impl McpToolSource for FailingMcpSource {
        async fn list_tools(&self) -> Result<Vec<McpToolSpec>, String> {
            Err("connection refused".to_string())
        }
    }

    #[tokio::test]
    async fn discover_registers_builtins_then_qualified_mcp_tools_and_skips_failing_sources() {
        let mut registry = ToolRegistry::new();
        let sources: Vec<Arc<dyn McpToolSource>> = vec![
            Arc::new(FakeMcpSource {
                specs: vec![McpToolSpec {
                    server_name: "weather".to_string(),
                    tool_name: "forecast".to_string(),
                    description: "Get a forecast".to_string(),
                    json_schema: serde_json::json!({"properties": {}}),
                }],
            }),
            Arc::new(FailingMcpSource),
        ];

        registry
            .discover(
                |reg| {
                    reg.register(sample_def(), Arc::new(EchoHandler));
                },
                &sources,
            )
            .await;

        let definitions = registry.get_tool_definitions();
        assert!(definitions.iter().any(|d| d.name == "test_tool"));
        assert!(definitions.iter().any(|d| d.name == "mcp:weather/forecast"));
        assert_eq!(definitions.len(), 2);
    }
}
