use indexmap::IndexMap;
use serde_json::Value;

#[derive(Debug, Clone, Default)]
pub struct ToolAnnotations {
    pub read_only: Option<bool>,
    pub destructive: Option<bool>,
    pub idempotent: Option<bool>,
}

#[derive(Debug, Clone)]
pub struct ParamDef {
    pub type_tag: String,
    pub description: String,
    pub required: bool,
}

impl ParamDef {
    pub fn required(type_tag: impl Into<String>, description: impl Into<String>) -> Self {
        Self { type_tag: type_tag.into(), description: description.into(), required: true }
    }

    pub fn optional(type_tag: impl Into<String>, description: impl Into<String>) -> Self {
        Self { type_tag: type_tag.into(), description: description.into(), required: false }
    }
}

#[derive(Debug, Clone)]
pub struct ToolDefinition {
    pub name: String,
    pub description: String,
    pub parameters: IndexMap<String, ParamDef>,
    pub category: Option<String>,
    pub annotations: Option<ToolAnnotations>,
}

#[derive(Debug, Clone)]
pub struct ToolCallRequest {
    pub id: String,
    pub name: String,
    pub arguments: IndexMap<String, Value>,
}

#[derive(Debug, Clone)]
pub struct ToolCallResult {
    pub id: String,
    pub name: String,
    pub output: String,
    pub is_error: bool,
    pub duration_ms: Option<u64>,
}

/// Output of [`crate::ToolRegistry::parse_tool_calls`]: the response text
/// with tool-use blocks stripped, plus the parsed calls in document order.
#[derive(Debug, Clone)]
pub struct ParsedToolCalls {
    pub text: String,
    pub tool_calls: Vec<ToolCallRequest>,
}
