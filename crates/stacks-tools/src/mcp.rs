//! MCP tool discovery. The core treats an MCP server as an abstract source
//! of JSON-Schema tool specs; the stdio/wire details of any specific MCP
//! transport are out of scope (§1).

use async_trait::async_trait;
use serde_json::Value;

#[derive(Debug, Clone)]
pub struct McpToolSpec {
    pub server_name: String,
    pub tool_name: String,
    pub description: String,
    /// A JSON Schema object; only `properties`/`required` are consulted.
    pub json_schema: Value,
}

#[async_trait]
pub trait McpToolSource: Send + Sync {
    async fn list_tools(&self) -> Result<Vec<McpToolSpec>, String>;
}

/// Translates a JSON-Schema `properties`/`required` shape into the
/// registry's parameter map.
pub fn schema_to_params(schema: &Value) -> indexmap::IndexMap<String, crate::types::ParamDef> {
    let mut params = indexmap::IndexMap::new();
    let Some(properties) = schema.get("properties").and_then(|p| p.as_object()) else {
        return params;
    };
    let required: Vec<&str> = schema
        .get("required")
        .and_then(|r| r.as_array())
        .map(|arr| arr.iter().filter_map(|v| v.as_str()).collect())
        .unwrap_or_default();

    for (name, spec) in properties {
        let type_tag = spec.get("type").and_then(|t| t.as_str()).unwrap_or("string").to_string();
        let description = spec
            .get("description")
            .and_then(|d| d.as_str())
            .unwrap_or("")
            .to_string();
        params.insert(
            name.clone(),
            crate::types::ParamDef {
                type_tag,
                description,
                required: required.contains(&name.as_str()),
            },
        );
    }
    params
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn schema_to_params_marks_required_fields() {
        let schema = json!({
            "properties": {
                "path": {"type": "string", "description": "target path"},
                "recursive": {"type": "boolean"}
            },
            "required": ["path"]
        });
        let params = schema_to_params(&schema);
        assert!(params["path"].required);
        assert_eq!(params["path"].type_tag, "string");
        assert_eq!(params["path"].description, "target path");
        assert!(!params["recursive"].required);
        assert_eq!(params["recursive"].type_tag, "boolean");
    }

    #[test]
    fn schema_to_params_empty_without_properties() {
        let params = schema_to_params(&json!({}));
        assert!(params.is_empty());
    }
}
