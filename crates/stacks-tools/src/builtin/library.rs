//! `library_search`, `library_shelve`, `library_withdraw` (§4.5).

use std::sync::Arc;

use async_trait::async_trait;
use indexmap::IndexMap;
use serde_json::{json, Value};

use stacks_library::{EmbeddingProvider, Library};
use stacks_store::StorageBackend;

use crate::registry::{ToolHandler, ToolRegistry};
use crate::types::{ParamDef, ToolDefinition};

/// Object-safe facade over a concrete `Library<B, E>`, so the registry does
/// not need to be generic over storage backend or embedding provider.
pub trait LibraryHandle: Send + Sync {
    fn search(&self, query: &str, max_results: usize, threshold: f32) -> Result<String, String>;
    fn shelve(&self, text: &str, metadata: Option<IndexMap<String, String>>) -> Result<u64, String>;
    fn withdraw(&self, id: u64) -> Result<bool, String>;
}

pub struct LibraryAdapter<B: StorageBackend, E: EmbeddingProvider>(pub Arc<Library<B, E>>);

impl<B: StorageBackend, E: EmbeddingProvider> LibraryHandle for LibraryAdapter<B, E> {
    fn search(&self, query: &str, max_results: usize, threshold: f32) -> Result<String, String> {
        let hits = self.0.search(query, max_results, threshold).map_err(|e| e.to_string())?;
        let rendered: Vec<Value> = hits
            .into_iter()
            .map(|h| json!({ "id": h.volume.id, "text": h.volume.text, "score": h.score }))
            .collect();
        Ok(serde_json::to_string(&rendered).unwrap_or_else(|_| "[]".to_string()))
    }

    fn shelve(&self, text: &str, metadata: Option<IndexMap<String, String>>) -> Result<u64, String> {
        self.0.add(text, metadata).map_err(|e| e.to_string())
    }

    fn withdraw(&self, id: u64) -> Result<bool, String> {
        self.0.withdraw(id).map_err(|e| e.to_string())
    }
}

struct SearchHandler(Arc<dyn LibraryHandle>);

#[async_trait]
impl ToolHandler for SearchHandler {
    async fn call(&self, arguments: &IndexMap<String, Value>) -> Result<String, String> {
        let query = arguments.get("query").and_then(|v| v.as_str()).ok_or("missing 'query'")?;
        let max_results = arguments.get("max_results").and_then(|v| v.as_u64()).unwrap_or(10) as usize;
        let threshold = arguments.get("threshold").and_then(|v| v.as_f64()).unwrap_or(0.0) as f32;
        self.0.search(query, max_results, threshold)
    }
}

struct ShelveHandler(Arc<dyn LibraryHandle>);

#[async_trait]
impl ToolHandler for ShelveHandler {
    async fn call(&self, arguments: &IndexMap<String, Value>) -> Result<String, String> {
        let text = arguments.get("text").and_then(|v| v.as_str()).ok_or("missing 'text'")?;
        let metadata = arguments.get("metadata").and_then(|v| v.as_object()).map(|obj| {
            obj.iter()
                .filter_map(|(k, v)| v.as_str().map(|s| (k.clone(), s.to_string())))
                .collect()
        });
        let id = self.0.shelve(text, metadata)?;
        Ok(id.to_string())
    }
}

struct WithdrawHandler(Arc<dyn LibraryHandle>);

#[async_trait]
impl ToolHandler for WithdrawHandler {
    async fn call(&self, arguments: &IndexMap<String, Value>) -> Result<String, String> {
        let id = arguments.get("id").and_then(|v| v.as_u64()).ok_or("missing 'id'")?;
        let removed = self.0.withdraw(id)?;
        Ok(if removed { "withdrawn".to_string() } else { "not found".to_string() })
    }
}

pub fn register_library_tools(registry: &mut ToolRegistry, library: Arc<dyn LibraryHandle>) {
    registry.register(
        ToolDefinition {
            name: "library_search".to_string(),
            description: "Search the library for text semantically similar to a query".to_string(),
            parameters: IndexMap::from([
                ("query".to_string(), ParamDef::required("string", "search query")),
                ("max_results".to_string(), ParamDef::optional("number", "maximum results")),
                ("threshold".to_string(), ParamDef::optional("number", "minimum score")),
            ]),
            category: Some("library".to_string()),
            annotations: None,
        },
        Arc::new(SearchHandler(Arc::clone(&library))),
    );
    registry.register(
        ToolDefinition {
            name: "library_shelve".to_string(),
            description: "Add text to the library".to_string(),
            parameters: IndexMap::from([
                ("text".to_string(), ParamDef::required("string", "text to store")),
                ("metadata".to_string(), ParamDef::optional("object", "metadata key/value pairs")),
            ]),
            category: Some("library".to_string()),
            annotations: None,
        },
        Arc::new(ShelveHandler(Arc::clone(&library))),
    );
    registry.register(
        ToolDefinition {
            name: "library_withdraw".to_string(),
            description: "Remove an entry from the library by id".to_string(),
            parameters: IndexMap::from([(
                "id".to_string(),
                ParamDef::required("number", "volume id"),
            )]),
            category: Some("library".to_string()),
            annotations: Some(crate::types::ToolAnnotations { destructive: Some(true), ..Default::default() }),
        },
        Arc::new(WithdrawHandler(library)),
    );
}
