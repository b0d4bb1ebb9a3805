//! `vfs_read`, `vfs_write`, `vfs_list`, `vfs_tree` (§4.5). The virtual
//! file system itself is external to the core; tools dispatch through
//! whatever host-supplied implementation is registered.

use std::sync::Arc;

use async_trait::async_trait;
use indexmap::IndexMap;
use serde_json::Value;

use crate::registry::{ToolHandler, ToolRegistry};
use crate::types::{ParamDef, ToolDefinition};

pub trait VirtualFileSystem: Send + Sync {
    fn read(&self, path: &str) -> Result<String, String>;
    fn write(&self, path: &str, content: &str) -> Result<(), String>;
    fn list(&self, path: &str) -> Result<Vec<String>, String>;
    fn tree(&self, path: &str) -> Result<String, String>;
}

struct ReadHandler(Arc<dyn VirtualFileSystem>);

#[async_trait]
impl ToolHandler for ReadHandler {
    async fn call(&self, arguments: &IndexMap<String, Value>) -> Result<String, String> {
        let path = arguments.get("path").and_then(|v| v.as_str()).ok_or("missing 'path'")?;
        self.0.read(path)
    }
}

struct WriteHandler(Arc<dyn VirtualFileSystem>);

#[async_trait]
impl ToolHandler for WriteHandler {
    async fn call(&self, arguments: &IndexMap<String, Value>) -> Result<String, String> {
        let path = arguments.get("path").and_then(|v| v.as_str()).ok_or("missing 'path'")?;
        let content = arguments.get("content").and_then(|v| v.as_str()).ok_or("missing 'content'")?;
        self.0.write(path, content)?;
        Ok("written".to_string())
    }
}

struct ListHandler(Arc<dyn VirtualFileSystem>);

#[async_trait]
impl ToolHandler for ListHandler {
    async fn call(&self, arguments: &IndexMap<String, Value>) -> Result<String, String> {
        let path = arguments.get("path").and_then(|v| v.as_str()).unwrap_or(".");
        let entries = self.0.list(path)?;
        Ok(entries.join("\n"))
    }
}

struct TreeHandler(Arc<dyn VirtualFileSystem>);

#[async_trait]
impl ToolHandler for TreeHandler {
    async fn call(&self, arguments: &IndexMap<String, Value>) -> Result<String, String> {
        let path = arguments.get("path").and_then(|v| v.as_str()).unwrap_or(".");
        self.0.tree(path)
    }
}

pub fn register_vfs_tools(registry: &mut ToolRegistry, vfs: Arc<dyn VirtualFileSystem>) {
    registry.register(
        ToolDefinition {
            name: "vfs_read".to_string(),
            description: "Read a file's contents".to_string(),
            parameters: IndexMap::from([("path".to_string(), ParamDef::required("string", "file path"))]),
            category: Some("vfs".to_string()),
            annotations: Some(crate::types::ToolAnnotations { read_only: Some(true), ..Default::default() }),
        },
        Arc::new(ReadHandler(Arc::clone(&vfs))),
    );
    registry.register(
        ToolDefinition {
            name: "vfs_write".to_string(),
            description: "Write a file's contents".to_string(),
            parameters: IndexMap::from([
                ("path".to_string(), ParamDef::required("string", "file path")),
                ("content".to_string(), ParamDef::required("string", "file content")),
            ]),
            category: Some("vfs".to_string()),
            annotations: None,
        },
        Arc::new(WriteHandler(Arc::clone(&vfs))),
    );
    registry.register(
        ToolDefinition {
            name: "vfs_list".to_string(),
            description: "List entries in a directory".to_string(),
            parameters: IndexMap::from([("path".to_string(), ParamDef::optional("string", "directory path"))]),
            category: Some("vfs".to_string()),
            annotations: Some(crate::types::ToolAnnotations { read_only: Some(true), ..Default::default() }),
        },
        Arc::new(ListHandler(Arc::clone(&vfs))),
    );
    registry.register(
        ToolDefinition {
            name: "vfs_tree".to_string(),
            description: "Render a directory tree".to_string(),
            parameters: IndexMap::from([("path".to_string(), ParamDef::optional("string", "root path"))]),
            category: Some("vfs".to_string()),
            annotations: Some(crate::types::ToolAnnotations { read_only: Some(true), ..Default::default() }),
        },
        Arc::new(TreeHandler(vfs)),
    );
}
