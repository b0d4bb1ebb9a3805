//! Tool registry: built-in/host/MCP dispatch, permission gating, and the
//! `<tool_use>` text-protocol parser (§4.5).

pub mod builtin;
pub mod mcp;
pub mod permission;
pub mod registry;
pub mod types;

pub use builtin::{
    register_library_tools, register_subagent_tools, register_task_tools, register_vfs_tools,
    LibraryAdapter, LibraryHandle, SubagentRunner, Task, TaskStore, VirtualFileSystem,
};
pub use mcp::{schema_to_params, McpToolSource, McpToolSpec};
pub use permission::{AllowAll, Permission, PermissionResolver};
pub use registry::{ToolHandler, ToolRegistry};
pub use types::{
    ParamDef, ParsedToolCalls, ToolAnnotations, ToolCallRequest, ToolCallResult, ToolDefinition,
};
