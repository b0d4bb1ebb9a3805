use stacks_tools::Permission;
use stacks_transport::Usage;

/// The twelve observability hooks of §4.6, all advisory: every method has a
/// no-op default, and the runner never lets a hook implementation's panic
/// interrupt the loop (see [`crate::runner::guard`]).
pub trait LoopObserver: Send {
    fn on_stream_start(&mut self) {}
    fn on_stream_delta(&mut self, _text: &str) {}
    fn on_tool_call_start(&mut self, _id: &str, _name: &str, _arguments: &str) {}
    fn on_tool_call_end(&mut self, _id: &str, _name: &str, _output: &str, _is_error: bool) {}
    fn on_turn_complete(&mut self, _turn_index: u32) {}
    fn on_error(&mut self, _message: &str) {}
    /// Consulted before each tool call in text-protocol mode; defaults to
    /// allowing everything (the registry's own `PermissionResolver` still
    /// applies inside `execute`).
    fn on_permission_check(&mut self, _id: &str, _name: &str) -> Permission {
        Permission::Allow
    }
    /// Native tool-call stream events, only emitted when `agent_manages_tools`.
    fn on_agent_tool_call(&mut self, _id: &str, _name: &str, _arguments: &str) {}
    fn on_agent_tool_call_update(&mut self, _id: &str, _arguments_delta: &str) {}
    fn on_doom_loop(&mut self, _identical_count: u32) {}
    fn on_compaction(&mut self, _summary: &str) {}
    fn on_token_usage(&mut self, _usage: &Usage) {}
}

/// An observer that does nothing; the default when a caller supplies none.
pub struct NullObserver;

impl LoopObserver for NullObserver {}
