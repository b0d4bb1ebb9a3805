use std::sync::{Arc, Mutex};
use std::collections::VecDeque;

use async_trait::async_trait;
use stacks_conversation::Conversation;
use stacks_core::ConversationConfig;
use stacks_loop::{AgentLoop, LoopSubagentRunner, RunConfig};
use stacks_tools::{SubagentRunner, ToolHandler, ToolRegistry};
use stacks_transport::{
    EventStream, GenerateOptions, GenerateResult, GenerationTransport, StreamEvent, TransportError,
};

struct ScriptedTransport {
    responses: Mutex<VecDeque<String>>,
}

impl ScriptedTransport {
    fn new(responses: Vec<&str>) -> Self {
        Self { responses: Mutex::new(responses.into_iter().map(String::from).collect()) }
    }
}

#[async_trait]
impl GenerationTransport for ScriptedTransport {
    async fn generate(&self, _prompt: &str, _options: &GenerateOptions) -> Result<GenerateResult, TransportError> {
        Ok(GenerateResult { content: "a brief summary".to_string(), usage: None })
    }

    async fn generate_stream<'a>(
        &'a self,
        _prompt: &str,
        _options: &GenerateOptions,
    ) -> Result<EventStream<'a>, TransportError> {
        let text = {
            let mut queue = self.responses.lock().expect("lock poisoned");
            if queue.len() > 1 {
                queue.pop_front().expect("checked non-empty")
            } else {
                queue.front().cloned().unwrap_or_default()
            }
        };
        let events = vec![Ok(StreamEvent::Delta { text }), Ok(StreamEvent::Complete { usage: None })];
        Ok(Box::pin(futures_util::stream::iter(events)))
    }
}

struct EchoHandler;

#[async_trait]
impl ToolHandler for EchoHandler {
    async fn call(&self, arguments: &indexmap::IndexMap<String, serde_json::Value>) -> Result<String, String> {
        Ok(arguments.get("q").and_then(|v| v.as_str()).unwrap_or("").to_string())
    }
}

fn registry_with_echo() -> ToolRegistry {
    let mut registry = ToolRegistry::new();
    registry.register(
        stacks_tools::ToolDefinition {
            name: "echo".to_string(),
            description: "Echoes q".to_string(),
            parameters: indexmap::IndexMap::from([(
                "q".to_string(),
                stacks_tools::ParamDef::required("string", "text"),
            )]),
            category: None,
            annotations: None,
        },
        Arc::new(EchoHandler),
    );
    registry
}

fn conversation() -> Conversation {
    Conversation::new(ConversationConfig::default())
}

#[tokio::test]
async fn no_tool_single_turn_returns_final_text() {
    let transport = Arc::new(ScriptedTransport::new(vec!["Hello there."]));
    let mut agent_loop = AgentLoop::new(transport, ToolRegistry::new(), conversation(), RunConfig::default());
    let result = agent_loop.run("hi", &mut stacks_loop::NullObserver, vec![]).await;
    assert_eq!(result.final_text.as_deref(), Some("Hello there."));
    assert_eq!(result.total_turns, 1);
    assert!(!result.hit_turn_limit);
    assert!(!result.aborted);
}

#[tokio::test]
async fn tool_call_then_text_runs_two_turns() {
    let first = "<tool_use>{\"id\":\"call_1\",\"name\":\"echo\",\"arguments\":{\"q\":\"ping\"}}</tool_use>";
    let transport = Arc::new(ScriptedTransport::new(vec![first, "Done: ping"]));
    let mut agent_loop = AgentLoop::new(transport, registry_with_echo(), conversation(), RunConfig::default());
    let result = agent_loop.run("go", &mut stacks_loop::NullObserver, vec![]).await;
    assert_eq!(result.final_text.as_deref(), Some("Done: ping"));
    assert_eq!(result.total_turns, 2);
    assert_eq!(result.turns.len(), 2);
    match &result.turns[0] {
        stacks_loop::LoopTurn::ToolUse { results } => {
            assert_eq!(results.len(), 1);
            assert_eq!(results[0].output, "ping");
            assert!(!results[0].is_error);
        }
        other => panic!("expected ToolUse turn, got {other:?}"),
    }
}

#[tokio::test]
async fn turn_limit_is_reported_when_model_never_stops_calling_tools() {
    let call = "<tool_use>{\"name\":\"echo\",\"arguments\":{\"q\":\"x\"}}</tool_use>";
    let transport = Arc::new(ScriptedTransport::new(vec![call]));
    let config = RunConfig { max_turns: 3, ..RunConfig::default() };
    let mut agent_loop = AgentLoop::new(transport, registry_with_echo(), conversation(), config);
    let result = agent_loop.run("go", &mut stacks_loop::NullObserver, vec![]).await;
    assert!(result.hit_turn_limit);
    assert!(result.final_text.is_none());
    assert_eq!(result.total_turns, 3);
    assert_eq!(result.turns.len(), 3);
}

#[tokio::test]
async fn malformed_tool_block_is_skipped_and_treated_as_final_text() {
    let malformed = "here is my answer <tool_use>{not json}</tool_use> end";
    let transport = Arc::new(ScriptedTransport::new(vec![malformed]));
    let mut agent_loop = AgentLoop::new(transport, registry_with_echo(), conversation(), RunConfig::default());
    let result = agent_loop.run("go", &mut stacks_loop::NullObserver, vec![]).await;
    assert!(result.final_text.unwrap().contains("here is my answer"));
    assert_eq!(result.total_turns, 1);
}

#[tokio::test]
async fn cancellation_before_first_turn_aborts_immediately() {
    let transport = Arc::new(ScriptedTransport::new(vec!["unreachable"]));
    let mut agent_loop =
        AgentLoop::new(transport, ToolRegistry::new(), conversation(), RunConfig::default());
    agent_loop.cancel_token().cancel();
    let result = agent_loop.run("hi", &mut stacks_loop::NullObserver, vec![]).await;
    assert!(result.aborted);
    assert_eq!(result.total_turns, 0);
}

#[tokio::test]
async fn agent_manages_tools_mode_returns_after_exactly_one_turn() {
    let raw = "<tool_use>{\"name\":\"echo\",\"arguments\":{}}</tool_use> plain text the host's own protocol would parse";
    let transport = Arc::new(ScriptedTransport::new(vec![raw]));
    let config = RunConfig { agent_manages_tools: true, ..RunConfig::default() };
    let mut agent_loop = AgentLoop::new(transport, registry_with_echo(), conversation(), config);
    let result = agent_loop.run("go", &mut stacks_loop::NullObserver, vec![]).await;
    assert_eq!(result.total_turns, 1);
    assert_eq!(result.final_text.as_deref(), Some(raw));
}

#[derive(Default)]
struct DoomLoopObserver {
    hits: Vec<u32>,
}

impl stacks_loop::LoopObserver for DoomLoopObserver {
    fn on_doom_loop(&mut self, identical_count: u32) {
        self.hits.push(identical_count);
    }
}

#[tokio::test]
async fn doom_loop_threshold_is_configurable() {
    let call = "<tool_use>{\"name\":\"echo\",\"arguments\":{\"q\":\"x\"}}</tool_use>";
    let transport = Arc::new(ScriptedTransport::new(vec![call]));
    let config = RunConfig { max_turns: 4, doom_loop_threshold: 2, ..RunConfig::default() };
    let mut agent_loop = AgentLoop::new(transport, registry_with_echo(), conversation(), config);
    let mut observer = DoomLoopObserver::default();
    let result = agent_loop.run("go", &mut observer, vec![]).await;
    assert!(result.hit_turn_limit);
    assert_eq!(observer.hits, vec![2, 3]);
}

#[tokio::test]
async fn loop_subagent_runner_spawns_nested_loop_and_returns_final_text() {
    let transport = Arc::new(ScriptedTransport::new(vec!["subagent result"]));
    let registry_for_depth: Arc<dyn Fn(u32) -> ToolRegistry + Send + Sync> =
        Arc::new(|_depth| ToolRegistry::new());
    let runner = LoopSubagentRunner::new(transport, registry_for_depth, RunConfig::default());
    let output = runner.spawn("do the thing", 1).await.expect("subagent should produce output");
    assert_eq!(output, "subagent result");
}

#[tokio::test]
async fn loop_subagent_runner_delegate_calls_transport_generate() {
    let transport = Arc::new(ScriptedTransport::new(vec!["unused"]));
    let registry_for_depth: Arc<dyn Fn(u32) -> ToolRegistry + Send + Sync> =
        Arc::new(|_depth| ToolRegistry::new());
    let runner = LoopSubagentRunner::new(transport, registry_for_depth, RunConfig::default());
    let output = runner.delegate("summarize this").await.expect("delegate should succeed");
    assert_eq!(output, "a brief summary");
}
