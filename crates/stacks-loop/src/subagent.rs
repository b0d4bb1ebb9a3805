use std::sync::Arc;

use async_trait::async_trait;
use stacks_conversation::Conversation;
use stacks_core::ConversationConfig;
use stacks_tools::{SubagentRunner, ToolRegistry};
use stacks_transport::{GenerateOptions, GenerationTransport};

use crate::observer::NullObserver;
use crate::runner::{AgentLoop, RunConfig};

/// Implements [`SubagentRunner`] by spawning a fresh, independently-bounded
/// [`AgentLoop`] per call. Lives in this crate (not `stacks-tools`) so the
/// tool registry never needs to depend on the loop: the registry only knows
/// the `SubagentRunner` trait, and this is the concrete that satisfies it.
pub struct LoopSubagentRunner<T: GenerationTransport> {
    transport: Arc<T>,
    registry_for_depth: Arc<dyn Fn(u32) -> ToolRegistry + Send + Sync>,
    run_config: RunConfig,
}

impl<T: GenerationTransport> LoopSubagentRunner<T> {
    pub fn new(
        transport: Arc<T>,
        registry_for_depth: Arc<dyn Fn(u32) -> ToolRegistry + Send + Sync>,
        run_config: RunConfig,
    ) -> Self {
        Self { transport, registry_for_depth, run_config }
    }
}

#[async_trait]
impl<T: GenerationTransport> SubagentRunner for LoopSubagentRunner<T> {
    async fn spawn(&self, task: &str, depth: u32) -> Result<String, String> {
        let registry = (self.registry_for_depth)(depth);
        let conversation = Conversation::new(ConversationConfig::default());
        let mut sub_loop =
            AgentLoop::new(Arc::clone(&self.transport), registry, conversation, self.run_config.clone());
        let mut observer = NullObserver;
        let result = sub_loop.run(task, &mut observer, vec![]).await;
        result.final_text.ok_or_else(|| "subagent produced no final text".to_string())
    }

    async fn delegate(&self, prompt: &str) -> Result<String, String> {
        let options = GenerateOptions::default();
        self.transport.generate(prompt, &options).await.map(|r| r.content).map_err(|e| e.to_string())
    }
}
