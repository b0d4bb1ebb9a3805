use std::sync::Arc;

use futures_util::StreamExt;
use serde_json::Value;
use stacks_conversation::Conversation;
use stacks_tools::{Permission, ToolCallResult, ToolRegistry};
use stacks_transport::{GenerateOptions, GenerationTransport, ImageInput, StreamEvent, Usage};

use crate::cancel::CancelToken;
use crate::observer::LoopObserver;
use crate::types::{LoopResult, LoopTurn};

/// Construction-time inputs to a loop run (§4.6's "Inputs" list, minus the
/// transport/registry/conversation which are held separately so they can
/// outlive a single `run` call and be reused across turns).
#[derive(Debug, Clone)]
pub struct RunConfig {
    pub max_turns: u32,
    pub server_name: Option<String>,
    pub agent_id: Option<String>,
    pub system_prompt: Option<String>,
    pub agent_manages_tools: bool,
    pub doom_loop_threshold: u32,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            max_turns: 10,
            server_name: None,
            agent_id: None,
            system_prompt: None,
            agent_manages_tools: false,
            doom_loop_threshold: 3,
        }
    }
}

fn guard<F: FnOnce()>(f: F) {
    if std::panic::catch_unwind(std::panic::AssertUnwindSafe(f)).is_err() {
        tracing::warn!("loop observer hook panicked, continuing");
    }
}

fn guard_ret<F: FnOnce() -> R, R>(f: F, default: R) -> R {
    std::panic::catch_unwind(std::panic::AssertUnwindSafe(f)).unwrap_or(default)
}

fn stable_json(arguments: &indexmap::IndexMap<String, Value>) -> String {
    serde_json::to_string(arguments).unwrap_or_default()
}

/// Bounded, cancellable, tool-augmented dialogue driver (§4.6). Owns the
/// conversation buffer and tool registry for its lifetime; one instance
/// handles one conversation.
pub struct AgentLoop<T: GenerationTransport> {
    transport: Arc<T>,
    registry: ToolRegistry,
    conversation: Conversation,
    config: RunConfig,
    cancel_token: CancelToken,
}

impl<T: GenerationTransport> AgentLoop<T> {
    pub fn new(
        transport: Arc<T>,
        registry: ToolRegistry,
        conversation: Conversation,
        config: RunConfig,
    ) -> Self {
        Self { transport, registry, conversation, config, cancel_token: CancelToken::new() }
    }

    pub fn with_cancel_token(mut self, token: CancelToken) -> Self {
        self.cancel_token = token;
        self
    }

    pub fn cancel_token(&self) -> CancelToken {
        self.cancel_token.clone()
    }

    pub fn conversation(&self) -> &Conversation {
        &self.conversation
    }

    pub fn registry_mut(&mut self) -> &mut ToolRegistry {
        &mut self.registry
    }

    /// Runs steps 1–4 of §4.6 to completion: appends `input`, streams one
    /// or more turns, dispatches any tool calls, and returns once the model
    /// produces final text, the loop is cancelled, or `max_turns` is hit.
    pub async fn run(
        &mut self,
        input: &str,
        observer: &mut dyn LoopObserver,
        images: Vec<ImageInput>,
    ) -> LoopResult {
        self.conversation.add_user(input);

        let effective_system_prompt = if self.config.agent_manages_tools {
            self.config.system_prompt.clone().unwrap_or_default()
        } else {
            format!(
                "{}\n\n{}",
                self.registry.format_for_system_prompt(),
                self.config.system_prompt.clone().unwrap_or_default()
            )
        };
        self.conversation.set_system_prompt(effective_system_prompt);

        let mut turns = Vec::new();
        let mut previous_key: Option<String> = None;
        let mut identical_count: u32 = 0;

        for turn in 1..=self.config.max_turns {
            if self.cancel_token.is_cancelled() {
                return LoopResult { aborted: true, total_turns: turn - 1, turns, ..Default::default() };
            }

            if self.conversation.needs_compaction() && turn > 1 {
                self.try_compact(observer).await;
            }

            let prompt = self.conversation.serialize();
            let options = GenerateOptions {
                server_name: self.config.server_name.clone(),
                agent_id: self.config.agent_id.clone(),
                system_prompt: None,
                images: images.clone(),
            };

            guard(|| observer.on_stream_start());

            let full_response = match self.stream_one_turn(&prompt, &options, observer).await {
                StreamOutcome::Cancelled => {
                    return LoopResult { aborted: true, total_turns: turn - 1, turns, ..Default::default() };
                }
                StreamOutcome::Text(text) => text,
            };

            self.conversation.add_assistant(&full_response);

            if self.config.agent_manages_tools {
                turns.push(LoopTurn::Text { content: full_response.clone() });
                guard(|| observer.on_turn_complete(turn));
                return LoopResult {
                    turns,
                    final_text: Some(full_response),
                    total_turns: turn,
                    hit_turn_limit: false,
                    aborted: false,
                };
            }

            let parsed = self.registry.parse_tool_calls(&full_response);
            if parsed.tool_calls.is_empty() {
                turns.push(LoopTurn::Text { content: parsed.text.clone() });
                guard(|| observer.on_turn_complete(turn));
                return LoopResult {
                    turns,
                    final_text: Some(parsed.text),
                    total_turns: turn,
                    hit_turn_limit: false,
                    aborted: false,
                };
            }

            let key = parsed
                .tool_calls
                .iter()
                .map(|c| format!("{}:{}", c.name, stable_json(&c.arguments)))
                .collect::<Vec<_>>()
                .join("|");
            if previous_key.as_deref() == Some(key.as_str()) {
                identical_count += 1;
                if identical_count >= self.config.doom_loop_threshold {
                    guard(|| observer.on_doom_loop(identical_count));
                    self.conversation.add_user(
                        "You appear to be repeating the same tool calls. Please change your approach.",
                    );
                }
            } else {
                identical_count = 0;
            }
            previous_key = Some(key);

            let mut results = Vec::with_capacity(parsed.tool_calls.len());
            for call in parsed.tool_calls {
                if self.cancel_token.is_cancelled() {
                    turns.push(LoopTurn::ToolUse { results });
                    return LoopResult { aborted: true, total_turns: turn, turns, ..Default::default() };
                }

                let id = call.id.clone();
                let name = call.name.clone();
                let arguments_json = stable_json(&call.arguments);

                let decision = guard_ret(|| observer.on_permission_check(&id, &name), Permission::Allow);
                guard(|| observer.on_tool_call_start(&id, &name, &arguments_json));

                let result = if decision == Permission::Deny {
                    ToolCallResult { id, name, output: "Permission denied".to_string(), is_error: true, duration_ms: None }
                } else {
                    self.registry.execute(call).await
                };

                guard(|| observer.on_tool_call_end(&result.id, &result.name, &result.output, result.is_error));
                self.conversation.add_tool_result(&result.id, &result.name, &result.output);
                results.push(result);
            }

            turns.push(LoopTurn::ToolUse { results });
            guard(|| observer.on_turn_complete(turn));
        }

        LoopResult {
            turns,
            final_text: None,
            total_turns: self.config.max_turns,
            hit_turn_limit: true,
            aborted: false,
        }
    }

    async fn try_compact(&mut self, observer: &mut dyn LoopObserver) {
        let summary_prompt = format!(
            "{}\n\nSummarize the conversation above in a few sentences for continued context.",
            self.conversation.serialize()
        );
        let options = GenerateOptions {
            server_name: self.config.server_name.clone(),
            agent_id: self.config.agent_id.clone(),
            system_prompt: None,
            images: vec![],
        };
        if let Ok(result) = self.transport.generate(&summary_prompt, &options).await {
            self.conversation.compact(&result.content);
            let summary = result.content;
            guard(|| observer.on_compaction(&summary));
        }
    }

    async fn stream_one_turn(
        &self,
        prompt: &str,
        options: &GenerateOptions,
        observer: &mut dyn LoopObserver,
    ) -> StreamOutcome {
        let mut full_response = String::new();
        let mut transport_error: Option<String> = None;

        match self.transport.generate_stream(prompt, options).await {
            Ok(mut stream) => loop {
                if self.cancel_token.is_cancelled() {
                    return StreamOutcome::Cancelled;
                }
                match stream.next().await {
                    Some(Ok(StreamEvent::Delta { text })) => {
                        full_response.push_str(&text);
                        guard(|| observer.on_stream_delta(&text));
                    }
                    Some(Ok(StreamEvent::ToolCall { id, name, arguments })) => {
                        guard(|| observer.on_agent_tool_call(&id, &name, &arguments));
                    }
                    Some(Ok(StreamEvent::ToolCallUpdate { id, arguments_delta })) => {
                        guard(|| observer.on_agent_tool_call_update(&id, &arguments_delta));
                    }
                    Some(Ok(StreamEvent::Complete { usage })) => {
                        if let Some(usage) = &usage {
                            report_usage(observer, usage);
                        }
                        break;
                    }
                    Some(Err(err)) => {
                        transport_error = Some(err.to_string());
                        break;
                    }
                    None => break,
                }
            },
            Err(err) => transport_error = Some(err.to_string()),
        }

        if let Some(err) = transport_error {
            let message = format!("Error communicating with the model: {err}");
            guard(|| observer.on_error(&message));
            return StreamOutcome::Text(message);
        }

        if full_response.trim().is_empty() {
            guard(|| observer.on_error("No response received from model."));
            return StreamOutcome::Text("No response received from model.".to_string());
        }

        StreamOutcome::Text(full_response)
    }
}

fn report_usage(observer: &mut dyn LoopObserver, usage: &Usage) {
    guard(|| observer.on_token_usage(usage));
}

enum StreamOutcome {
    Text(String),
    Cancelled,
}
