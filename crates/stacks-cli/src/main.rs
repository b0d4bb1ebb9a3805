//! Wires the store, library, tool registry, transport, and loop crates
//! together behind a minimal CLI. Rendering, slash commands, and skill
//! discovery are out of scope for the core; this binary exists so the
//! workspace produces something runnable end-to-end.

mod fs;
mod observability;

use std::io::{self, Read};
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;

use stacks_conversation::Conversation;
use stacks_core::{ConversationConfig, LibraryConfig, LoopConfig, StoreConfig};
use stacks_library::{EmbeddingProvider, Library};
use stacks_loop::{AgentLoop, NullObserver, RunConfig};
use stacks_store::{InMemoryBackend, Stacks};
use stacks_tools::{register_library_tools, register_task_tools, register_vfs_tools, LibraryAdapter, TaskStore, ToolRegistry};
use stacks_transport::OpenAiTransport;

/// Deterministic placeholder embedder (character-frequency hashing into a
/// fixed-width vector) so the demo runs without a live embedding API. A
/// real deployment injects its own [`EmbeddingProvider`].
struct HashEmbedder {
    dims: usize,
}

impl EmbeddingProvider for HashEmbedder {
    fn embed(&self, text: &str) -> Result<Vec<f32>, stacks_errors::LibraryError> {
        let mut v = vec![0.0f32; self.dims];
        for (i, byte) in text.bytes().enumerate() {
            v[i % self.dims] += byte as f32;
        }
        Ok(v)
    }
}

#[derive(Parser, Debug)]
#[command(name = "stacks")]
#[command(author, version, about = "Demo CLI for the agentic loop, vector library, and tool registry", long_about = None)]
struct Cli {
    /// OpenAI-compatible API base URL.
    #[arg(long, env = "STACKS_API_BASE", default_value = "https://api.openai.com/v1")]
    api_base: String,

    /// API key for the transport.
    #[arg(long, env = "STACKS_API_KEY", default_value = "")]
    api_key: String,

    /// Model name passed to the transport.
    #[arg(long, env = "STACKS_MODEL", default_value = "gpt-4o-mini")]
    model: String,

    /// Root directory the vfs_* tools are scoped to.
    #[arg(long, env = "STACKS_VFS_ROOT", default_value = ".")]
    vfs_root: String,

    /// System prompt prepended ahead of the tool catalog.
    #[arg(long)]
    system_prompt: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    observability::init_tracing();
    let cli = Cli::parse();

    let mut input = String::new();
    io::stdin().read_to_string(&mut input).context("reading prompt from stdin")?;
    let input = input.trim();
    if input.is_empty() {
        anyhow::bail!("no input provided on stdin");
    }

    let loop_config = LoopConfig::from_env();
    let store_config = StoreConfig::from_env();
    let library_config = LibraryConfig::from_env();

    let stacks = Arc::new(Stacks::new(InMemoryBackend::new(), store_config));
    stacks.load().context("loading vector store")?;
    stacks.spawn_flush_task();
    let embedder = Arc::new(HashEmbedder { dims: 32 });
    let library = Arc::new(Library::new(Arc::clone(&stacks), embedder, library_config));

    let mut registry = ToolRegistry::new();
    register_library_tools(&mut registry, Arc::new(LibraryAdapter(Arc::clone(&library))));
    register_vfs_tools(&mut registry, Arc::new(fs::LocalFs::new(cli.vfs_root.clone())));
    register_task_tools(&mut registry, Arc::new(TaskStore::new()));

    let transport = Arc::new(OpenAiTransport::new(cli.api_base, cli.api_key, cli.model));
    let conversation = Conversation::new(ConversationConfig::from_env());
    let run_config = RunConfig {
        max_turns: loop_config.max_turns,
        server_name: None,
        agent_id: None,
        system_prompt: cli.system_prompt,
        agent_manages_tools: false,
        doom_loop_threshold: loop_config.doom_loop_threshold,
    };

    let mut agent_loop = AgentLoop::new(transport, registry, conversation, run_config);
    let result = agent_loop.run(input, &mut NullObserver, vec![]).await;

    let outcome = if result.aborted {
        Err(anyhow::anyhow!("loop aborted after {} turns", result.total_turns))
    } else if result.hit_turn_limit {
        println!("(turn limit reached after {} turns without a final answer)", result.total_turns);
        Ok(())
    } else {
        println!("{}", result.final_text.unwrap_or_default());
        Ok(())
    };

    stacks.dispose().context("flushing vector store on shutdown")?;
    outcome
}
