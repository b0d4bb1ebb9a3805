//! The agentic loop: a bounded, cancellable, tool-augmented dialogue
//! driver multiplexing a streaming transport, a tool registry, a
//! conversation buffer, and compaction/permission policy (§4.6).

mod cancel;
mod observer;
mod runner;
mod subagent;
mod types;

pub use cancel::CancelToken;
pub use observer::{LoopObserver, NullObserver};
pub use runner::{AgentLoop, RunConfig};
pub use subagent::LoopSubagentRunner;
pub use types::{LoopResult, LoopTurn};
