use stacks_tools::ToolCallResult;

/// One step recorded during a `run`: either the model produced final text,
/// or it issued one or more tool calls that were executed in order.
#[derive(Debug, Clone)]
pub enum LoopTurn {
    Text { content: String },
    ToolUse { results: Vec<ToolCallResult> },
}

/// Outcome of a single `run` invocation (§4.6 steps 3–4).
#[derive(Debug, Clone, Default)]
pub struct LoopResult {
    pub turns: Vec<LoopTurn>,
    pub final_text: Option<String>,
    pub total_turns: u32,
    pub hit_turn_limit: bool,
    pub aborted: bool,
}
