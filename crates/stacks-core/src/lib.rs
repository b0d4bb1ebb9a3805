//! Configuration loading shared by the store, library, and loop crates.
//!
//! Centralizes environment-variable fallback chains so business code never
//! repeats an `or_else` chain, and keeps `unsafe { env::set_var }` in one
//! place (required since the 2024 edition marked it unsafe).

pub mod loader;

pub use loader::{env_bool, env_optional, env_or, load_dotenv};

/// Tunables for the agentic loop (§4.6).
#[derive(Debug, Clone)]
pub struct LoopConfig {
    pub max_turns: u32,
    pub max_subagent_depth: u32,
    pub doom_loop_threshold: u32,
}

impl LoopConfig {
    pub fn from_env() -> Self {
        Self {
            max_turns: loader::env_or("STACKS_MAX_TURNS", &[], || "10".into())
                .parse()
                .unwrap_or(10),
            max_subagent_depth: loader::env_or("STACKS_MAX_SUBAGENT_DEPTH", &[], || "2".into())
                .parse()
                .unwrap_or(2),
            doom_loop_threshold: loader::env_or("STACKS_DOOM_LOOP_THRESHOLD", &[], || "3".into())
                .parse()
                .unwrap_or(3),
        }
    }
}

impl Default for LoopConfig {
    fn default() -> Self {
        Self {
            max_turns: 10,
            max_subagent_depth: 2,
            doom_loop_threshold: 3,
        }
    }
}

/// Tunables for the vector store (§4.2, §5).
#[derive(Debug, Clone)]
pub struct StoreConfig {
    pub auto_save: bool,
    pub flush_interval_ms: u64,
}

impl StoreConfig {
    pub fn from_env() -> Self {
        Self {
            auto_save: loader::env_bool("STACKS_AUTO_SAVE", &[], false),
            flush_interval_ms: loader::env_or("STACKS_FLUSH_INTERVAL_MS", &[], || "0".into())
                .parse()
                .unwrap_or(0),
        }
    }
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            auto_save: false,
            flush_interval_ms: 0,
        }
    }
}

/// Tunables for the library facade (§4.3).
#[derive(Debug, Clone)]
pub struct LibraryConfig {
    pub duplicate_threshold: f32,
    pub default_max_results: usize,
}

impl LibraryConfig {
    pub fn from_env() -> Self {
        Self {
            duplicate_threshold: loader::env_or("STACKS_DUPLICATE_THRESHOLD", &[], || "0.9".into())
                .parse()
                .unwrap_or(0.9),
            default_max_results: loader::env_or("STACKS_DEFAULT_MAX_RESULTS", &[], || "10".into())
                .parse()
                .unwrap_or(10),
        }
    }
}

impl Default for LibraryConfig {
    fn default() -> Self {
        Self {
            duplicate_threshold: 0.9,
            default_max_results: 10,
        }
    }
}

/// Conversation auto-compaction tunables (§4.4).
#[derive(Debug, Clone)]
pub struct ConversationConfig {
    pub auto_compact_chars: usize,
    pub max_messages: usize,
}

impl ConversationConfig {
    pub fn from_env() -> Self {
        Self {
            auto_compact_chars: loader::env_or("STACKS_AUTO_COMPACT_CHARS", &[], || "100000".into())
                .parse()
                .unwrap_or(100_000),
            max_messages: loader::env_or("STACKS_MAX_MESSAGES", &[], || "0".into())
                .parse()
                .unwrap_or(0),
        }
    }
}

impl Default for ConversationConfig {
    fn default() -> Self {
        Self {
            auto_compact_chars: 100_000,
            max_messages: 0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn loop_config_from_env_matches_default_when_unset() {
        let from_env = LoopConfig::from_env();
        let default = LoopConfig::default();
        assert_eq!(from_env.max_turns, default.max_turns);
        assert_eq!(from_env.max_subagent_depth, default.max_subagent_depth);
        assert_eq!(from_env.doom_loop_threshold, default.doom_loop_threshold);
    }

    #[test]
    fn store_config_from_env_matches_default_when_unset() {
        let from_env = StoreConfig::from_env();
        let default = StoreConfig::default();
        assert_eq!(from_env.auto_save, default.auto_save);
        assert_eq!(from_env.flush_interval_ms, default.flush_interval_ms);
    }

    #[test]
    fn library_config_from_env_matches_default_when_unset() {
        let from_env = LibraryConfig::from_env();
        let default = LibraryConfig::default();
        assert_eq!(from_env.duplicate_threshold, default.duplicate_threshold);
        assert_eq!(from_env.default_max_results, default.default_max_results);
    }
}
