//! Tracing init for the demo binary. Library crates only emit events;
//! installing the global subscriber is the binary's job.

use std::env;

use tracing_subscriber::EnvFilter;

/// Initialize tracing. Call once at process startup.
/// `STACKS_LOG_LEVEL` overrides the default; `RUST_LOG` still wins if set.
pub fn init_tracing() {
    let level = env::var("STACKS_LOG_LEVEL").unwrap_or_else(|_| "stacks=info".to_string());
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    tracing_subscriber::fmt().with_env_filter(filter).with_target(true).init();
}
