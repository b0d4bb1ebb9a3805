use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// A one-way cancellation signal, cheap to clone and share across the loop
/// and its caller. Once cancelled it cannot be uncancelled.
#[derive(Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self(Arc::new(AtomicBool::new(false)))
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}
