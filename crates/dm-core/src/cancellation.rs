//! A minimal cooperative cancellation signal: the orchestrator raises
//! it, the phase engine checks it between sub-items and at phase
//! boundaries. In-flight HTTP/LLM calls are allowed to run to their own
//! timeouts; this flag only gates whether new work starts.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

#[derive(Debug, Clone, Default)]
pub struct CancellationToken {
    flag: Arc<AtomicBool>,
}

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.flag.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }
}
