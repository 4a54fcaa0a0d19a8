//! Cooperative cancellation shared by every trial of a batch

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Checked between years; a cancelled trial stops at the next boundary
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}
