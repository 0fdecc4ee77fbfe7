//! Process-wide cooperative cancellation.
//!
//! A single boolean, set by the UI thread (escape key) and polled by the
//! core at well-defined yield points: the start of every loop iteration,
//! before tool execution, and inside the subprocess wrappers before
//! spawning. Cancellation is never modeled as an exception — a set flag
//! makes the current request return a synthetic cancelled response.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

/// Cloneable handle over the shared cancellation boolean.
///
/// Writers are the UI thread only; the core is a read-mostly consumer.
/// Stores use release ordering, loads acquire, matching the status-field
/// convention for cross-thread UI state.
#[derive(Clone, Debug, Default)]
pub struct CancelFlag {
    flag: Arc<AtomicBool>,
}

impl CancelFlag {
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation of the in-flight user request.
    pub fn trigger(&self) {
        self.flag.store(true, Ordering::Release);
    }

    /// Clear the flag. Called at the top of each user-request cycle.
    pub fn reset(&self) {
        self.flag.store(false, Ordering::Release);
    }

    /// Whether cancellation has been requested.
    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::Acquire)
    }
}
