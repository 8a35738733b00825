//! Generation guard: cooperative cancellation for in-flight sends.
//!
//! A process-wide monotonic counter. Every send captures the counter value
//! at its start; clearing the conversation increments it. A send's result
//! is applied only if its captured value still matches at completion, so a
//! cleared conversation can never receive a late reply. Stale strategy
//! calls run to completion; only the application of their result is
//! suppressed.

use std::sync::atomic::{AtomicU64, Ordering};

/// Generation captured at the start of a send.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct GenerationToken(u64);

/// Monotonic counter invalidating stale in-flight generations.
#[derive(Debug, Default)]
pub struct GenerationGuard {
    counter: AtomicU64,
}

impl GenerationGuard {
    pub fn new() -> Self {
        Self {
            counter: AtomicU64::new(0),
        }
    }

    /// Capture the current generation. Does not advance the counter.
    pub fn begin(&self) -> GenerationToken {
        GenerationToken(self.counter.load(Ordering::SeqCst))
    }

    /// Advance the generation, invalidating every outstanding token.
    pub fn invalidate(&self) {
        self.counter.fetch_add(1, Ordering::SeqCst);
    }

    /// Whether a result captured under `token` may still be applied.
    pub fn is_valid(&self, token: GenerationToken) -> bool {
        self.counter.load(Ordering::SeqCst) == token.0
    }
}
