//! User interrupt signalling.
//!
//! The Ctrl+C handler runs on its own thread and can only flip a flag.  The chat engine clears
//! the flag before each prompt and races it against the response stream while streaming.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

const POLL_INTERVAL: Duration = Duration::from_millis(25);

/// A shared, clonable interrupt flag.
#[derive(Debug, Clone, Default)]
pub struct Interrupt {
    flag: Arc<AtomicBool>,
}

impl Interrupt {
    /// Creates a new, untriggered interrupt flag.
    pub fn new() -> Self {
        Self::default()
    }

    /// Signals an interrupt.  Safe to call from a signal handler thread.
    pub fn trigger(&self) {
        self.flag.store(true, Ordering::Relaxed);
    }

    /// Clears any pending interrupt.
    pub fn clear(&self) {
        self.flag.store(false, Ordering::Relaxed);
    }

    /// Returns true if an interrupt is pending.
    pub fn is_triggered(&self) -> bool {
        self.flag.load(Ordering::Relaxed)
    }

    /// Completes once an interrupt is pending.
    pub async fn triggered(&self) {
        while !self.is_triggered() {
            tokio::time::sleep(POLL_INTERVAL).await;
        }
    }
}
