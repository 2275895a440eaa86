//! Control handles for recurring background tasks.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// A lightweight, cloneable stop signal for a background loop.
///
/// Loops check the signal between cycles: a stop request takes effect before
/// the next tick and never interrupts work already in flight.
#[derive(Debug, Clone, Default)]
pub struct StopHandle {
    stop_signal: Arc<AtomicBool>,
}

impl StopHandle {
    /// Create a new handle with the signal unset.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Signal the loop to stop before its next cycle.
    pub fn stop(&self) {
        self.stop_signal.store(true, Ordering::SeqCst);
    }

    /// Check if the stop signal has been sent.
    #[must_use]
    pub fn should_stop(&self) -> bool {
        self.stop_signal.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stop_handle_new() {
        let handle = StopHandle::new();
        assert!(!handle.should_stop());
    }

    #[test]
    fn test_stop_handle_stop() {
        let handle = StopHandle::new();
        handle.stop();
        assert!(handle.should_stop());
    }

    #[test]
    fn test_stop_handle_clone_shares_signal() {
        let handle = StopHandle::new();
        let clone = handle.clone();

        handle.stop();
        assert!(clone.should_stop());
    }
}
