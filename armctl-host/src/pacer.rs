//! Wall-clock playback pacing
//!
//! Waits sleep in short slices and check a shared cancel flag between them,
//! so a Ctrl-C lands between two pose writes within one slice.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use armctl_core::traits::{Pacer, WaitOutcome};

/// Longest single sleep while waiting
pub const POLL_SLICE: Duration = Duration::from_millis(10);

/// Pacer backed by `std::thread::sleep`
#[derive(Debug, Clone)]
pub struct ThreadPacer {
    origin: Instant,
    cancel: Arc<AtomicBool>,
}

impl Default for ThreadPacer {
    fn default() -> Self {
        Self::new()
    }
}

impl ThreadPacer {
    pub fn new() -> Self {
        Self::with_flag(Arc::new(AtomicBool::new(false)))
    }

    /// Pacer observing an existing cancel flag (e.g. set by a signal handler)
    pub fn with_flag(cancel: Arc<AtomicBool>) -> Self {
        Self {
            origin: Instant::now(),
            cancel,
        }
    }
}

impl Pacer for ThreadPacer {
    fn restart(&mut self) {
        self.origin = Instant::now();
    }

    fn wait_until(&mut self, offset_ms: u32) -> WaitOutcome {
        let target = self.origin + Duration::from_millis(offset_ms as u64);
        loop {
            if self.is_cancelled() {
                return WaitOutcome::Cancelled;
            }
            let now = Instant::now();
            if now >= target {
                return WaitOutcome::Elapsed;
            }
            thread::sleep((target - now).min(POLL_SLICE));
        }
    }

    fn is_cancelled(&self) -> bool {
        self.cancel.load(Ordering::SeqCst)
    }
}
