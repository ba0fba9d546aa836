//! Playback pacing trait

/// How a wait ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum WaitOutcome {
    /// The target time was reached
    Elapsed,
    /// Playback was cancelled while waiting
    Cancelled,
}

/// Clock and cancellation source for playback
///
/// Waits are the only place playback can be cancelled, so cancellation
/// always lands between two pose writes.
pub trait Pacer {
    /// Reset the playback time origin to now
    fn restart(&mut self);

    /// Block until `offset_ms` after the origin, or until cancelled
    ///
    /// Returns immediately if the offset has already passed.
    fn wait_until(&mut self, offset_ms: u32) -> WaitOutcome;

    /// Whether cancellation has been requested
    fn is_cancelled(&self) -> bool;
}

impl<T: Pacer + ?Sized> Pacer for &mut T {
    fn restart(&mut self) {
        (**self).restart()
    }

    fn wait_until(&mut self, offset_ms: u32) -> WaitOutcome {
        (**self).wait_until(offset_ms)
    }

    fn is_cancelled(&self) -> bool {
        (**self).is_cancelled()
    }
}
