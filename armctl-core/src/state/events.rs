//! Events that trigger control state transitions

/// Events that can trigger control transitions
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Event {
    /// Operator starts a recording
    StartRecording,
    /// Operator stops the recording
    StopRecording,
    /// Playback requested (single, playlist or dual)
    StartPlayback,
    /// Start pose matched
    VerifyPassed,
    /// Start pose did not match
    VerifyFailed,
    /// Last pose written, or the run halted
    PlaybackFinished,
    /// Cancellation observed between pose writes
    Cancel,
}
