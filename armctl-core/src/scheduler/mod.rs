//! Playback scheduling
//!
//! Single-sequence player, playlist executor and dual-arm synchronizer.
//! All three share the same start-pose gate and pacing.

pub mod dual;
pub mod player;
pub mod playlist;

pub use dual::{merge, ArmId, DualError, DualPlayer, DualReport, MergedEntry};
pub use player::{
    check_start, PlaybackError, PlaybackOutcome, PlaybackReport, PlaybackTiming, Player,
    PlayerPhase,
};
pub use playlist::{EntryFailure, PlaylistError, PlaylistExecutor, PlaylistReport, SequenceLibrary};
