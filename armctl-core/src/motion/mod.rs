//! Motion data
//!
//! Poses, recorded sequences and playlists.

pub mod playlist;
pub mod pose;
pub mod sequence;

pub use playlist::Playlist;
pub use pose::Pose;
pub use sequence::{Sequence, SequenceError, TimedPose};
