//! Safety checks
//!
//! Start-pose verification gating every playback.

pub mod verify;

pub use verify::{verify_start_pose, Deviation, VerifyReport};
