//! Board-agnostic core logic for the servo arm controller
//!
//! This crate contains all application logic that does not depend on
//! a specific transport or operating system:
//!
//! - Configuration types (joints, calibration, link geometry)
//! - Pulse/angle calibration and forward kinematics
//! - Pose, sequence and playlist data
//! - Recorder fed by pose-change events
//! - Start-pose safety verification
//! - Player, playlist executor and dual-arm synchronizer
//! - Control state machine and the `Arm` controller
//! - Hardware abstraction traits (actuator, pacer)

#![no_std]
#![deny(unsafe_code)]

extern crate alloc;

pub mod arm;
pub mod config;
pub mod kinematics;
pub mod motion;
pub mod record;
pub mod safety;
pub mod scheduler;
pub mod state;
pub mod traits;

pub use arm::{play_dual, Arm, ArmError};
pub use config::{ArmConfig, ConfigError, JointConfig};
pub use kinematics::{forward, CartesianPosition};
pub use motion::{Playlist, Pose, Sequence, TimedPose};
