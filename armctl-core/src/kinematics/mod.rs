//! Calibration and forward kinematics
//!
//! Raw pulses go through [`calibration`] to joint angles, and through
//! [`solver`] to the tool tip position.

pub mod calibration;
pub mod solver;

pub use calibration::{CalibrationModel, Direction, JointCalibration};
pub use solver::{forward, CartesianPosition, KinematicChain};
