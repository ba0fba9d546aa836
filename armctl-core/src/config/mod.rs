//! Configuration types
//!
//! Board-agnostic arm configuration: joints, calibration, link geometry and
//! persisted trim overrides.

pub mod arm;
pub mod calibration;
pub mod geometry;
pub mod joint;

pub use arm::*;
pub use calibration::{CalibrationData, TrimEntry};
pub use geometry::*;
pub use joint::*;
