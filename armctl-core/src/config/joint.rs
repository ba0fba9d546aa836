//! Per-joint configuration

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::kinematics::calibration::JointCalibration;

/// Default lowest servo pulse (µs)
pub const DEFAULT_PULSE_MIN: u16 = 500;

/// Default highest servo pulse (µs)
pub const DEFAULT_PULSE_MAX: u16 = 2500;

/// Default neutral pulse (µs)
pub const DEFAULT_NEUTRAL: u16 = 1500;

/// Role of a joint in the kinematic chain
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase"))]
pub enum JointAxis {
    /// Base rotation about the vertical axis
    Yaw,
    /// Rotation about a horizontal axis, parallel to the other pitch joints
    #[default]
    Pitch,
    /// Does not move the tool tip (e.g. tool roll)
    Free,
}

/// Configuration of one servo joint
///
/// Immutable once the arm is configured.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct JointConfig {
    /// Joint number (1-based, as used on the wire)
    pub id: u8,
    /// Lowest accepted pulse
    pub pulse_min: u16,
    /// Highest accepted pulse
    pub pulse_max: u16,
    /// Pulse/angle calibration
    pub calibration: JointCalibration,
    /// Kinematic role
    pub axis: JointAxis,
    /// Invert manual jog direction (operator preference, not kinematics)
    pub jog_inverted: bool,
}

impl JointConfig {
    /// Create a joint with the default pulse window
    pub fn new(id: u8, calibration: JointCalibration, axis: JointAxis) -> Self {
        Self {
            id,
            pulse_min: DEFAULT_PULSE_MIN,
            pulse_max: DEFAULT_PULSE_MAX,
            calibration,
            axis,
            jog_inverted: false,
        }
    }

    /// Clamp any pulse value into this joint's range
    pub fn clamp(&self, pulse: i32) -> u16 {
        pulse.clamp(self.pulse_min as i32, self.pulse_max as i32) as u16
    }

    /// Whether a pulse lies inside this joint's range
    pub fn contains(&self, pulse: u16) -> bool {
        (self.pulse_min..=self.pulse_max).contains(&pulse)
    }

    /// Calibrated neutral pulse (neutral + trim), clamped to range
    pub fn neutral_pulse(&self) -> u16 {
        self.clamp(self.calibration.neutral as i32 + self.calibration.trim as i32)
    }

    /// Joint angle in radians for a pulse, clamping it to range first
    pub fn pulse_to_angle(&self, pulse: u16) -> f32 {
        self.calibration.pulse_to_angle(self.clamp(pulse as i32))
    }

    /// Pulse for a joint angle in radians, rounded and clamped to range
    pub fn angle_to_pulse(&self, angle: f32) -> u16 {
        let pulse = libm::roundf(self.calibration.angle_to_pulse(angle));
        if pulse.is_nan() {
            return self.neutral_pulse();
        }
        // Float-to-int casts saturate
        self.clamp(pulse as i32)
    }

    /// Pulse after a manual jog of `step` units, honoring jog inversion
    pub fn jogged(&self, current: u16, step: i32) -> u16 {
        let step = if self.jog_inverted { -step } else { step };
        self.clamp(current as i32 + step)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kinematics::calibration::Direction;

    fn joint() -> JointConfig {
        JointConfig::new(
            2,
            JointCalibration::from_travel(1500, 270.0, 2000, Direction::Normal),
            JointAxis::Pitch,
        )
    }

    #[test]
    fn test_clamp() {
        let j = joint();
        assert_eq!(j.clamp(100), 500);
        assert_eq!(j.clamp(3000), 2500);
        assert_eq!(j.clamp(1234), 1234);
        assert!(j.contains(500));
        assert!(!j.contains(2501));
    }

    #[test]
    fn test_neutral_pulse_includes_trim() {
        let mut j = joint();
        j.calibration.trim = -50;
        assert_eq!(j.neutral_pulse(), 1450);
        j.calibration.trim = 2000;
        assert_eq!(j.neutral_pulse(), 2500);
    }

    #[test]
    fn test_angle_to_pulse_rounds_and_clamps() {
        let j = joint();
        let angle = j.pulse_to_angle(1733);
        assert_eq!(j.angle_to_pulse(angle), 1733);
        assert_eq!(j.angle_to_pulse(100.0), 2500);
        assert_eq!(j.angle_to_pulse(-100.0), 500);
        assert_eq!(j.angle_to_pulse(f32::NAN), 1500);
    }

    #[test]
    fn test_pulse_to_angle_clamps_input() {
        let j = joint();
        assert_eq!(j.pulse_to_angle(9000), j.pulse_to_angle(2500));
    }

    #[test]
    fn test_jog_inversion() {
        let mut j = joint();
        assert_eq!(j.jogged(1500, 10), 1510);
        j.jog_inverted = true;
        assert_eq!(j.jogged(1500, 10), 1490);
        assert_eq!(j.jogged(505, 10), 500);
    }
}
