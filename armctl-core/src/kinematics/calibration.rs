//! Joint calibration model
//!
//! Maps raw servo pulses to joint angles and back:
//!
//! ```text
//! angle = sign * (pulse - (neutral + trim)) * radians_per_unit
//! ```
//!
//! At `neutral + trim` every joint reads zero, which is the straight-up
//! reference pose of the kinematic chain.

use heapless::Vec;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::config::{JointConfig, MAX_JOINTS, MAX_MAGNETS};
use crate::motion::Pose;

/// Direction a joint turns for increasing pulse
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase"))]
pub enum Direction {
    /// Increasing pulse increases the angle
    #[default]
    Normal,
    /// Servo is mounted mirrored; increasing pulse decreases the angle
    Reversed,
}

impl Direction {
    /// Sign factor applied to the pulse delta
    pub fn sign(self) -> f32 {
        match self {
            Direction::Normal => 1.0,
            Direction::Reversed => -1.0,
        }
    }
}

/// Calibration tuple of a single joint
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct JointCalibration {
    /// Nominal center pulse in µs
    pub neutral: u16,
    /// Additive correction to the neutral pulse
    pub trim: i16,
    /// Mounting direction
    pub direction: Direction,
    /// Joint rotation per pulse unit
    pub radians_per_unit: f32,
}

impl JointCalibration {
    /// Build a calibration from a servo's total travel in degrees over a
    /// pulse span (e.g. 270° over 2000 µs)
    pub fn from_travel(neutral: u16, travel_deg: f32, span_units: u16, direction: Direction) -> Self {
        Self {
            neutral,
            trim: 0,
            direction,
            radians_per_unit: travel_deg.to_radians() / span_units as f32,
        }
    }

    /// Pulse at which the joint reads zero
    pub fn zero_pulse(&self) -> f32 {
        self.neutral as f32 + self.trim as f32
    }

    /// Convert a pulse to a joint angle in radians
    ///
    /// Pure function; callers clamp the pulse to the joint range first.
    pub fn pulse_to_angle(&self, pulse: u16) -> f32 {
        self.direction.sign() * (pulse as f32 - self.zero_pulse()) * self.radians_per_unit
    }

    /// Exact inverse of [`pulse_to_angle`](Self::pulse_to_angle), unrounded
    pub fn angle_to_pulse(&self, angle: f32) -> f32 {
        self.zero_pulse() + self.direction.sign() * angle / self.radians_per_unit
    }
}

/// Applies each joint's calibration to a whole pose
#[derive(Debug, Clone, Copy)]
pub struct CalibrationModel<'a> {
    joints: &'a [JointConfig],
}

impl<'a> CalibrationModel<'a> {
    /// Create a model over the arm's joints
    pub fn new(joints: &'a [JointConfig]) -> Self {
        Self { joints }
    }

    /// Joint angles in radians, in joint order
    ///
    /// Pulses are clamped to each joint's range before conversion.
    pub fn joint_angles(&self, pose: &Pose) -> Vec<f32, MAX_JOINTS> {
        self.joints
            .iter()
            .zip(pose.pulses())
            .map(|(joint, &pulse)| joint.pulse_to_angle(pulse))
            .collect()
    }

    /// Joint angles in degrees, for display
    pub fn joint_angles_deg(&self, pose: &Pose) -> Vec<f32, MAX_JOINTS> {
        self.joint_angles(pose)
            .iter()
            .map(|a| a.to_degrees())
            .collect()
    }

    /// Pose that puts every joint at the given angles
    ///
    /// Angles beyond a joint's travel saturate at the pulse limits.
    pub fn pose_for_angles(&self, angles: &[f32], magnets: &[bool]) -> Pose {
        let pulses: Vec<u16, MAX_JOINTS> = self
            .joints
            .iter()
            .zip(angles)
            .map(|(joint, &angle)| joint.angle_to_pulse(angle))
            .collect();
        Pose::from_parts(pulses, magnets.iter().copied().take(MAX_MAGNETS).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ArmConfig;
    use core::f32::consts::{FRAC_PI_2, PI};
    use proptest::prelude::*;

    fn quarter_turn_per_thousand() -> JointCalibration {
        JointCalibration {
            neutral: 1500,
            trim: 0,
            direction: Direction::Normal,
            radians_per_unit: PI / 2000.0,
        }
    }

    #[test]
    fn test_neutral_is_zero() {
        let cal = quarter_turn_per_thousand();
        assert_eq!(cal.pulse_to_angle(1500), 0.0);
    }

    #[test]
    fn test_thousand_units_is_quarter_turn() {
        let cal = quarter_turn_per_thousand();
        assert!((cal.pulse_to_angle(2500) - FRAC_PI_2).abs() < 1e-6);
        assert!((cal.pulse_to_angle(500) + FRAC_PI_2).abs() < 1e-6);
    }

    #[test]
    fn test_trim_shifts_zero() {
        let mut cal = quarter_turn_per_thousand();
        cal.trim = -50;
        assert_eq!(cal.zero_pulse(), 1450.0);
        assert_eq!(cal.pulse_to_angle(1450), 0.0);
        assert!(cal.pulse_to_angle(1500) > 0.0);
    }

    #[test]
    fn test_reversed_direction_flips_sign() {
        let mut cal = quarter_turn_per_thousand();
        let normal = cal.pulse_to_angle(1800);
        cal.direction = Direction::Reversed;
        assert_eq!(cal.pulse_to_angle(1800), -normal);
    }

    #[test]
    fn test_from_travel() {
        let cal = JointCalibration::from_travel(1500, 270.0, 2000, Direction::Normal);
        let deg = cal.pulse_to_angle(2500).to_degrees();
        assert!((deg - 135.0).abs() < 1e-3);
    }

    #[test]
    fn test_model_degrees_at_neutral() {
        let config = ArmConfig::default();
        let model = CalibrationModel::new(config.joints());
        let degrees = model.joint_angles_deg(&config.neutral_pose());
        assert_eq!(degrees.len(), 4);
        assert!(degrees.iter().all(|d| d.abs() < 1e-4));
    }

    #[test]
    fn test_pose_for_angles_saturates() {
        let config = ArmConfig::default();
        let model = CalibrationModel::new(config.joints());
        let pose = model.pose_for_angles(&[10.0, -10.0, 0.0, 0.0], &[false, false]);
        assert_eq!(pose.pulses(), &[2500, 500, 1500, 1500]);
    }

    proptest! {
        #[test]
        fn prop_angle_roundtrip(
            pulse in 500u16..=2500,
            trim in -100i16..=100,
            reversed in any::<bool>(),
        ) {
            let cal = JointCalibration {
                neutral: 1500,
                trim,
                direction: if reversed { Direction::Reversed } else { Direction::Normal },
                radians_per_unit: 270f32.to_radians() / 2000.0,
            };
            let angle = cal.pulse_to_angle(pulse);
            let back = cal.angle_to_pulse(angle);
            prop_assert!((back - pulse as f32).abs() < 0.01);
            prop_assert!((cal.pulse_to_angle(libm::roundf(back) as u16) - angle).abs() < 1e-4);
        }

        #[test]
        fn prop_trim_change_is_isolated(
            joint in 1u8..=4,
            trim in -200i16..=200,
            pulses in proptest::array::uniform4(500u16..=2500),
        ) {
            let base = ArmConfig::default();
            let mut trimmed = base.clone();
            trimmed.set_trim(joint, trim).unwrap();

            let pose = Pose::new(&pulses, &[false, false]).unwrap();
            let before = CalibrationModel::new(base.joints()).joint_angles(&pose);
            let after = CalibrationModel::new(trimmed.joints()).joint_angles(&pose);

            prop_assert_eq!(before.len(), after.len());
            for (slot, (a, b)) in before.iter().zip(after.iter()).enumerate() {
                if slot + 1 != joint as usize {
                    prop_assert_eq!(a, b);
                }
            }
        }
    }
}
