//! Whole-arm configuration and validation

use core::fmt;

use heapless::{String, Vec};

use armctl_protocol::Limits;

use super::geometry::{Geometry, LinkConfig, ToolOffset};
use super::joint::{JointAxis, JointConfig, DEFAULT_NEUTRAL};
use crate::kinematics::calibration::{Direction, JointCalibration};
use crate::motion::Pose;

/// Maximum label length
pub const MAX_LABEL_LEN: usize = 32;

/// Maximum joints per arm
pub const MAX_JOINTS: usize = 8;

/// Maximum electromagnets per arm
pub const MAX_MAGNETS: usize = 4;

/// Default start-pose tolerance in pulse units
pub const DEFAULT_TOLERANCE: u16 = 20;

/// Configuration validation errors
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ConfigError {
    /// Arm has no joints
    NoJoints,
    /// More joints than [`MAX_JOINTS`]
    TooManyJoints,
    /// More magnets than [`MAX_MAGNETS`]
    TooManyMagnets,
    /// More links than the chain can hold
    TooManyLinks,
    /// Arm name longer than [`MAX_LABEL_LEN`]
    NameTooLong,
    /// Joint ids must run 1..=N in order
    JointIdOutOfOrder { expected: u8, found: u8 },
    /// `pulse_min` is not below `pulse_max`
    InvalidRange { joint: u8 },
    /// Neutral pulse lies outside the joint range
    NeutralOutOfRange { joint: u8 },
    /// Scale is zero, negative or not finite
    InvalidScale { joint: u8 },
    /// More than one joint is marked as base yaw
    MultipleYawJoints,
    /// No joint with this id
    UnknownJoint { joint: u8 },
    /// A link references a joint id that does not exist
    UnknownLinkJoint { joint: u8 },
    /// A link references a joint that is not a pitch joint
    LinkJointNotPitch { joint: u8 },
    /// Two links reference the same pitch joint
    DuplicateLinkJoint { joint: u8 },
    /// A link or tool offset is not finite
    InvalidGeometry,
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::NoJoints => f.write_str("arm has no joints"),
            ConfigError::TooManyJoints => write!(f, "more than {} joints", MAX_JOINTS),
            ConfigError::TooManyMagnets => write!(f, "more than {} magnets", MAX_MAGNETS),
            ConfigError::TooManyLinks => f.write_str("too many links"),
            ConfigError::NameTooLong => write!(f, "name longer than {} bytes", MAX_LABEL_LEN),
            ConfigError::JointIdOutOfOrder { expected, found } => {
                write!(f, "joint id {} found where {} was expected", found, expected)
            }
            ConfigError::InvalidRange { joint } => {
                write!(f, "joint {}: pulse_min must be below pulse_max", joint)
            }
            ConfigError::NeutralOutOfRange { joint } => {
                write!(f, "joint {}: neutral outside pulse range", joint)
            }
            ConfigError::InvalidScale { joint } => {
                write!(f, "joint {}: scale must be positive", joint)
            }
            ConfigError::MultipleYawJoints => f.write_str("more than one yaw joint"),
            ConfigError::UnknownJoint { joint } => write!(f, "unknown joint {}", joint),
            ConfigError::UnknownLinkJoint { joint } => {
                write!(f, "link references unknown joint {}", joint)
            }
            ConfigError::LinkJointNotPitch { joint } => {
                write!(f, "link references joint {} which is not a pitch joint", joint)
            }
            ConfigError::DuplicateLinkJoint { joint } => {
                write!(f, "joint {} drives more than one link", joint)
            }
            ConfigError::InvalidGeometry => f.write_str("link offsets must be finite"),
        }
    }
}

/// Validated arm configuration
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct ArmConfig {
    name: String<MAX_LABEL_LEN>,
    tolerance: u16,
    magnets: u8,
    joints: Vec<JointConfig, MAX_JOINTS>,
    geometry: Geometry,
}

impl Default for ArmConfig {
    /// Four-joint desk arm with a dual electromagnet tool
    fn default() -> Self {
        let standard = |dir| JointCalibration::from_travel(DEFAULT_NEUTRAL, 270.0, 2000, dir);

        let mut shoulder = standard(Direction::Normal);
        shoulder.trim = -50;

        let mut joints = Vec::new();
        for joint in [
            JointConfig::new(1, standard(Direction::Normal), JointAxis::Yaw),
            JointConfig::new(2, shoulder, JointAxis::Pitch),
            JointConfig::new(3, standard(Direction::Reversed), JointAxis::Pitch),
            JointConfig::new(
                4,
                JointCalibration::from_travel(DEFAULT_NEUTRAL, 180.0, 2000, Direction::Normal),
                JointAxis::Pitch,
            ),
        ] {
            let _ = joints.push(joint);
        }

        let mut links = Vec::new();
        for link in [
            LinkConfig::column(62.3),
            LinkConfig::pitched(2, 120.0),
            LinkConfig::pitched(3, 93.85),
            LinkConfig::pitched(4, 0.0),
        ] {
            let _ = links.push(link);
        }

        let mut name = String::new();
        let _ = name.push_str("arm");

        Self {
            name,
            tolerance: DEFAULT_TOLERANCE,
            magnets: 2,
            joints,
            geometry: Geometry {
                links,
                tool: ToolOffset {
                    length: 45.6,
                    lateral: 4.9,
                },
            },
        }
    }
}

impl ArmConfig {
    /// Build and validate a configuration
    pub fn new(
        name: &str,
        joints: &[JointConfig],
        magnets: u8,
        geometry: Geometry,
        tolerance: u16,
    ) -> Result<Self, ConfigError> {
        let name = String::try_from(name).map_err(|_| ConfigError::NameTooLong)?;
        let joints = Vec::from_slice(joints).map_err(|_| ConfigError::TooManyJoints)?;
        let config = Self {
            name,
            tolerance,
            magnets,
            joints,
            geometry,
        };
        config.validate()?;
        Ok(config)
    }

    /// Check every configuration invariant
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.joints.is_empty() {
            return Err(ConfigError::NoJoints);
        }
        if self.magnets as usize > MAX_MAGNETS {
            return Err(ConfigError::TooManyMagnets);
        }

        let mut yaw_seen = false;
        for (index, joint) in self.joints.iter().enumerate() {
            let expected = index as u8 + 1;
            if joint.id != expected {
                return Err(ConfigError::JointIdOutOfOrder {
                    expected,
                    found: joint.id,
                });
            }
            if joint.pulse_min >= joint.pulse_max {
                return Err(ConfigError::InvalidRange { joint: joint.id });
            }
            if !joint.contains(joint.calibration.neutral) {
                return Err(ConfigError::NeutralOutOfRange { joint: joint.id });
            }
            let scale = joint.calibration.radians_per_unit;
            if !scale.is_finite() || scale <= 0.0 {
                return Err(ConfigError::InvalidScale { joint: joint.id });
            }
            if joint.axis == JointAxis::Yaw {
                if yaw_seen {
                    return Err(ConfigError::MultipleYawJoints);
                }
                yaw_seen = true;
            }
        }

        let mut driven = [false; MAX_JOINTS];
        for link in &self.geometry.links {
            if !(link.forward.is_finite() && link.lateral.is_finite() && link.up.is_finite()) {
                return Err(ConfigError::InvalidGeometry);
            }
            if let Some(id) = link.joint {
                let joint = self
                    .joint(id)
                    .ok_or(ConfigError::UnknownLinkJoint { joint: id })?;
                if joint.axis != JointAxis::Pitch {
                    return Err(ConfigError::LinkJointNotPitch { joint: id });
                }
                let slot = &mut driven[id as usize - 1];
                if *slot {
                    return Err(ConfigError::DuplicateLinkJoint { joint: id });
                }
                *slot = true;
            }
        }
        let tool = &self.geometry.tool;
        if !(tool.length.is_finite() && tool.lateral.is_finite()) {
            return Err(ConfigError::InvalidGeometry);
        }

        Ok(())
    }

    /// Arm name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Start-pose tolerance in pulse units
    pub fn tolerance(&self) -> u16 {
        self.tolerance
    }

    /// Override the start-pose tolerance
    pub fn set_tolerance(&mut self, tolerance: u16) {
        self.tolerance = tolerance;
    }

    /// Number of electromagnets
    pub fn magnet_count(&self) -> u8 {
        self.magnets
    }

    /// Number of joints
    pub fn joint_count(&self) -> u8 {
        self.joints.len() as u8
    }

    /// All joints in id order
    pub fn joints(&self) -> &[JointConfig] {
        &self.joints
    }

    /// Look up a joint by its 1-based id
    pub fn joint(&self, id: u8) -> Option<&JointConfig> {
        (id as usize).checked_sub(1).and_then(|i| self.joints.get(i))
    }

    /// Chain geometry
    pub fn geometry(&self) -> &Geometry {
        &self.geometry
    }

    /// Replace one joint's trim
    pub fn set_trim(&mut self, id: u8, trim: i16) -> Result<(), ConfigError> {
        let index = (id as usize)
            .checked_sub(1)
            .filter(|&i| i < self.joints.len())
            .ok_or(ConfigError::UnknownJoint { joint: id })?;
        self.joints[index].calibration.trim = trim;
        Ok(())
    }

    /// Limits for validating grammar commands against this arm
    ///
    /// Uses the widest pulse window; per-joint ranges are enforced by the
    /// controller.
    pub fn limits(&self) -> Limits {
        Limits {
            joints: self.joint_count(),
            magnets: self.magnets,
            pulse_min: self.joints.iter().map(|j| j.pulse_min).min().unwrap_or(0),
            pulse_max: self.joints.iter().map(|j| j.pulse_max).max().unwrap_or(u16::MAX),
        }
    }

    /// Every joint at neutral + trim, magnets released
    pub fn neutral_pose(&self) -> Pose {
        Pose::from_parts(
            self.joints.iter().map(JointConfig::neutral_pulse).collect(),
            (0..self.magnets).map(|_| false).collect(),
        )
    }

    /// Copy of `pose` with every pulse clamped to its joint range
    pub fn clamp_pose(&self, pose: &Pose) -> Pose {
        let pulses = self
            .joints
            .iter()
            .zip(pose.pulses())
            .map(|(joint, &pulse)| joint.clamp(pulse as i32))
            .collect();
        Pose::from_parts(pulses, pose.magnets().iter().copied().collect())
    }

    /// Whether a pose carries exactly this arm's joints and magnets
    pub fn fits(&self, pose: &Pose) -> bool {
        pose.joint_count() == self.joints.len() && pose.magnet_count() == self.magnets as usize
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_valid() {
        let config = ArmConfig::default();
        assert_eq!(config.validate(), Ok(()));
        assert_eq!(config.joint_count(), 4);
        assert_eq!(config.magnet_count(), 2);
        assert_eq!(config.tolerance(), DEFAULT_TOLERANCE);
        assert_eq!(config.name(), "arm");
    }

    #[test]
    fn test_default_neutral_pose() {
        let pose = ArmConfig::default().neutral_pose();
        assert_eq!(pose.pulses(), &[1500, 1450, 1500, 1500]);
        assert_eq!(pose.magnets(), &[false, false]);
    }

    #[test]
    fn test_joint_lookup() {
        let config = ArmConfig::default();
        assert_eq!(config.joint(1).map(|j| j.axis), Some(JointAxis::Yaw));
        assert!(config.joint(0).is_none());
        assert!(config.joint(5).is_none());
    }

    #[test]
    fn test_rejects_empty_joints() {
        let result = ArmConfig::new("x", &[], 0, Geometry::default(), 20);
        assert_eq!(result, Err(ConfigError::NoJoints));
    }

    #[test]
    fn test_rejects_out_of_order_ids() {
        let base = ArmConfig::default();
        let mut joints: Vec<JointConfig, MAX_JOINTS> = Vec::from_slice(base.joints()).unwrap();
        joints[1].id = 3;
        let result = ArmConfig::new("x", &joints, 0, Geometry::default(), 20);
        assert_eq!(
            result,
            Err(ConfigError::JointIdOutOfOrder {
                expected: 2,
                found: 3
            })
        );
    }

    #[test]
    fn test_rejects_bad_scale_and_neutral() {
        let base = ArmConfig::default();
        let mut joints: Vec<JointConfig, MAX_JOINTS> = Vec::from_slice(base.joints()).unwrap();
        joints[0].calibration.radians_per_unit = 0.0;
        assert_eq!(
            ArmConfig::new("x", &joints, 0, Geometry::default(), 20),
            Err(ConfigError::InvalidScale { joint: 1 })
        );

        joints[0].calibration.radians_per_unit = 0.001;
        joints[0].calibration.neutral = 3000;
        assert_eq!(
            ArmConfig::new("x", &joints, 0, Geometry::default(), 20),
            Err(ConfigError::NeutralOutOfRange { joint: 1 })
        );
    }

    #[test]
    fn test_rejects_bad_link_joints() {
        let base = ArmConfig::default();
        let mut geometry = base.geometry().clone();
        geometry.links[1].joint = Some(1);
        assert_eq!(
            ArmConfig::new("x", base.joints(), 2, geometry, 20),
            Err(ConfigError::LinkJointNotPitch { joint: 1 })
        );

        let mut geometry = base.geometry().clone();
        geometry.links[2].joint = Some(2);
        assert_eq!(
            ArmConfig::new("x", base.joints(), 2, geometry, 20),
            Err(ConfigError::DuplicateLinkJoint { joint: 2 })
        );

        let mut geometry = base.geometry().clone();
        geometry.links[2].joint = Some(7);
        assert_eq!(
            ArmConfig::new("x", base.joints(), 2, geometry, 20),
            Err(ConfigError::UnknownLinkJoint { joint: 7 })
        );
    }

    #[test]
    fn test_rejects_too_many_magnets() {
        let base = ArmConfig::default();
        assert_eq!(
            ArmConfig::new("x", base.joints(), 5, base.geometry().clone(), 20),
            Err(ConfigError::TooManyMagnets)
        );
    }

    #[test]
    fn test_clamp_pose() {
        let config = ArmConfig::default();
        let pose = Pose::new(&[100, 3000, 1500, 1500], &[true, false]).unwrap();
        let clamped = config.clamp_pose(&pose);
        assert_eq!(clamped.pulses(), &[500, 2500, 1500, 1500]);
        assert_eq!(clamped.magnets(), &[true, false]);
    }

    #[test]
    fn test_set_trim() {
        let mut config = ArmConfig::default();
        config.set_trim(2, -60).unwrap();
        assert_eq!(config.neutral_pose().pulses()[1], 1440);
        assert!(config.set_trim(9, 0).is_err());
    }

    #[test]
    fn test_limits() {
        let limits = ArmConfig::default().limits();
        assert_eq!(limits.joints, 4);
        assert_eq!(limits.magnets, 2);
        assert_eq!(limits.pulse_min, 500);
        assert_eq!(limits.pulse_max, 2500);
    }
}
