//! Forward kinematics
//!
//! Planar accumulation model. With every angle at zero the arm points
//! straight up. Walking the chain from the base, each link first adds its
//! pitch joint's angle to the accumulated pitch φ and then contributes
//!
//! ```text
//! r += forward·cos φ + up·sin φ
//! z += up·cos φ − forward·sin φ
//! s += lateral
//! ```
//!
//! where `r` is reach, `s` sideways offset and `z` height. The tool offset
//! is a final link along the same φ. Base yaw θ rotates the planar result:
//!
//! ```text
//! x = r·cos θ − s·sin θ
//! y = r·sin θ + s·cos θ
//! ```

use heapless::Vec;
use libm::{cosf, sinf};

use super::calibration::CalibrationModel;
use crate::config::{ArmConfig, JointAxis, MAX_LINKS};
use crate::motion::Pose;

/// Tool tip position in millimetres (X forward, Y left, Z up)
#[derive(Debug, Clone, Copy, PartialEq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct CartesianPosition {
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

impl CartesianPosition {
    /// Euclidean distance to another position
    pub fn distance(&self, other: &CartesianPosition) -> f32 {
        let (dx, dy, dz) = (self.x - other.x, self.y - other.y, self.z - other.z);
        libm::sqrtf(dx * dx + dy * dy + dz * dz)
    }
}

#[derive(Debug, Clone, Copy)]
struct ChainLink {
    /// Index into the joint angle vector
    pitch: Option<usize>,
    forward: f32,
    lateral: f32,
    up: f32,
}

/// Kinematic chain resolved from an arm configuration
///
/// Joint references are resolved to angle-vector indices once, so solving
/// has no joint-specific branches.
#[derive(Debug, Clone)]
pub struct KinematicChain {
    links: Vec<ChainLink, { MAX_LINKS + 1 }>,
    yaw: Option<usize>,
}

impl KinematicChain {
    /// Build the chain for a validated configuration
    pub fn new(config: &ArmConfig) -> Self {
        let geometry = config.geometry();
        let mut links = Vec::new();

        for link in &geometry.links {
            let _ = links.push(ChainLink {
                pitch: link.joint.map(|id| id as usize - 1),
                forward: link.forward,
                lateral: link.lateral,
                up: link.up,
            });
        }
        // Tool tip rides on the last link's pitch
        let _ = links.push(ChainLink {
            pitch: None,
            forward: 0.0,
            lateral: geometry.tool.lateral,
            up: geometry.tool.length,
        });

        let yaw = config
            .joints()
            .iter()
            .position(|j| j.axis == JointAxis::Yaw);

        Self { links, yaw }
    }

    /// Tool tip for a joint angle vector (radians, joint order)
    ///
    /// Missing angles count as zero.
    pub fn tip(&self, angles: &[f32]) -> CartesianPosition {
        let angle = |index: Option<usize>| {
            index
                .and_then(|i| angles.get(i).copied())
                .unwrap_or(0.0)
        };

        let (mut r, mut s, mut z) = (0.0f32, 0.0f32, 0.0f32);
        let mut phi = 0.0f32;

        for link in &self.links {
            phi += angle(link.pitch);
            let (sin_phi, cos_phi) = (sinf(phi), cosf(phi));
            r += link.forward * cos_phi + link.up * sin_phi;
            z += link.up * cos_phi - link.forward * sin_phi;
            s += link.lateral;
        }

        let theta = angle(self.yaw);
        let (sin_t, cos_t) = (sinf(theta), cosf(theta));
        CartesianPosition {
            x: r * cos_t - s * sin_t,
            y: r * sin_t + s * cos_t,
            z,
        }
    }
}

/// Tool tip position for a pose
///
/// Pulses are clamped to their joint ranges; every clamped input has a
/// defined result.
pub fn forward(config: &ArmConfig, pose: &Pose) -> CartesianPosition {
    let angles = CalibrationModel::new(config.joints()).joint_angles(pose);
    KinematicChain::new(config).tip(&angles)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{Geometry, JointConfig, LinkConfig, ToolOffset, MAX_JOINTS};
    use crate::kinematics::calibration::{Direction, JointCalibration};
    use core::f32::consts::PI;

    const EPS: f32 = 1e-3;

    fn assert_close(actual: CartesianPosition, x: f32, y: f32, z: f32) {
        assert!(
            (actual.x - x).abs() < EPS && (actual.y - y).abs() < EPS && (actual.z - z).abs() < EPS,
            "got ({}, {}, {}), want ({}, {}, {})",
            actual.x,
            actual.y,
            actual.z,
            x,
            y,
            z
        );
    }

    /// 4 joints, neutral 1500, zero trims, 1000 units = 90°
    fn fixture(tool_lateral: f32) -> ArmConfig {
        let cal = JointCalibration {
            neutral: 1500,
            trim: 0,
            direction: Direction::Normal,
            radians_per_unit: PI / 2000.0,
        };
        let joints: Vec<JointConfig, MAX_JOINTS> = [
            JointConfig::new(1, cal, JointAxis::Yaw),
            JointConfig::new(2, cal, JointAxis::Pitch),
            JointConfig::new(3, cal, JointAxis::Pitch),
            JointConfig::new(4, cal, JointAxis::Pitch),
        ]
        .into_iter()
        .collect();
        let links = [
            LinkConfig::column(62.3),
            LinkConfig::pitched(2, 120.0),
            LinkConfig::pitched(3, 93.85),
            LinkConfig::pitched(4, 0.0),
        ]
        .into_iter()
        .collect();
        let geometry = Geometry {
            links,
            tool: ToolOffset {
                length: 45.6,
                lateral: tool_lateral,
            },
        };
        ArmConfig::new("fixture", &joints, 0, geometry, 20).unwrap()
    }

    fn pose(pulses: &[u16]) -> Pose {
        Pose::new(pulses, &[]).unwrap()
    }

    #[test]
    fn test_neutral_reference_tip() {
        let config = fixture(0.0);
        let tip = forward(&config, &pose(&[1500, 1500, 1500, 1500]));
        assert_close(tip, 0.0, 0.0, 321.75);
    }

    #[test]
    fn test_tool_lateral_offset() {
        let config = fixture(4.9);
        let tip = forward(&config, &pose(&[1500, 1500, 1500, 1500]));
        assert_close(tip, 0.0, 4.9, 321.75);
    }

    #[test]
    fn test_shoulder_quarter_turn_lays_arm_flat() {
        let config = fixture(0.0);
        let tip = forward(&config, &pose(&[1500, 2500, 1500, 1500]));
        assert_close(tip, 259.45, 0.0, 62.3);
    }

    #[test]
    fn test_pitch_accumulates() {
        // Shoulder +45°, elbow +45°: forearm and tool are horizontal
        let config = fixture(0.0);
        let tip = forward(&config, &pose(&[1500, 2000, 2000, 1500]));
        let h = 120.0 * libm::sinf(PI / 4.0);
        assert_close(tip, h + 93.85 + 45.6, 0.0, 62.3 + h);
    }

    #[test]
    fn test_yaw_rotates_lateral_offset() {
        let config = fixture(4.9);
        let tip = forward(&config, &pose(&[2500, 1500, 1500, 1500]));
        assert_close(tip, -4.9, 0.0, 321.75);
    }

    #[test]
    fn test_yaw_rotates_reach() {
        let config = fixture(0.0);
        let tip = forward(&config, &pose(&[2500, 2500, 1500, 1500]));
        assert_close(tip, 0.0, 259.45, 62.3);
    }

    #[test]
    fn test_default_arm_neutral_tip() {
        let config = ArmConfig::default();
        let tip = forward(&config, &config.neutral_pose());
        assert_close(tip, 0.0, 4.9, 321.75);
    }

    #[test]
    fn test_reversed_joint_mirrors() {
        // Default elbow is reversed: higher pulse pitches backwards
        let config = ArmConfig::default();
        let mut forward_pose = config.neutral_pose();
        forward_pose.set_pulse(2, 1700);
        let mut reversed_pose = config.neutral_pose();
        reversed_pose.set_pulse(2, 1300);
        let a = forward(&config, &forward_pose);
        let b = forward(&config, &reversed_pose);
        assert!(a.x < 0.0 && b.x > 0.0);
        assert!((a.x + b.x).abs() < EPS);
        assert!((a.z - b.z).abs() < EPS);
    }

    #[test]
    fn test_out_of_range_pulses_are_clamped() {
        let config = fixture(0.0);
        let clamped = forward(&config, &pose(&[1500, 2500, 1500, 1500]));
        let wild = forward(&config, &pose(&[1500, 9000, 1500, 1500]));
        assert_close(wild, clamped.x, clamped.y, clamped.z);
    }

    #[test]
    fn test_missing_angles_are_zero() {
        let chain = KinematicChain::new(&fixture(0.0));
        assert_close(chain.tip(&[]), 0.0, 0.0, 321.75);
    }

    #[test]
    fn test_distance() {
        let a = CartesianPosition { x: 0.0, y: 0.0, z: 0.0 };
        let b = CartesianPosition { x: 3.0, y: 4.0, z: 0.0 };
        assert!((a.distance(&b) - 5.0).abs() < EPS);
    }
}
