//! Recorded motion sequences

use alloc::string::String;
use alloc::vec::Vec;
use core::fmt;

use super::pose::Pose;

/// Errors raised when building a sequence
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum SequenceError {
    /// Pose does not carry every joint and magnet of the sequence
    PartialPose {
        expected_joints: u8,
        expected_magnets: u8,
        joints: u8,
        magnets: u8,
    },
    /// Timestamp earlier than the previous entry
    TimeWentBackwards { previous_ms: u32, t_ms: u32 },
    /// More values than a pose can hold
    CapacityExceeded,
}

impl fmt::Display for SequenceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SequenceError::PartialPose {
                expected_joints,
                expected_magnets,
                joints,
                magnets,
            } => write!(
                f,
                "pose has {} joints and {} magnets, expected {} and {}",
                joints, magnets, expected_joints, expected_magnets
            ),
            SequenceError::TimeWentBackwards { previous_ms, t_ms } => {
                write!(f, "timestamp {} ms is before previous {} ms", t_ms, previous_ms)
            }
            SequenceError::CapacityExceeded => f.write_str("too many values for one pose"),
        }
    }
}

/// A pose with its offset from the start of recording
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TimedPose {
    /// Milliseconds since recording started
    pub t_ms: u32,
    pub pose: Pose,
}

/// Ordered, time-stamped list of complete poses
///
/// Insertion order is recording order and playback order. The first pose is
/// the required start state for playback.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Sequence {
    name: String,
    joints: u8,
    magnets: u8,
    poses: Vec<TimedPose>,
}

impl Sequence {
    /// Create an empty sequence for an arm shape
    pub fn new(name: &str, joints: u8, magnets: u8) -> Self {
        Self {
            name: String::from(name),
            joints,
            magnets,
            poses: Vec::new(),
        }
    }

    /// Append a pose
    ///
    /// Partial poses and decreasing timestamps are rejected.
    pub fn push(&mut self, t_ms: u32, pose: Pose) -> Result<(), SequenceError> {
        if pose.joint_count() != self.joints as usize || pose.magnet_count() != self.magnets as usize
        {
            return Err(SequenceError::PartialPose {
                expected_joints: self.joints,
                expected_magnets: self.magnets,
                joints: pose.joint_count() as u8,
                magnets: pose.magnet_count() as u8,
            });
        }
        if let Some(last) = self.poses.last() {
            if t_ms < last.t_ms {
                return Err(SequenceError::TimeWentBackwards {
                    previous_ms: last.t_ms,
                    t_ms,
                });
            }
        }
        self.poses.push(TimedPose { t_ms, pose });
        Ok(())
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Rename, e.g. after resolving a name collision on save
    pub fn set_name(&mut self, name: &str) {
        self.name = String::from(name);
    }

    /// Joints per pose
    pub fn joint_count(&self) -> u8 {
        self.joints
    }

    /// Magnets per pose
    pub fn magnet_count(&self) -> u8 {
        self.magnets
    }

    pub fn poses(&self) -> &[TimedPose] {
        &self.poses
    }

    /// Required start state
    pub fn first(&self) -> Option<&TimedPose> {
        self.poses.first()
    }

    pub fn last(&self) -> Option<&TimedPose> {
        self.poses.last()
    }

    pub fn len(&self) -> usize {
        self.poses.len()
    }

    pub fn is_empty(&self) -> bool {
        self.poses.is_empty()
    }

    /// Time from the first to the last pose
    pub fn duration_ms(&self) -> u32 {
        match (self.poses.first(), self.poses.last()) {
            (Some(first), Some(last)) => last.t_ms - first.t_ms,
            _ => 0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pose(p: u16) -> Pose {
        Pose::new(&[p, p], &[false]).unwrap()
    }

    #[test]
    fn test_push_in_order() {
        let mut seq = Sequence::new("wave", 2, 1);
        seq.push(0, pose(1500)).unwrap();
        seq.push(0, pose(1510)).unwrap();
        seq.push(120, pose(1520)).unwrap();
        assert_eq!(seq.len(), 3);
        assert_eq!(seq.duration_ms(), 120);
        assert_eq!(seq.first().map(|p| p.pose.pulses()[0]), Some(1500));
        assert_eq!(seq.last().map(|p| p.t_ms), Some(120));
    }

    #[test]
    fn test_rejects_decreasing_time() {
        let mut seq = Sequence::new("wave", 2, 1);
        seq.push(50, pose(1500)).unwrap();
        assert_eq!(
            seq.push(49, pose(1500)),
            Err(SequenceError::TimeWentBackwards {
                previous_ms: 50,
                t_ms: 49
            })
        );
        assert_eq!(seq.len(), 1);
    }

    #[test]
    fn test_rejects_partial_pose() {
        let mut seq = Sequence::new("wave", 3, 1);
        let result = seq.push(0, pose(1500));
        assert!(matches!(result, Err(SequenceError::PartialPose { joints: 2, .. })));

        let mut seq = Sequence::new("wave", 2, 2);
        assert!(seq.push(0, pose(1500)).is_err());
        assert!(seq.is_empty());
    }

    #[test]
    fn test_empty_duration() {
        assert_eq!(Sequence::new("x", 1, 0).duration_ms(), 0);
    }
}
