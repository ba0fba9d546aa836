//! Combined two-arm recordings
//!
//! A dual recording keeps both arms on one timeline: every event is a full
//! snapshot of arm 1 and arm 2 at one instant. Playback splits it back into
//! one sequence per arm and lets the core synchronizer merge them again.

use armctl_core::motion::{Pose, Sequence, SequenceError};
use armctl_core::scheduler::{merge, ArmId};
use serde::{Deserialize, Serialize};

/// Both arms at one instant
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimelineEvent {
    /// Milliseconds since recording started
    pub t_ms: u32,
    pub arm1: Vec<u16>,
    pub arm2: Vec<u16>,
    #[serde(default)]
    pub magnets1: Vec<bool>,
    #[serde(default)]
    pub magnets2: Vec<bool>,
}

impl TimelineEvent {
    fn snapshot(t_ms: u32, arm1: &Pose, arm2: &Pose) -> Self {
        Self {
            t_ms,
            arm1: arm1.pulses().to_vec(),
            arm2: arm2.pulses().to_vec(),
            magnets1: arm1.magnets().to_vec(),
            magnets2: arm2.magnets().to_vec(),
        }
    }
}

/// One timeline shared by two arms
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DualRecording {
    pub name: String,
    #[serde(default, rename = "event")]
    pub timeline: Vec<TimelineEvent>,
}

impl DualRecording {
    /// Combine two per-arm recordings taken on a common time base
    ///
    /// The timeline opens at 0 ms with both arms at their start poses.
    /// Changes of both arms at the same millisecond share one event.
    pub fn combine(name: &str, start: (&Pose, &Pose), a: &Sequence, b: &Sequence) -> Self {
        let mut arm_a = start.0.clone();
        let mut arm_b = start.1.clone();
        let mut timeline = vec![TimelineEvent::snapshot(0, &arm_a, &arm_b)];

        for entry in merge(a, b) {
            match entry.arm {
                ArmId::A => arm_a = entry.pose.clone(),
                ArmId::B => arm_b = entry.pose.clone(),
            }
            let event = TimelineEvent::snapshot(entry.t_ms, &arm_a, &arm_b);
            match timeline.last_mut() {
                Some(last) if last.t_ms == event.t_ms => *last = event,
                _ => timeline.push(event),
            }
        }

        Self {
            name: name.to_string(),
            timeline,
        }
    }

    /// Split into per-arm sequences of the given `(joints, magnets)` shapes
    ///
    /// An arm only gets an entry when its own channel changed. Events with an
    /// empty channel carry nothing for that arm.
    pub fn split(&self, shape_a: (u8, u8), shape_b: (u8, u8)) -> Result<(Sequence, Sequence), SequenceError> {
        let mut a = Sequence::new(&format!("{}_arm1", self.name), shape_a.0, shape_a.1);
        let mut b = Sequence::new(&format!("{}_arm2", self.name), shape_b.0, shape_b.1);

        for event in &self.timeline {
            push_changed(&mut a, event.t_ms, &event.arm1, &event.magnets1)?;
            push_changed(&mut b, event.t_ms, &event.arm2, &event.magnets2)?;
        }
        Ok((a, b))
    }

    /// Time of the last event
    pub fn duration_ms(&self) -> u32 {
        self.timeline.last().map(|e| e.t_ms).unwrap_or(0)
    }
}

fn push_changed(
    sequence: &mut Sequence,
    t_ms: u32,
    pulses: &[u16],
    magnets: &[bool],
) -> Result<(), SequenceError> {
    if pulses.is_empty() {
        return Ok(());
    }
    let pose = Pose::new(pulses, magnets)?;
    if sequence.last().is_some_and(|last| last.pose == pose) {
        return Ok(());
    }
    sequence.push(t_ms, pose)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pose(p: u16) -> Pose {
        Pose::new(&[p, 1500], &[false]).unwrap()
    }

    fn sequence(name: &str, steps: &[(u32, u16)]) -> Sequence {
        let mut seq = Sequence::new(name, 2, 1);
        for &(t, p) in steps {
            seq.push(t, pose(p)).unwrap();
        }
        seq
    }

    #[test]
    fn test_combine_shares_timestamps() {
        let a = sequence("a", &[(0, 1500), (100, 1600)]);
        let b = sequence("b", &[(0, 1400), (50, 1450), (100, 1350)]);
        let dual = DualRecording::combine("pair", (&pose(1500), &pose(1400)), &a, &b);

        let times: Vec<u32> = dual.timeline.iter().map(|e| e.t_ms).collect();
        assert_eq!(times, [0, 50, 100]);
        assert_eq!(dual.timeline[1].arm1, [1500, 1500]);
        assert_eq!(dual.timeline[1].arm2, [1450, 1500]);
        assert_eq!(dual.timeline[2].arm1, [1600, 1500]);
        assert_eq!(dual.timeline[2].arm2, [1350, 1500]);
        assert_eq!(dual.duration_ms(), 100);
    }

    #[test]
    fn test_split_restores_per_arm_changes() {
        let a = sequence("a", &[(0, 1500), (100, 1600)]);
        let b = sequence("b", &[(0, 1400), (50, 1450), (100, 1350)]);
        let dual = DualRecording::combine("pair", (&pose(1500), &pose(1400)), &a, &b);

        let (sa, sb) = dual.split((2, 1), (2, 1)).unwrap();
        assert_eq!(sa.poses(), a.poses());
        assert_eq!(sb.poses(), b.poses());
        assert_eq!(sa.name(), "pair_arm1");
    }

    #[test]
    fn test_split_rejects_wrong_shape() {
        let a = sequence("a", &[(0, 1500)]);
        let dual = DualRecording::combine("pair", (&pose(1500), &pose(1500)), &a, &a);
        let err = dual.split((3, 1), (2, 1)).unwrap_err();
        assert!(matches!(err, SequenceError::PartialPose { .. }));
    }

    #[test]
    fn test_idle_arm_holds_start_pose() {
        let a = sequence("a", &[(40, 1510), (80, 1520)]);
        let b = Sequence::new("b", 2, 1);
        let dual = DualRecording::combine("solo", (&pose(1500), &pose(1400)), &a, &b);
        assert_eq!(dual.timeline.len(), 3);
        assert!(dual.timeline.iter().all(|e| e.arm2 == [1400, 1500]));

        let (sa, sb) = dual.split((2, 1), (2, 1)).unwrap();
        assert_eq!(sa.len(), 3);
        assert_eq!(sa.first().unwrap().pose, pose(1500));
        assert_eq!(sb.len(), 1);
        assert_eq!(sb.first().unwrap().t_ms, 0);
    }
}
