//! Dual-arm synchronizer
//!
//! Two sequences recorded against a common time base are merged into one
//! schedule ordered by timestamp. Ties go to arm A first, then recording
//! order. Both arms must pass start-pose verification before either is
//! written to.

use alloc::vec::Vec;
use core::fmt;

use super::player::{check_start, PlaybackError, PlaybackOutcome, PlaybackTiming};
use crate::config::ArmConfig;
use crate::motion::{Pose, Sequence};
use crate::traits::{Actuator, ActuatorError, Pacer, WaitOutcome};

/// Which arm a schedule entry drives
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ArmId {
    A,
    B,
}

impl fmt::Display for ArmId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ArmId::A => f.write_str("arm 1"),
            ArmId::B => f.write_str("arm 2"),
        }
    }
}

/// One entry of the merged schedule
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MergedEntry<'a> {
    pub t_ms: u32,
    pub arm: ArmId,
    pub pose: &'a Pose,
}

/// Merge two per-arm sequences into one time-ordered schedule
pub fn merge<'a>(a: &'a Sequence, b: &'a Sequence) -> Vec<MergedEntry<'a>> {
    let mut merged = Vec::with_capacity(a.len() + b.len());
    let (mut ia, mut ib) = (a.poses().iter().peekable(), b.poses().iter().peekable());

    loop {
        let take_a = match (ia.peek(), ib.peek()) {
            (Some(pa), Some(pb)) => pa.t_ms <= pb.t_ms,
            (Some(_), None) => true,
            (None, Some(_)) => false,
            (None, None) => break,
        };
        let (arm, entry) = if take_a {
            (ArmId::A, ia.next())
        } else {
            (ArmId::B, ib.next())
        };
        if let Some(entry) = entry {
            merged.push(MergedEntry {
                t_ms: entry.t_ms,
                arm,
                pose: &entry.pose,
            });
        }
    }

    merged
}

/// Why a dual playback did not complete
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DualError {
    /// One or both arms failed verification; nothing was written
    Refused {
        a: Option<PlaybackError>,
        b: Option<PlaybackError>,
    },
    /// An actuator failed mid-playback
    ///
    /// `live_a` and `live_b` are the last poses each arm accepted.
    Actuator {
        arm: ArmId,
        error: ActuatorError,
        written: usize,
        live_a: Pose,
        live_b: Pose,
    },
}

impl fmt::Display for DualError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DualError::Refused { a, b } => {
                f.write_str("dual playback refused")?;
                if let Some(e) = a {
                    write!(f, "; {}: {}", ArmId::A, e)?;
                }
                if let Some(e) = b {
                    write!(f, "; {}: {}", ArmId::B, e)?;
                }
                Ok(())
            }
            DualError::Actuator {
                arm,
                error,
                written,
                ..
            } => write!(f, "{}: {} after {} poses", arm, error, written),
        }
    }
}

/// Result of a dual playback that passed verification
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DualReport {
    pub outcome: PlaybackOutcome,
    /// Entries written across both arms
    pub written: usize,
    /// Pose of arm A afterwards
    pub live_a: Pose,
    /// Pose of arm B afterwards
    pub live_b: Pose,
}

impl DualReport {
    fn halted(self, arm: ArmId, error: ActuatorError) -> DualError {
        DualError::Actuator {
            arm,
            error,
            written: self.written,
            live_a: self.live_a,
            live_b: self.live_b,
        }
    }
}

/// Plays two arms from one merged schedule
#[derive(Debug, Default)]
pub struct DualPlayer {
    timing: PlaybackTiming,
}

impl DualPlayer {
    pub fn new(timing: PlaybackTiming) -> Self {
        Self { timing }
    }

    /// Verify both arms, then stream the merged schedule
    #[allow(clippy::too_many_arguments)]
    pub fn play<A1, A2, P>(
        &self,
        configs: (&ArmConfig, &ArmConfig),
        sequences: (&Sequence, &Sequence),
        live: (&Pose, &Pose),
        actuator_a: &mut A1,
        actuator_b: &mut A2,
        pacer: &mut P,
    ) -> Result<DualReport, DualError>
    where
        A1: Actuator,
        A2: Actuator,
        P: Pacer,
    {
        let check_a = check_start(configs.0, sequences.0, live.0).err();
        let check_b = check_start(configs.1, sequences.1, live.1).err();
        if check_a.is_some() || check_b.is_some() {
            return Err(DualError::Refused {
                a: check_a,
                b: check_b,
            });
        }

        let schedule = merge(sequences.0, sequences.1);
        let origin = schedule.first().map(|e| e.t_ms).unwrap_or(0);
        let mut report = DualReport {
            outcome: PlaybackOutcome::Completed,
            written: 0,
            live_a: live.0.clone(),
            live_b: live.1.clone(),
        };

        pacer.restart();
        for (index, entry) in schedule.iter().enumerate() {
            let at = self.timing.offset_ms(index, entry.t_ms, origin);
            if pacer.wait_until(at) == WaitOutcome::Cancelled {
                report.outcome = PlaybackOutcome::Cancelled;
                return Ok(report);
            }

            match entry.arm {
                ArmId::A => {
                    let pose = configs.0.clamp_pose(entry.pose);
                    if let Err(error) = actuator_a.apply(&pose) {
                        return Err(report.halted(ArmId::A, error));
                    }
                    report.live_a = pose;
                }
                ArmId::B => {
                    let pose = configs.1.clamp_pose(entry.pose);
                    if let Err(error) = actuator_b.apply(&pose) {
                        return Err(report.halted(ArmId::B, error));
                    }
                    report.live_b = pose;
                }
            }
            report.written += 1;
        }

        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::traits::mock::{MockActuator, MockPacer};
    use proptest::prelude::*;

    fn seq(times: &[u32], base: u16) -> Sequence {
        let mut s = Sequence::new("s", 4, 2);
        for (i, &t) in times.iter().enumerate() {
            let p = base + i as u16;
            s.push(t, Pose::new(&[1500, 1450, 1500, p], &[false, false]).unwrap())
                .unwrap();
        }
        s
    }

    fn labels(merged: &[MergedEntry<'_>]) -> Vec<(u32, ArmId, u16)> {
        merged
            .iter()
            .map(|e| (e.t_ms, e.arm, e.pose.pulses()[3]))
            .collect()
    }

    #[test]
    fn test_merge_orders_by_time() {
        let a = seq(&[0, 100, 300], 1500);
        let b = seq(&[50, 200], 1600);
        let merged = merge(&a, &b);
        assert_eq!(
            labels(&merged),
            [
                (0, ArmId::A, 1500),
                (50, ArmId::B, 1600),
                (100, ArmId::A, 1501),
                (200, ArmId::B, 1601),
                (300, ArmId::A, 1502),
            ]
        );
    }

    #[test]
    fn test_merge_ties_arm_a_first_then_recording_order() {
        let a = seq(&[0, 100, 100], 1500);
        let b = seq(&[100, 100], 1600);
        let merged = merge(&a, &b);
        assert_eq!(
            labels(&merged),
            [
                (0, ArmId::A, 1500),
                (100, ArmId::A, 1501),
                (100, ArmId::A, 1502),
                (100, ArmId::B, 1600),
                (100, ArmId::B, 1601),
            ]
        );
    }

    #[test]
    fn test_merge_with_empty_side() {
        let a = seq(&[], 1500);
        let b = seq(&[5, 10], 1600);
        assert_eq!(merge(&a, &b).len(), 2);
        assert!(merge(&a, &a).is_empty());
    }

    #[test]
    fn test_dual_play_routes_entries() {
        let config = ArmConfig::default();
        let a = seq(&[0, 100], 1500);
        let b = seq(&[50], 1500);
        let neutral = config.neutral_pose();
        let (mut act_a, mut act_b) = (MockActuator::default(), MockActuator::default());
        let mut pacer = MockPacer::default();

        let report = DualPlayer::default()
            .play(
                (&config, &config),
                (&a, &b),
                (&neutral, &neutral),
                &mut act_a,
                &mut act_b,
                &mut pacer,
            )
            .unwrap();

        assert_eq!(report.written, 3);
        assert_eq!(act_a.applied.len(), 2);
        assert_eq!(act_b.applied.len(), 1);
        assert_eq!(pacer.waits, [0, 50, 100]);
        assert_eq!(report.live_a.pulses()[3], 1501);
    }

    #[test]
    fn test_failure_on_one_arm_blocks_both() {
        let config = ArmConfig::default();
        let a = seq(&[0, 100], 1500);
        let b = seq(&[0, 100], 1900);
        let neutral = config.neutral_pose();
        let (mut act_a, mut act_b) = (MockActuator::default(), MockActuator::default());

        let err = DualPlayer::default()
            .play(
                (&config, &config),
                (&a, &b),
                (&neutral, &neutral),
                &mut act_a,
                &mut act_b,
                &mut MockPacer::default(),
            )
            .unwrap_err();

        match err {
            DualError::Refused { a, b } => {
                assert!(a.is_none());
                assert!(matches!(b, Some(PlaybackError::SafetyMismatch(_))));
            }
            other => panic!("unexpected {:?}", other),
        }
        assert!(act_a.applied.is_empty());
        assert!(act_b.applied.is_empty());
    }

    #[test]
    fn test_actuator_failure_keeps_progress() {
        let config = ArmConfig::default();
        let a = seq(&[0, 10], 1500);
        let b = seq(&[50], 1500);
        let neutral = config.neutral_pose();
        let mut act_a = MockActuator::default();
        let mut act_b = MockActuator {
            fail_at: Some(0),
            ..Default::default()
        };

        let err = DualPlayer::default()
            .play(
                (&config, &config),
                (&a, &b),
                (&neutral, &neutral),
                &mut act_a,
                &mut act_b,
                &mut MockPacer::default(),
            )
            .unwrap_err();

        match err {
            DualError::Actuator {
                arm,
                written,
                live_a,
                live_b,
                ..
            } => {
                assert_eq!(arm, ArmId::B);
                assert_eq!(written, 2);
                assert_eq!(live_a.pulses()[3], 1501);
                assert_eq!(live_b, neutral);
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    proptest! {
        #[test]
        fn prop_merge_is_ordered_and_complete(
            mut ta in proptest::collection::vec(0u32..1000, 0..20),
            mut tb in proptest::collection::vec(0u32..1000, 0..20),
        ) {
            ta.sort_unstable();
            tb.sort_unstable();
            let a = seq(&ta, 500);
            let b = seq(&tb, 1000);
            let merged = merge(&a, &b);

            prop_assert_eq!(merged.len(), ta.len() + tb.len());
            for pair in merged.windows(2) {
                let (x, y) = (&pair[0], &pair[1]);
                prop_assert!(x.t_ms < y.t_ms || (x.t_ms == y.t_ms && x.arm <= y.arm));
            }
            // Each arm's entries keep recording order
            let a_order: Vec<u16> = merged.iter().filter(|e| e.arm == ArmId::A).map(|e| e.pose.pulses()[3]).collect();
            prop_assert!(a_order.windows(2).all(|w| w[0] < w[1]));
        }
    }
}
