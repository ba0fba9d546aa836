//! Sequence player
//!
//! `Idle -> Verifying -> Playing -> Idle`, with `Verifying -> Idle` when
//! the start-pose check fails. Nothing is written to the actuator unless
//! verification passes.

use core::fmt;

use crate::config::ArmConfig;
use crate::motion::{Pose, Sequence};
use crate::safety::{verify_start_pose, VerifyReport};
use crate::traits::{Actuator, ActuatorError, Pacer, WaitOutcome};

/// Player phase
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum PlayerPhase {
    #[default]
    Idle,
    /// Comparing the live pose with the first pose
    Verifying,
    /// Streaming poses to the actuator
    Playing,
}

/// Inter-pose timing during playback
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum PlaybackTiming {
    /// Honor the recorded deltas between poses
    #[default]
    Recorded,
    /// Fire poses in order at a fixed interval (0 = back to back)
    Stepwise { step_ms: u32 },
}

impl PlaybackTiming {
    /// Offset from playback start at which entry `index` fires
    pub fn offset_ms(&self, index: usize, t_ms: u32, origin_ms: u32) -> u32 {
        match *self {
            PlaybackTiming::Recorded => t_ms.saturating_sub(origin_ms),
            PlaybackTiming::Stepwise { step_ms } => step_ms.saturating_mul(index as u32),
        }
    }
}

/// Why a playback did not run to completion
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum PlaybackError {
    /// Sequence holds no poses
    EmptySequence,
    /// Sequence was recorded for a different arm shape
    ShapeMismatch { joints: u8, magnets: u8 },
    /// Live pose does not match the first pose; nothing was written
    SafetyMismatch(VerifyReport),
    /// Actuator failed after `written` poses
    Actuator {
        written: usize,
        last_pose: Option<Pose>,
        error: ActuatorError,
    },
}

impl fmt::Display for PlaybackError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PlaybackError::EmptySequence => f.write_str("sequence is empty"),
            PlaybackError::ShapeMismatch { joints, magnets } => write!(
                f,
                "sequence has {} joints and {} magnets, arm does not",
                joints, magnets
            ),
            PlaybackError::SafetyMismatch(report) => write!(f, "start pose mismatch: {}", report),
            PlaybackError::Actuator { written, error, .. } => {
                write!(f, "{} after {} poses", error, written)
            }
        }
    }
}

/// How a playback that passed verification ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum PlaybackOutcome {
    /// Every pose was written
    Completed,
    /// Cancelled between two pose writes
    Cancelled,
}

/// Summary of a finished playback
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct PlaybackReport {
    pub outcome: PlaybackOutcome,
    /// Poses written
    pub written: usize,
    /// Last pose written, i.e. the arm's pose afterwards
    pub last_pose: Option<Pose>,
}

/// Check that a sequence may start from the live pose
pub fn check_start(config: &ArmConfig, sequence: &Sequence, live: &Pose) -> Result<(), PlaybackError> {
    let first = sequence.first().ok_or(PlaybackError::EmptySequence)?;
    if sequence.joint_count() != config.joint_count()
        || sequence.magnet_count() != config.magnet_count()
    {
        return Err(PlaybackError::ShapeMismatch {
            joints: sequence.joint_count(),
            magnets: sequence.magnet_count(),
        });
    }

    let report = verify_start_pose(live, &first.pose, config.tolerance());
    if report.passed() {
        Ok(())
    } else {
        Err(PlaybackError::SafetyMismatch(report))
    }
}

/// Plays one sequence through the safety gate
#[derive(Debug, Default)]
pub struct Player {
    phase: PlayerPhase,
    timing: PlaybackTiming,
}

impl Player {
    pub fn new(timing: PlaybackTiming) -> Self {
        Self {
            phase: PlayerPhase::Idle,
            timing,
        }
    }

    /// Current phase
    pub fn state(&self) -> PlayerPhase {
        self.phase
    }

    pub fn timing(&self) -> PlaybackTiming {
        self.timing
    }

    pub fn set_timing(&mut self, timing: PlaybackTiming) {
        self.timing = timing;
    }

    /// Verify the start pose, then stream every pose in order
    ///
    /// Each pose is clamped to the joint ranges and written in one call.
    /// The player is idle again when this returns.
    pub fn play<A: Actuator, P: Pacer>(
        &mut self,
        config: &ArmConfig,
        sequence: &Sequence,
        live: &Pose,
        actuator: &mut A,
        pacer: &mut P,
    ) -> Result<PlaybackReport, PlaybackError> {
        self.phase = PlayerPhase::Verifying;
        if let Err(e) = check_start(config, sequence, live) {
            self.phase = PlayerPhase::Idle;
            return Err(e);
        }

        self.phase = PlayerPhase::Playing;
        let result = self.stream(config, sequence, actuator, pacer);
        self.phase = PlayerPhase::Idle;
        result
    }

    fn stream<A: Actuator, P: Pacer>(
        &self,
        config: &ArmConfig,
        sequence: &Sequence,
        actuator: &mut A,
        pacer: &mut P,
    ) -> Result<PlaybackReport, PlaybackError> {
        let origin = sequence.first().map(|p| p.t_ms).unwrap_or(0);
        let mut report = PlaybackReport {
            outcome: PlaybackOutcome::Completed,
            written: 0,
            last_pose: None,
        };

        pacer.restart();
        for (index, entry) in sequence.poses().iter().enumerate() {
            let at = self.timing.offset_ms(index, entry.t_ms, origin);
            if pacer.wait_until(at) == WaitOutcome::Cancelled {
                report.outcome = PlaybackOutcome::Cancelled;
                return Ok(report);
            }

            let pose = config.clamp_pose(&entry.pose);
            if let Err(error) = actuator.apply(&pose) {
                return Err(PlaybackError::Actuator {
                    written: report.written,
                    last_pose: report.last_pose,
                    error,
                });
            }
            report.written += 1;
            report.last_pose = Some(pose);
        }

        Ok(report)
    }
}
