//! Arm controller
//!
//! Owns the live pose of one arm and arbitrates control between manual
//! input (optionally recorded) and playback. Every manual change is written
//! to the actuator first and only then reported to the recorder, so a
//! recording never holds a pose the arm did not reach.

use alloc::string::String;
use core::fmt;

use armctl_protocol::{Command, CommandError};

use crate::config::ArmConfig;
use crate::motion::{Playlist, Pose, Sequence};
use crate::record::{ChangeCause, PoseChange, PoseObserver, RecordError, Recorder};
use crate::scheduler::{
    DualError, DualPlayer, DualReport, EntryFailure, PlaybackError, PlaybackOutcome,
    PlaybackReport, PlaybackTiming, Player, PlaylistExecutor, PlaylistReport, SequenceLibrary,
};
use crate::state::{ControlState, Event};
use crate::traits::{Actuator, ActuatorError, Pacer};

/// Errors returned by the arm controller
///
/// None of these leave the controller outside `Idle`/`Recording`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ArmError {
    /// Another control holder has the arm
    Busy(ControlState),
    /// No joint with this id
    UnknownJoint(u8),
    /// No magnet with this id
    UnknownMagnet(u8),
    /// Pulse outside the joint's range; nothing was written
    PulseOutOfRange { joint: u8, pulse: u16 },
    /// Command rejected by the grammar limits
    Command(CommandError),
    Actuator(ActuatorError),
    Record(RecordError),
    Playback(PlaybackError),
    /// A playlist entry could not be loaded
    PlaylistLoad { index: usize, name: String },
    /// A playlist entry was refused or failed
    PlaylistEntry { index: usize, error: PlaybackError },
    Dual(DualError),
}

impl fmt::Display for ArmError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ArmError::Busy(state) => write!(f, "arm busy ({:?})", state),
            ArmError::UnknownJoint(j) => write!(f, "unknown joint {}", j),
            ArmError::UnknownMagnet(m) => write!(f, "unknown magnet {}", m),
            ArmError::PulseOutOfRange { joint, pulse } => {
                write!(f, "pulse {} out of range for joint {}", pulse, joint)
            }
            ArmError::Command(e) => write!(f, "invalid command: {}", e),
            ArmError::Actuator(e) => write!(f, "{}", e),
            ArmError::Record(e) => write!(f, "{}", e),
            ArmError::Playback(e) => write!(f, "{}", e),
            ArmError::PlaylistLoad { index, name } => {
                write!(f, "playlist entry {} ({}) could not be loaded", index + 1, name)
            }
            ArmError::PlaylistEntry { index, error } => {
                write!(f, "playlist entry {}: {}", index + 1, error)
            }
            ArmError::Dual(e) => write!(f, "{}", e),
        }
    }
}

impl From<ActuatorError> for ArmError {
    fn from(e: ActuatorError) -> Self {
        ArmError::Actuator(e)
    }
}

impl From<RecordError> for ArmError {
    fn from(e: RecordError) -> Self {
        ArmError::Record(e)
    }
}

impl From<CommandError> for ArmError {
    fn from(e: CommandError) -> Self {
        ArmError::Command(e)
    }
}

/// Controller for one arm
#[derive(Debug)]
pub struct Arm<A: Actuator> {
    config: ArmConfig,
    actuator: A,
    live: Pose,
    state: ControlState,
    recorder: Recorder,
    player: Player,
}

impl<A: Actuator> Arm<A> {
    /// Controller assuming the arm sits at its calibrated neutral
    pub fn new(config: ArmConfig, actuator: A) -> Self {
        let live = config.neutral_pose();
        Self::with_live(config, actuator, live)
    }

    /// Controller resuming from a known pose
    ///
    /// A pose that does not fit the arm is replaced by neutral.
    pub fn with_live(config: ArmConfig, actuator: A, live: Pose) -> Self {
        let live = if config.fits(&live) {
            config.clamp_pose(&live)
        } else {
            config.neutral_pose()
        };
        Self {
            config,
            actuator,
            live,
            state: ControlState::Idle,
            recorder: Recorder::new(),
            player: Player::default(),
        }
    }

    pub fn config(&self) -> &ArmConfig {
        &self.config
    }

    /// Last commanded pose
    pub fn live(&self) -> &Pose {
        &self.live
    }

    pub fn state(&self) -> ControlState {
        self.state
    }

    pub fn actuator(&self) -> &A {
        &self.actuator
    }

    pub fn actuator_mut(&mut self) -> &mut A {
        &mut self.actuator
    }

    /// Release the actuator
    pub fn into_actuator(self) -> A {
        self.actuator
    }

    pub fn set_timing(&mut self, timing: PlaybackTiming) {
        self.player.set_timing(timing);
    }

    fn ensure_manual(&self) -> Result<(), ArmError> {
        if self.state.manual_allowed() {
            Ok(())
        } else {
            Err(ArmError::Busy(self.state))
        }
    }

    fn ensure_idle(&self) -> Result<(), ArmError> {
        if self.state == ControlState::Idle {
            Ok(())
        } else {
            Err(ArmError::Busy(self.state))
        }
    }

    /// Write a new live pose and notify the recorder
    fn commit(&mut self, pose: Pose, cause: ChangeCause, now_ms: u32) -> Result<bool, ArmError> {
        if pose == self.live {
            return Ok(false);
        }
        self.actuator.apply(&pose)?;
        self.live = pose;
        let change = PoseChange {
            at_ms: now_ms,
            pose: self.live.clone(),
            cause,
        };
        self.recorder.on_pose_change(&change);
        Ok(true)
    }

    fn joint_index(&self, joint: u8) -> Result<usize, ArmError> {
        self.config
            .joint(joint)
            .map(|j| j.id as usize - 1)
            .ok_or(ArmError::UnknownJoint(joint))
    }

    /// Move a joint by `step` pulse units, clamped to its range
    ///
    /// Returns whether the pose changed.
    pub fn jog(&mut self, joint: u8, step: i32, now_ms: u32) -> Result<bool, ArmError> {
        self.ensure_manual()?;
        let index = self.joint_index(joint)?;
        let current = self.live.pulses()[index];
        let target = self.config.joints()[index].jogged(current, step);

        let mut pose = self.live.clone();
        pose.set_pulse(index, target);
        self.commit(pose, ChangeCause::Joint(joint), now_ms)
    }

    /// Set a joint to an absolute pulse
    ///
    /// Out-of-range pulses are rejected before any write.
    pub fn set_joint(&mut self, joint: u8, pulse: u16, now_ms: u32) -> Result<bool, ArmError> {
        self.ensure_manual()?;
        let index = self.joint_index(joint)?;
        if !self.config.joints()[index].contains(pulse) {
            return Err(ArmError::PulseOutOfRange { joint, pulse });
        }

        let mut pose = self.live.clone();
        pose.set_pulse(index, pulse);
        self.commit(pose, ChangeCause::Joint(joint), now_ms)
    }

    /// Engage or release a magnet
    pub fn set_magnet(&mut self, magnet: u8, engaged: bool, now_ms: u32) -> Result<bool, ArmError> {
        self.ensure_manual()?;
        let index = (magnet as usize)
            .checked_sub(1)
            .filter(|&i| i < self.live.magnet_count())
            .ok_or(ArmError::UnknownMagnet(magnet))?;

        let mut pose = self.live.clone();
        pose.set_magnet(index, engaged);
        self.commit(pose, ChangeCause::Magnet(magnet), now_ms)
    }

    /// Drive every joint to neutral + trim; magnets keep their state
    ///
    /// The calibrated neutral pose is written explicitly rather than as the
    /// board's `set`, so the board ends up where the live pose says even when
    /// its own trims differ from the configured ones.
    pub fn reset_to_neutral(&mut self, now_ms: u32) -> Result<bool, ArmError> {
        self.ensure_manual()?;
        let mut pose = self.config.neutral_pose();
        for (index, &engaged) in self.live.magnets().iter().enumerate() {
            pose.set_magnet(index, engaged);
        }

        self.actuator.apply(&pose)?;
        if pose == self.live {
            return Ok(false);
        }
        self.live = pose;
        let change = PoseChange {
            at_ms: now_ms,
            pose: self.live.clone(),
            cause: ChangeCause::Neutral,
        };
        self.recorder.on_pose_change(&change);
        Ok(true)
    }

    /// Apply one grammar command as manual input
    pub fn execute(&mut self, command: &Command, now_ms: u32) -> Result<bool, ArmError> {
        self.config.limits().check(command)?;
        match *command {
            Command::Neutral => self.reset_to_neutral(now_ms),
            Command::SetJoint { joint, pulse } => self.set_joint(joint, pulse, now_ms),
            Command::SetMagnet { magnet, engaged } => self.set_magnet(magnet, engaged, now_ms),
        }
    }

    /// Begin recording manual changes; timestamps are relative to `now_ms`
    pub fn start_recording(&mut self, name: &str, now_ms: u32) -> Result<(), ArmError> {
        self.ensure_idle()?;
        self.recorder.start(
            name,
            self.config.joint_count(),
            self.config.magnet_count(),
            now_ms,
        )?;
        self.state = self.state.transition(Event::StartRecording);
        Ok(())
    }

    /// Finish recording and hand back the sequence
    pub fn stop_recording(&mut self) -> Result<Sequence, ArmError> {
        if self.state != ControlState::Recording {
            return Err(RecordError::NotRecording.into());
        }
        self.state = self.state.transition(Event::StopRecording);
        Ok(self.recorder.stop()?)
    }

    /// Number of entries in the running recording
    pub fn recorded(&self) -> usize {
        self.recorder.captured()
    }

    fn finish_playback(&mut self, outcome: PlaybackOutcome) {
        let event = match outcome {
            PlaybackOutcome::Completed => Event::PlaybackFinished,
            PlaybackOutcome::Cancelled => Event::Cancel,
        };
        self.state = self.state.transition(event);
    }

    /// Play a sequence through the start-pose gate
    pub fn play<P: Pacer>(&mut self, sequence: &Sequence, pacer: &mut P) -> Result<PlaybackReport, ArmError> {
        self.ensure_idle()?;
        self.state = self.state.transition(Event::StartPlayback);

        let result = self
            .player
            .play(&self.config, sequence, &self.live, &mut self.actuator, pacer);

        match result {
            Ok(report) => {
                self.state = self.state.transition(Event::VerifyPassed);
                if let Some(pose) = &report.last_pose {
                    self.live = pose.clone();
                }
                self.finish_playback(report.outcome);
                Ok(report)
            }
            Err(error) => {
                self.abort_playback(&error);
                Err(ArmError::Playback(error))
            }
        }
    }

    fn abort_playback(&mut self, error: &PlaybackError) {
        if let PlaybackError::Actuator { last_pose, .. } = error {
            self.state = self.state.transition(Event::VerifyPassed);
            if let Some(pose) = last_pose {
                self.live = pose.clone();
            }
            self.state = self.state.transition(Event::PlaybackFinished);
        } else {
            self.state = self.state.transition(Event::VerifyFailed);
        }
    }

    /// Run a playlist, halting at the first failing entry
    pub fn run_playlist<L, P>(
        &mut self,
        playlist: &Playlist,
        library: &mut L,
        pacer: &mut P,
    ) -> Result<PlaylistReport, ArmError>
    where
        L: SequenceLibrary,
        P: Pacer,
    {
        self.ensure_idle()?;
        self.state = self.state.transition(Event::StartPlayback);
        self.state = self.state.transition(Event::VerifyPassed);

        let mut executor = PlaylistExecutor::new(Player::new(self.player.timing()));
        let result = executor.run(
            &self.config,
            playlist,
            library,
            &self.live,
            &mut self.actuator,
            pacer,
        );

        match result {
            Ok(report) => {
                self.live = report.live.clone();
                let outcome = if report.cancelled {
                    PlaybackOutcome::Cancelled
                } else {
                    PlaybackOutcome::Completed
                };
                self.finish_playback(outcome);
                Ok(report)
            }
            Err(error) => {
                self.live = error.live;
                self.state = self.state.transition(Event::PlaybackFinished);
                Err(match error.failure {
                    EntryFailure::Load(_) => ArmError::PlaylistLoad {
                        index: error.index,
                        name: playlist
                            .entries()
                            .get(error.index)
                            .cloned()
                            .unwrap_or_default(),
                    },
                    EntryFailure::Playback(e) => ArmError::PlaylistEntry {
                        index: error.index,
                        error: e,
                    },
                })
            }
        }
    }
}

/// Play two arms from their per-arm sequences on one schedule
///
/// Both arms must be idle; a start-pose failure on either arm blocks both.
pub fn play_dual<A1, A2, P>(
    arm_a: &mut Arm<A1>,
    arm_b: &mut Arm<A2>,
    sequences: (&Sequence, &Sequence),
    timing: PlaybackTiming,
    pacer: &mut P,
) -> Result<DualReport, ArmError>
where
    A1: Actuator,
    A2: Actuator,
    P: Pacer,
{
    arm_a.ensure_idle()?;
    arm_b.ensure_idle()?;
    for arm_state in [&mut arm_a.state, &mut arm_b.state] {
        *arm_state = arm_state.transition(Event::StartPlayback);
    }

    let result = DualPlayer::new(timing).play(
        (&arm_a.config, &arm_b.config),
        sequences,
        (&arm_a.live, &arm_b.live),
        &mut arm_a.actuator,
        &mut arm_b.actuator,
        pacer,
    );

    let (event, outcome) = match &result {
        Ok(report) => (Event::VerifyPassed, Some(report.outcome)),
        Err(DualError::Refused { .. }) => (Event::VerifyFailed, None),
        Err(DualError::Actuator { .. }) => (Event::VerifyPassed, Some(PlaybackOutcome::Completed)),
    };
    match &result {
        Ok(DualReport { live_a, live_b, .. })
        | Err(DualError::Actuator { live_a, live_b, .. }) => {
            arm_a.live = live_a.clone();
            arm_b.live = live_b.clone();
        }
        Err(DualError::Refused { .. }) => {}
    }
    arm_a.state = arm_a.state.transition(event);
    arm_b.state = arm_b.state.transition(event);
    if let Some(outcome) = outcome {
        arm_a.finish_playback(outcome);
        arm_b.finish_playback(outcome);
    }

    result.map_err(ArmError::Dual)
}
