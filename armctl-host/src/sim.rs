//! Servo board simulator
//!
//! Interprets the line grammar the way the board firmware does: valid
//! commands move the simulated servos and are echoed, out-of-range commands
//! are silently ignored, malformed lines get an `invalid command` reply.

use std::collections::VecDeque;
use std::io::{self, Read, Write};

use armctl_core::config::{ArmConfig, JointConfig};
use armctl_core::motion::Pose;
use armctl_protocol::{Command, LineParser};
use tracing::trace;

/// In-memory servo board
#[derive(Debug, Clone)]
pub struct SimulatedArm {
    joints: Vec<JointConfig>,
    pulses: Vec<u16>,
    magnets: Vec<bool>,
    parser: LineParser,
    output: VecDeque<u8>,
    accepted: usize,
    ignored: usize,
}

impl SimulatedArm {
    /// Board for an arm, starting at its calibrated neutral
    pub fn new(config: &ArmConfig) -> Self {
        Self {
            joints: config.joints().to_vec(),
            pulses: config.neutral_pose().pulses().to_vec(),
            magnets: vec![false; config.magnet_count() as usize],
            parser: LineParser::new(),
            output: VecDeque::new(),
            accepted: 0,
            ignored: 0,
        }
    }

    /// Board already holding `pose`, e.g. the last pose commanded in an
    /// earlier run; falls back to neutral if the pose does not fit
    pub fn resume(config: &ArmConfig, pose: &Pose) -> Self {
        let mut board = Self::new(config);
        if config.fits(pose) {
            board.pulses = config.clamp_pose(pose).pulses().to_vec();
            board.magnets = pose.magnets().to_vec();
        }
        board
    }

    /// Current servo pulses
    pub fn pulses(&self) -> &[u16] {
        &self.pulses
    }

    /// Current magnet states
    pub fn magnets(&self) -> &[bool] {
        &self.magnets
    }

    /// Commands that changed (or re-asserted) board state
    pub fn accepted(&self) -> usize {
        self.accepted
    }

    /// Commands dropped for being out of range
    pub fn ignored(&self) -> usize {
        self.ignored
    }

    fn reply(&mut self, text: &str) {
        self.output.extend(text.as_bytes());
        self.output.push_back(b'\n');
    }

    fn handle_line(&mut self, line: &str) {
        if line.trim().is_empty() {
            return;
        }
        let command = match Command::parse(line) {
            Ok(command) => command,
            Err(e) => {
                self.reply(&format!("invalid command '{}': {}", line.trim(), e));
                return;
            }
        };
        trace!("sim <- {}", command);

        match command {
            Command::Neutral => {
                for (slot, joint) in self.pulses.iter_mut().zip(&self.joints) {
                    *slot = joint.neutral_pulse();
                }
                self.accepted += 1;
                self.reply("all servos neutral");
            }
            Command::SetJoint { joint, pulse } => {
                let index = joint as usize;
                match self.joints.get(index.wrapping_sub(1)) {
                    Some(config) if index > 0 && config.contains(pulse) => {
                        self.pulses[index - 1] = pulse;
                        self.accepted += 1;
                        self.reply(&format!("servo {} -> {}", joint, pulse));
                    }
                    _ => self.ignored += 1,
                }
            }
            Command::SetMagnet { magnet, engaged } => {
                let index = magnet as usize;
                match self.magnets.get_mut(index.wrapping_sub(1)) {
                    Some(slot) if index > 0 => {
                        *slot = engaged;
                        self.accepted += 1;
                        let state = if engaged { "on" } else { "off" };
                        self.reply(&format!("magnet {} {}", magnet, state));
                    }
                    _ => self.ignored += 1,
                }
            }
        }
    }
}

impl Write for SimulatedArm {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        for &byte in buf {
            match self.parser.feed(byte) {
                Ok(Some(line)) => self.handle_line(&line),
                Ok(None) => {}
                Err(e) => self.reply(&format!("error: {}", e)),
            }
        }
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl Read for SimulatedArm {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.output.read(buf)
    }
}
