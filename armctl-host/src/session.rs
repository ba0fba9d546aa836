//! Manual control sessions
//!
//! Feeds operator input lines to one or two arm controllers. Bad lines and
//! refused moves are reported and skipped; only a failing input stream ends
//! a session early.

use std::io::{self, BufRead};
use std::thread;
use std::time::{Duration, Instant};

use armctl_core::scheduler::ArmId;
use armctl_core::traits::Actuator;
use armctl_core::{Arm, ArmError};
use tracing::{debug, warn};

use crate::input::{parse_dual_input, parse_input, ManualInput};

/// Time source for manual input
pub trait Clock {
    /// Milliseconds since the session started
    fn now_ms(&self) -> u32;

    /// Let `ms` milliseconds pass
    fn pause(&mut self, ms: u32);
}

/// Real time
#[derive(Debug, Clone)]
pub struct WallClock {
    start: Instant,
}

impl WallClock {
    pub fn start() -> Self {
        Self {
            start: Instant::now(),
        }
    }
}

impl Clock for WallClock {
    fn now_ms(&self) -> u32 {
        u32::try_from(self.start.elapsed().as_millis()).unwrap_or(u32::MAX)
    }

    fn pause(&mut self, ms: u32) {
        thread::sleep(Duration::from_millis(ms as u64));
    }
}

/// What a session did
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SessionSummary {
    /// Inputs that changed a pose
    pub changed: usize,
    /// Inputs that were valid but left the pose as it was
    pub unchanged: usize,
    /// Inputs that could not be parsed or were refused
    pub rejected: usize,
}

impl SessionSummary {
    fn record(&mut self, line: &str, result: Result<bool, String>) {
        match result {
            Ok(true) => self.changed += 1,
            Ok(false) => self.unchanged += 1,
            Err(e) => {
                warn!("Rejected '{}': {}", line.trim(), e);
                self.rejected += 1;
            }
        }
    }
}

fn apply<A: Actuator>(arm: &mut Arm<A>, input: ManualInput, now_ms: u32) -> Result<bool, ArmError> {
    match input {
        ManualInput::Command(command) => arm.execute(&command, now_ms),
        ManualInput::Jog { joint, step } => arm.jog(joint, step, now_ms),
        ManualInput::Wait { .. } | ManualInput::Stop => Ok(false),
    }
}

/// Drive one arm from operator lines until `stop` or end of input
pub fn drive<A, R, C>(arm: &mut Arm<A>, reader: R, clock: &mut C) -> io::Result<SessionSummary>
where
    A: Actuator,
    R: BufRead,
    C: Clock,
{
    let mut summary = SessionSummary::default();
    for line in reader.lines() {
        let line = line?;
        let input = match parse_input(&line) {
            Ok(Some(input)) => input,
            Ok(None) => continue,
            Err(e) => {
                summary.record(&line, Err(e.to_string()));
                continue;
            }
        };

        match input {
            ManualInput::Stop => break,
            ManualInput::Wait { ms } => clock.pause(ms),
            _ => {
                let result = apply(arm, input, clock.now_ms()).map_err(|e| e.to_string());
                summary.record(&line, result);
            }
        }
    }
    debug!("Session ended: {:?}", summary);
    Ok(summary)
}

/// Drive two arms from prefixed operator lines
pub fn drive_dual<A1, A2, R, C>(
    arm_a: &mut Arm<A1>,
    arm_b: &mut Arm<A2>,
    reader: R,
    clock: &mut C,
) -> io::Result<SessionSummary>
where
    A1: Actuator,
    A2: Actuator,
    R: BufRead,
    C: Clock,
{
    let mut summary = SessionSummary::default();
    for line in reader.lines() {
        let line = line?;
        let (arm, input) = match parse_dual_input(&line) {
            Ok(Some(parsed)) => parsed,
            Ok(None) => continue,
            Err(e) => {
                summary.record(&line, Err(e.to_string()));
                continue;
            }
        };

        let now = clock.now_ms();
        let result = match (arm, input) {
            (_, ManualInput::Stop) => break,
            (_, ManualInput::Wait { ms }) => {
                clock.pause(ms);
                continue;
            }
            (Some(ArmId::A), input) => apply(arm_a, input, now),
            (Some(ArmId::B), input) => apply(arm_b, input, now),
            // parse_dual_input only returns moves with an arm
            (None, _) => continue,
        };
        summary.record(&line, result.map_err(|e| e.to_string()));
    }
    debug!("Dual session ended: {:?}", summary);
    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sim::SimulatedArm;
    use crate::transport::LineActuator;
    use armctl_core::config::ArmConfig;
    use armctl_core::state::ControlState;

    /// Clock that only moves on `wait`
    #[derive(Debug, Default)]
    struct StepClock {
        now: u32,
    }

    impl Clock for StepClock {
        fn now_ms(&self) -> u32 {
            self.now
        }

        fn pause(&mut self, ms: u32) {
            self.now += ms;
        }
    }

    fn arm() -> Arm<LineActuator<SimulatedArm>> {
        let config = ArmConfig::default();
        let board = SimulatedArm::new(&config);
        Arm::new(config, LineActuator::with_magnets(board, &[false, false]))
    }

    #[test]
    fn test_drive_records_changes() {
        let mut arm = arm();
        arm.start_recording("demo", 0).unwrap();

        let script = "\
# reach out
s2-1600
wait 100
j2+20
wait 50
j2+0
m1-1
s9-1500
bogus
wait 100
set
stop
s1-2000
";
        let mut clock = StepClock::default();
        let summary = drive(&mut arm, script.as_bytes(), &mut clock).unwrap();
        assert_eq!(
            summary,
            SessionSummary {
                changed: 4,
                unchanged: 1,
                rejected: 2
            }
        );

        let seq = arm.stop_recording().unwrap();
        let times: Vec<u32> = seq.poses().iter().map(|p| p.t_ms).collect();
        assert_eq!(times, [0, 100, 150, 250]);
        assert_eq!(seq.poses()[1].pose.pulses()[1], 1620);

        // The board followed, and `s1-2000` after stop was never sent
        let board = arm.actuator().get_ref();
        assert_eq!(board.pulses(), &[1500, 1450, 1500, 1500]);
        assert_eq!(board.magnets(), &[true, false]);
        assert_eq!(arm.state(), ControlState::Idle);
    }

    #[test]
    fn test_drive_dual_routes_by_prefix() {
        let mut a = arm();
        let mut b = arm();
        let script = "1:s1-1600\n2:s1-1400\nwait 20\n2:j1-10\ns1-1500\n";
        let mut clock = StepClock::default();
        let summary = drive_dual(&mut a, &mut b, script.as_bytes(), &mut clock).unwrap();

        assert_eq!(summary.changed, 3);
        assert_eq!(summary.rejected, 1);
        assert_eq!(a.live().pulses()[0], 1600);
        assert_eq!(b.live().pulses()[0], 1390);
    }
}
