//! Test doubles for the hardware traits

use alloc::vec::Vec;

use super::{Actuator, ActuatorError, Pacer, WaitOutcome};
use crate::motion::Pose;

/// Actuator that records every write
#[derive(Debug, Default)]
pub struct MockActuator {
    pub applied: Vec<Pose>,
    /// Fail the write with this index (0-based)
    pub fail_at: Option<usize>,
}

impl Actuator for MockActuator {
    fn apply(&mut self, pose: &Pose) -> Result<(), ActuatorError> {
        if self.fail_at == Some(self.applied.len()) {
            return Err(ActuatorError::Io);
        }
        self.applied.push(pose.clone());
        Ok(())
    }
}

/// Pacer that never sleeps and records requested offsets
#[derive(Debug, Default)]
pub struct MockPacer {
    pub waits: Vec<u32>,
    pub restarts: usize,
    /// Report cancellation on the wait with this index (0-based)
    pub cancel_at: Option<usize>,
    cancelled: bool,
}

impl MockPacer {
    /// Pacer that reports cancellation on wait `index` (0-based)
    pub fn cancel_at(index: usize) -> Self {
        Self {
            cancel_at: Some(index),
            ..Self::default()
        }
    }
}

impl Pacer for MockPacer {
    fn restart(&mut self) {
        self.restarts += 1;
    }

    fn wait_until(&mut self, offset_ms: u32) -> WaitOutcome {
        if self.cancel_at == Some(self.waits.len()) {
            self.cancelled = true;
        }
        self.waits.push(offset_ms);
        if self.cancelled {
            WaitOutcome::Cancelled
        } else {
            WaitOutcome::Elapsed
        }
    }

    fn is_cancelled(&self) -> bool {
        self.cancelled
    }
}
