//! Event-driven sequence recorder
//!
//! `Idle -> Recording -> Idle`. While recording, every pose change event
//! appends a full snapshot stamped relative to the start time. There is no
//! clock sampling: a recording of N changes holds N entries.

use core::fmt;

use super::events::{PoseChange, PoseObserver};
use crate::motion::{Sequence, SequenceError};

/// Recorder errors
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum RecordError {
    /// `start` while already recording
    AlreadyRecording,
    /// `stop` while idle
    NotRecording,
    /// A change could not be appended
    Rejected(SequenceError),
}

impl fmt::Display for RecordError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RecordError::AlreadyRecording => f.write_str("already recording"),
            RecordError::NotRecording => f.write_str("not recording"),
            RecordError::Rejected(e) => write!(f, "change rejected: {}", e),
        }
    }
}

/// Session state of the recorder
#[derive(Debug)]
enum Session {
    Idle,
    Recording {
        sequence: Sequence,
        start_ms: u32,
        /// First append failure, reported on stop
        error: Option<SequenceError>,
    },
}

/// Collects pose change events into a [`Sequence`]
#[derive(Debug)]
pub struct Recorder {
    session: Session,
}

impl Default for Recorder {
    fn default() -> Self {
        Self::new()
    }
}

impl Recorder {
    pub fn new() -> Self {
        Self {
            session: Session::Idle,
        }
    }

    pub fn is_recording(&self) -> bool {
        matches!(self.session, Session::Recording { .. })
    }

    /// Begin a new sequence; timestamps are relative to `start_ms`
    pub fn start(&mut self, name: &str, joints: u8, magnets: u8, start_ms: u32) -> Result<(), RecordError> {
        if self.is_recording() {
            return Err(RecordError::AlreadyRecording);
        }
        self.session = Session::Recording {
            sequence: Sequence::new(name, joints, magnets),
            start_ms,
            error: None,
        };
        Ok(())
    }

    /// Entries captured so far
    pub fn captured(&self) -> usize {
        match &self.session {
            Session::Recording { sequence, .. } => sequence.len(),
            Session::Idle => 0,
        }
    }

    /// Finish and hand back the sequence
    ///
    /// The recorder is idle afterwards, even if an append had failed.
    pub fn stop(&mut self) -> Result<Sequence, RecordError> {
        match core::mem::replace(&mut self.session, Session::Idle) {
            Session::Idle => Err(RecordError::NotRecording),
            Session::Recording {
                error: Some(error), ..
            } => Err(RecordError::Rejected(error)),
            Session::Recording { sequence, .. } => Ok(sequence),
        }
    }

    /// Drop the current session without producing a sequence
    pub fn discard(&mut self) {
        self.session = Session::Idle;
    }
}

impl PoseObserver for Recorder {
    fn on_pose_change(&mut self, change: &PoseChange) {
        let Session::Recording {
            sequence,
            start_ms,
            error,
        } = &mut self.session
        else {
            return;
        };
        if error.is_some() {
            return;
        }

        if sequence.last().is_some_and(|last| last.pose == change.pose) {
            return;
        }

        let t_ms = change.at_ms.saturating_sub(*start_ms);
        if let Err(e) = sequence.push(t_ms, change.pose.clone()) {
            *error = Some(e);
        }
    }
}
