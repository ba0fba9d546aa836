//! Servo actuator trait
//!
//! Abstracts over the link to the servo board (serial line, simulator,
//! test double).

use core::fmt;

use crate::motion::Pose;

/// Errors that can occur while commanding servos
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ActuatorError {
    /// Write to the board failed
    Io,
    /// Board is not connected
    Disconnected,
    /// Board answered with an error line
    Rejected,
    /// Command could not be encoded
    Encoding,
}

impl fmt::Display for ActuatorError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ActuatorError::Io => f.write_str("write to servo board failed"),
            ActuatorError::Disconnected => f.write_str("servo board not connected"),
            ActuatorError::Rejected => f.write_str("servo board rejected a command"),
            ActuatorError::Encoding => f.write_str("command could not be encoded"),
        }
    }
}

/// Trait for servo board links
///
/// Commands are synchronous: a call returns once the command has been
/// handed to the board.
pub trait Actuator {
    /// Drive every joint (and magnet) to the given pose
    ///
    /// One pose is one write; implementations must not leave the board with
    /// only part of a pose applied on success.
    fn apply(&mut self, pose: &Pose) -> Result<(), ActuatorError>;
}

impl<T: Actuator + ?Sized> Actuator for &mut T {
    fn apply(&mut self, pose: &Pose) -> Result<(), ActuatorError> {
        (**self).apply(pose)
    }
}

