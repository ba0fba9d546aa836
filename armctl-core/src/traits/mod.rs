//! Hardware abstraction traits
//!
//! These traits define the interface between the application logic
//! and the board link or host runtime.

pub mod actuator;
pub mod pacer;

#[cfg(test)]
pub(crate) mod mock;

pub use actuator::{Actuator, ActuatorError};
pub use pacer::{Pacer, WaitOutcome};
