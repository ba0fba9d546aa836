//! Control arbitration
//!
//! Decides whether manual input or playback holds the arm.
//! The state machine is explicit, finite, and deterministic.

pub mod events;
pub mod machine;

pub use events::Event;
pub use machine::ControlState;
