//! Host runtime for the servo arm controller
//!
//! Everything that needs an operating system lives here:
//!
//! - TOML arm configuration and postcard trim persistence
//! - Sequence store, dual-arm timelines and live pose state
//! - Line-protocol actuator over a serial port, and a board simulator
//! - Wall-clock pacing with Ctrl-C cancellation
//! - Operator input sessions and logging setup

#![deny(unsafe_code)]

pub mod config;
pub mod input;
pub mod logging;
pub mod pacer;
pub mod session;
pub mod sim;
pub mod store;
pub mod timeline;
pub mod transport;
pub mod trims;

pub use config::{load_config, ConfigLoadError};
pub use pacer::ThreadPacer;
pub use sim::SimulatedArm;
pub use store::{SequenceStore, StoreError};
pub use timeline::DualRecording;
pub use transport::{LineActuator, Link, TransportError};
