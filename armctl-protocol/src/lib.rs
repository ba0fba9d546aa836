//! Servo Arm Command Protocol
//!
//! This crate defines the text protocol between the host controller and the
//! servo board that drives the arm. Every command is a single ASCII line:
//!
//! ```text
//! set              drive every joint to its calibrated neutral
//! s<joint>-<pulse> set one joint (1-indexed) to an absolute pulse in µs
//! m<magnet>-<0|1>  release (0) or engage (1) an electromagnet
//! ```
//!
//! Commands are case-insensitive. The board answers with human-readable
//! status lines; there is no structured acknowledgement, so the absence of an
//! error line is success.

#![no_std]
#![deny(unsafe_code)]

#[cfg(feature = "std")]
extern crate std;

pub mod command;
pub mod line;
pub mod response;

pub use command::{Command, CommandError, Limits};
pub use line::{LineError, LineParser, MAX_LINE_LEN};
pub use response::Response;
