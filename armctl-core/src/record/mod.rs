//! Recording of operator-demonstrated motion
//!
//! Manual control emits [`PoseChange`] events; the [`Recorder`] subscribes
//! as a [`PoseObserver`] while a recording is active.

pub mod events;
pub mod recorder;

pub use events::{ChangeCause, PoseChange, PoseObserver};
pub use recorder::{RecordError, Recorder};
