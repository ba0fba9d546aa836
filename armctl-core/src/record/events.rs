//! Pose change events emitted by manual control

use crate::motion::Pose;

/// What caused a pose change
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ChangeCause {
    /// Joint moved (jog or absolute set), by joint id
    Joint(u8),
    /// Magnet toggled, by magnet id
    Magnet(u8),
    /// All joints driven to neutral
    Neutral,
}

/// A manual change to the live pose
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct PoseChange {
    /// Controller clock in milliseconds
    pub at_ms: u32,
    /// Complete pose after the change
    pub pose: Pose,
    pub cause: ChangeCause,
}

/// Subscriber to manual pose changes
pub trait PoseObserver {
    /// Called after every change that altered the live pose
    fn on_pose_change(&mut self, change: &PoseChange);
}
