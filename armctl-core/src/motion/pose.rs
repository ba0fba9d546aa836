//! Pose value type

use heapless::Vec;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use super::sequence::SequenceError;
use crate::config::{MAX_JOINTS, MAX_MAGNETS};

/// Snapshot of every joint pulse and magnet state
///
/// Indices are 0-based slots; slot `i` holds joint id `i + 1`.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Pose {
    pulses: Vec<u16, MAX_JOINTS>,
    magnets: Vec<bool, MAX_MAGNETS>,
}

impl Pose {
    /// Create a pose from slices
    pub fn new(pulses: &[u16], magnets: &[bool]) -> Result<Self, SequenceError> {
        Ok(Self {
            pulses: Vec::from_slice(pulses).map_err(|_| SequenceError::CapacityExceeded)?,
            magnets: Vec::from_slice(magnets).map_err(|_| SequenceError::CapacityExceeded)?,
        })
    }

    pub(crate) fn from_parts(pulses: Vec<u16, MAX_JOINTS>, magnets: Vec<bool, MAX_MAGNETS>) -> Self {
        Self { pulses, magnets }
    }

    /// Joint pulses in joint order
    pub fn pulses(&self) -> &[u16] {
        &self.pulses
    }

    /// Magnet states in magnet order
    pub fn magnets(&self) -> &[bool] {
        &self.magnets
    }

    pub fn joint_count(&self) -> usize {
        self.pulses.len()
    }

    pub fn magnet_count(&self) -> usize {
        self.magnets.len()
    }

    /// Pulse at a slot
    pub fn pulse(&self, index: usize) -> Option<u16> {
        self.pulses.get(index).copied()
    }

    /// Magnet state at a slot
    pub fn magnet(&self, index: usize) -> Option<bool> {
        self.magnets.get(index).copied()
    }

    /// Set the pulse at a slot; returns whether the pose changed
    pub fn set_pulse(&mut self, index: usize, pulse: u16) -> bool {
        match self.pulses.get_mut(index) {
            Some(slot) if *slot != pulse => {
                *slot = pulse;
                true
            }
            _ => false,
        }
    }

    /// Set the magnet at a slot; returns whether the pose changed
    pub fn set_magnet(&mut self, index: usize, engaged: bool) -> bool {
        match self.magnets.get_mut(index) {
            Some(slot) if *slot != engaged => {
                *slot = engaged;
                true
            }
            _ => false,
        }
    }

    /// Same joint and magnet counts as `other`
    pub fn same_shape(&self, other: &Pose) -> bool {
        self.joint_count() == other.joint_count() && self.magnet_count() == other.magnet_count()
    }
}
