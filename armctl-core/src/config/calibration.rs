//! Trim calibration data types
//!
//! Stores per-joint trim offsets found on the bench so they survive restarts
//! without editing the arm configuration.

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use super::arm::{ArmConfig, ConfigError, MAX_JOINTS};

/// Magic number to identify valid calibration data
pub const CALIBRATION_MAGIC: u32 = 0x41524D54; // "ARMT"

/// Current calibration data version
pub const CALIBRATION_VERSION: u8 = 1;

/// Trim override for a single joint
///
/// This struct is serialized using postcard.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct TrimEntry {
    /// Joint id (1-based)
    pub joint: u8,
    /// Whether this slot is in use
    pub valid: bool,
    /// Trim in pulse units
    pub trim: i16,
}

impl TrimEntry {
    /// Create a new trim entry
    pub const fn new(joint: u8, trim: i16) -> Self {
        Self {
            joint,
            valid: true,
            trim,
        }
    }
}

/// Complete trim calibration with a header for validation
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct CalibrationData {
    /// Magic number for validation
    pub magic: u32,
    /// Data format version
    pub version: u8,
    /// Per-joint trims
    pub trims: [TrimEntry; MAX_JOINTS],
    /// CRC32 checksum (calculated over magic..trims)
    pub crc: u32,
}

impl Default for CalibrationData {
    fn default() -> Self {
        Self::new()
    }
}

impl CalibrationData {
    /// Create empty calibration data
    pub const fn new() -> Self {
        Self {
            magic: CALIBRATION_MAGIC,
            version: CALIBRATION_VERSION,
            trims: [TrimEntry {
                joint: 0,
                valid: false,
                trim: 0,
            }; MAX_JOINTS],
            crc: 0,
        }
    }

    /// Capture the trims currently configured on an arm
    pub fn from_config(config: &ArmConfig) -> Self {
        let mut data = Self::new();
        for joint in config.joints() {
            data.set(joint.id, joint.calibration.trim);
        }
        data.update_crc();
        data
    }

    /// Check if the header matches (magic and version)
    pub fn is_valid(&self) -> bool {
        self.magic == CALIBRATION_MAGIC && self.version == CALIBRATION_VERSION
    }

    /// Trim stored for a joint
    pub fn get(&self, joint: u8) -> Option<i16> {
        self.trims
            .iter()
            .find(|t| t.valid && t.joint == joint)
            .map(|t| t.trim)
    }

    /// Store a trim, reusing the joint's slot or the first free one
    ///
    /// Returns false if no slot is available.
    pub fn set(&mut self, joint: u8, trim: i16) -> bool {
        let entry = TrimEntry::new(joint, trim);

        if let Some(slot) = self.trims.iter_mut().find(|t| t.valid && t.joint == joint) {
            *slot = entry;
            return true;
        }
        if let Some(slot) = self.trims.iter_mut().find(|t| !t.valid) {
            *slot = entry;
            return true;
        }
        false
    }

    /// Apply stored trims to a configuration
    ///
    /// Entries for joints the arm does not have are rejected.
    pub fn apply_to(&self, config: &mut ArmConfig) -> Result<(), ConfigError> {
        for entry in self.trims.iter().filter(|t| t.valid) {
            config.set_trim(entry.joint, entry.trim)?;
        }
        config.validate()
    }

    /// Calculate CRC32 over everything except the crc field
    pub fn calculate_crc(&self) -> u32 {
        let mut crc: u32 = 0xFFFFFFFF;

        crc = crc32_update(crc, &self.magic.to_le_bytes());
        crc = crc32_update(crc, &[self.version]);

        for entry in &self.trims {
            crc = crc32_update(crc, &[entry.joint, entry.valid as u8]);
            crc = crc32_update(crc, &entry.trim.to_le_bytes());
        }

        !crc
    }

    /// Update the CRC field
    pub fn update_crc(&mut self) {
        self.crc = self.calculate_crc();
    }

    /// Verify the CRC is correct
    pub fn verify_crc(&self) -> bool {
        self.crc == self.calculate_crc()
    }
}

/// CRC32 update (IEEE 802.3 polynomial, reflected)
fn crc32_update(crc: u32, data: &[u8]) -> u32 {
    const POLY: u32 = 0xEDB88320;
    let mut crc = crc;

    for &byte in data {
        crc ^= byte as u32;
        for _ in 0..8 {
            if crc & 1 != 0 {
                crc = (crc >> 1) ^ POLY;
            } else {
                crc >>= 1;
            }
        }
    }

    crc
}
