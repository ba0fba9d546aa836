//! Link geometry of the kinematic chain

use heapless::Vec;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Maximum links in a chain (tool offset not included)
pub const MAX_LINKS: usize = 8;

/// One rigid link
///
/// Offsets are in millimetres, expressed in the frame of the accumulated
/// pitch: `up` runs along the link when all pitch angles are zero,
/// `forward` points away from the base, `lateral` to the left.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct LinkConfig {
    /// Pitch joint (by id) rotating this link and everything after it
    pub joint: Option<u8>,
    /// Offset along the arm's reach direction
    pub forward: f32,
    /// Sideways offset, unaffected by pitch
    pub lateral: f32,
    /// Offset along the link axis
    pub up: f32,
}

impl LinkConfig {
    /// Fixed vertical link (no joint)
    pub const fn column(height: f32) -> Self {
        Self {
            joint: None,
            forward: 0.0,
            lateral: 0.0,
            up: height,
        }
    }

    /// Straight link rotated by a pitch joint
    pub const fn pitched(joint: u8, length: f32) -> Self {
        Self {
            joint: Some(joint),
            forward: 0.0,
            lateral: 0.0,
            up: length,
        }
    }
}

/// Tool tip offset from the last link
#[derive(Debug, Clone, Copy, PartialEq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct ToolOffset {
    /// Tip length along the last link
    pub length: f32,
    /// Sideways offset of the tip
    pub lateral: f32,
}

/// Complete chain geometry
#[derive(Debug, Clone, PartialEq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Geometry {
    /// Links from the base outward
    pub links: Vec<LinkConfig, MAX_LINKS>,
    /// Tool offset applied after the last link
    pub tool: ToolOffset,
}
