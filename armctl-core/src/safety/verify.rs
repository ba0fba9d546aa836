//! Start-pose verification
//!
//! Playback may only begin when the live pose matches the sequence's first
//! pose on every joint within a pulse tolerance. Magnets are not compared.

use core::fmt;

use heapless::Vec;

use crate::config::MAX_JOINTS;
use crate::motion::Pose;

/// One joint outside tolerance
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Deviation {
    /// Joint id (1-based)
    pub joint: u8,
    /// Live pulse
    pub live: u16,
    /// Pulse the sequence starts from
    pub expected: u16,
}

impl Deviation {
    /// Signed deviation of the live pulse from the expected one
    pub fn delta(&self) -> i32 {
        self.live as i32 - self.expected as i32
    }
}

impl fmt::Display for Deviation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "joint {}: live {} vs start {} ({:+})",
            self.joint,
            self.live,
            self.expected,
            self.delta()
        )
    }
}

/// Result of comparing the live pose against a start pose
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct VerifyReport {
    /// Tolerance used, in pulse units
    pub tolerance: u16,
    /// Joints whose |delta| exceeds the tolerance
    pub deviations: Vec<Deviation, MAX_JOINTS>,
    /// Live and start pose have different joint counts
    pub shape_mismatch: bool,
}

impl VerifyReport {
    /// Whether playback may start
    pub fn passed(&self) -> bool {
        self.deviations.is_empty() && !self.shape_mismatch
    }

    /// Largest absolute deviation, 0 when passed
    pub fn worst(&self) -> u32 {
        self.deviations
            .iter()
            .map(|d| d.delta().unsigned_abs())
            .max()
            .unwrap_or(0)
    }
}

impl fmt::Display for VerifyReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.passed() {
            return write!(f, "start pose within {} units", self.tolerance);
        }
        if self.shape_mismatch {
            f.write_str("joint count differs from the sequence")?;
            if !self.deviations.is_empty() {
                f.write_str("; ")?;
            }
        }
        for (i, deviation) in self.deviations.iter().enumerate() {
            if i > 0 {
                f.write_str("; ")?;
            }
            write!(f, "{}", deviation)?;
        }
        write!(f, " (tolerance {})", self.tolerance)
    }
}

/// Compare the live pose to a sequence's first pose
///
/// Passes only if `|live - first| <= tolerance` on every joint.
pub fn verify_start_pose(live: &Pose, first: &Pose, tolerance: u16) -> VerifyReport {
    let deviations = live
        .pulses()
        .iter()
        .zip(first.pulses())
        .enumerate()
        .filter(|(_, (&l, &e))| (l as i32 - e as i32).unsigned_abs() > tolerance as u32)
        .map(|(i, (&live, &expected))| Deviation {
            joint: i as u8 + 1,
            live,
            expected,
        })
        .collect();

    VerifyReport {
        tolerance,
        deviations,
        shape_mismatch: live.joint_count() != first.joint_count(),
    }
}
