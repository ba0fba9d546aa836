//! Trim calibration persistence
//!
//! Loads and saves bench-measured trims as postcard-encoded
//! `CalibrationData` next to the arm configuration.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use armctl_core::config::{ArmConfig, CalibrationData, ConfigError};
use tracing::{debug, info, warn};

/// Trim persistence errors
#[derive(Debug, thiserror::Error)]
pub enum TrimError {
    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to decode trims: {0}")]
    Deserialize(#[source] postcard::Error),

    #[error("failed to encode trims: {0}")]
    Serialize(#[source] postcard::Error),

    #[error("trim file CRC mismatch")]
    CrcMismatch,

    #[error("trim file has an unknown magic or version")]
    InvalidFormat,

    #[error("no free slot for joint {0}")]
    NoSlot(u8),

    #[error("stored trims do not fit the arm: {0}")]
    Apply(ConfigError),
}

/// Load trims, returning `None` when no file exists
pub fn load_trims(path: &Path) -> Result<Option<CalibrationData>, TrimError> {
    let bytes = match fs::read(path) {
        Ok(bytes) => bytes,
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            debug!("No trim file at {}", path.display());
            return Ok(None);
        }
        Err(source) => {
            return Err(TrimError::Io {
                path: path.to_path_buf(),
                source,
            })
        }
    };
    debug!("Read {} bytes of trims from {}", bytes.len(), path.display());

    let data: CalibrationData = postcard::from_bytes(&bytes).map_err(TrimError::Deserialize)?;
    if !data.is_valid() {
        return Err(TrimError::InvalidFormat);
    }
    if !data.verify_crc() {
        warn!("Trim file {} CRC mismatch", path.display());
        return Err(TrimError::CrcMismatch);
    }
    Ok(Some(data))
}

/// Save trims
///
/// Updates the CRC before saving.
pub fn save_trims(path: &Path, data: &mut CalibrationData) -> Result<(), TrimError> {
    data.update_crc();
    let bytes = postcard::to_allocvec(data).map_err(TrimError::Serialize)?;

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(|source| TrimError::Io {
            path: parent.to_path_buf(),
            source,
        })?;
    }
    fs::write(path, &bytes).map_err(|source| TrimError::Io {
        path: path.to_path_buf(),
        source,
    })?;

    info!("Saved trims to {} ({} bytes)", path.display(), bytes.len());
    log_trim_summary(data);
    Ok(())
}

/// Update one joint's trim in the file, keeping the others
pub fn save_joint_trim(path: &Path, joint: u8, trim: i16) -> Result<CalibrationData, TrimError> {
    let mut data = load_trims(path)?.unwrap_or_default();
    if !data.set(joint, trim) {
        return Err(TrimError::NoSlot(joint));
    }
    save_trims(path, &mut data)?;
    Ok(data)
}

/// Apply stored trims to a configuration, if a trim file exists
///
/// A damaged file is reported and ignored so the arm still starts with the
/// configured trims.
pub fn apply_stored_trims(path: &Path, config: &mut ArmConfig) -> Result<(), TrimError> {
    let data = match load_trims(path) {
        Ok(Some(data)) => data,
        Ok(None) => return Ok(()),
        Err(e @ (TrimError::CrcMismatch | TrimError::InvalidFormat | TrimError::Deserialize(_))) => {
            warn!("Ignoring trims in {}: {}", path.display(), e);
            return Ok(());
        }
        Err(e) => return Err(e),
    };

    data.apply_to(config).map_err(TrimError::Apply)?;
    info!("Applied stored trims from {}", path.display());
    log_trim_summary(&data);
    Ok(())
}

fn log_trim_summary(data: &CalibrationData) {
    for entry in data.trims.iter().filter(|t| t.valid) {
        debug!("  Joint {}: trim {:+}", entry.joint, entry.trim);
    }
}
