//! Sequence store
//!
//! One TOML file per sequence under the store directory:
//!
//! ```toml
//! name = "wave"
//! joints = 4
//! magnets = 2
//!
//! [[pose]]
//! t_ms = 0
//! pulses = [1500, 1450, 1500, 1500]
//! magnets = [false, false]
//! ```
//!
//! Saving never overwrites: a taken name gets `_1`, `_2`, ... appended.
//! Dual recordings live in `dual/`, the last commanded pose of each arm in
//! `.state/`.

use std::fs::{self, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use armctl_core::motion::{Pose, Sequence, SequenceError};
use armctl_core::scheduler::SequenceLibrary;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::timeline::DualRecording;

/// File extension of stored sequences
pub const SEQUENCE_EXT: &str = "toml";

const DUAL_DIR: &str = "dual";
const STATE_DIR: &str = ".state";

/// Errors raised by the sequence store
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to parse {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("failed to encode '{name}': {source}")]
    Encode {
        name: String,
        #[source]
        source: toml::ser::Error,
    },

    #[error("invalid name '{0}' (use letters, digits, '-' and '_')")]
    InvalidName(String),

    #[error("'{0}' not found")]
    NotFound(String),

    #[error("'{name}' is corrupt: {reason}")]
    Corrupt { name: String, reason: SequenceError },
}

#[derive(Debug, Serialize, Deserialize)]
struct SequenceFile {
    name: String,
    joints: u8,
    magnets: u8,
    #[serde(default, rename = "pose")]
    poses: Vec<PoseRecord>,
}

#[derive(Debug, Serialize, Deserialize)]
struct PoseRecord {
    t_ms: u32,
    pulses: Vec<u16>,
    #[serde(default)]
    magnets: Vec<bool>,
}

#[derive(Debug, Serialize, Deserialize)]
struct LiveFile {
    pulses: Vec<u16>,
    #[serde(default)]
    magnets: Vec<bool>,
}

impl SequenceFile {
    fn from_sequence(sequence: &Sequence) -> Self {
        Self {
            name: sequence.name().to_string(),
            joints: sequence.joint_count(),
            magnets: sequence.magnet_count(),
            poses: sequence
                .poses()
                .iter()
                .map(|p| PoseRecord {
                    t_ms: p.t_ms,
                    pulses: p.pose.pulses().to_vec(),
                    magnets: p.pose.magnets().to_vec(),
                })
                .collect(),
        }
    }

    fn into_sequence(self, name: &str) -> Result<Sequence, SequenceError> {
        let mut sequence = Sequence::new(name, self.joints, self.magnets);
        for record in self.poses {
            sequence.push(record.t_ms, Pose::new(&record.pulses, &record.magnets)?)?;
        }
        Ok(sequence)
    }
}

/// Check a sequence or arm name for use as a file stem
pub fn validate_name(name: &str) -> Result<&str, StoreError> {
    let trimmed = name.trim();
    let valid = !trimmed.is_empty()
        && trimmed
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
    if valid {
        Ok(trimmed)
    } else {
        Err(StoreError::InvalidName(name.to_string()))
    }
}

fn io_error(path: &Path) -> impl FnOnce(io::Error) -> StoreError + '_ {
    move |source| StoreError::Io {
        path: path.to_path_buf(),
        source,
    }
}

/// Directory of saved sequences
#[derive(Debug, Clone)]
pub struct SequenceStore {
    root: PathBuf,
}

impl SequenceStore {
    /// Open a store, creating its directory if needed
    pub fn open(root: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let root = root.into();
        fs::create_dir_all(&root).map_err(io_error(&root))?;
        debug!("Sequence store at {}", root.display());
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn file_path(dir: &Path, name: &str) -> PathBuf {
        dir.join(format!("{}.{}", name, SEQUENCE_EXT))
    }

    /// Write `render(name)` under the first free name derived from `base`
    fn create_unique(
        dir: &Path,
        base: &str,
        mut render: impl FnMut(&str) -> Result<String, StoreError>,
    ) -> Result<String, StoreError> {
        fs::create_dir_all(dir).map_err(io_error(dir))?;

        let mut suffix = 0u32;
        loop {
            let name = if suffix == 0 {
                base.to_string()
            } else {
                format!("{}_{}", base, suffix)
            };
            let text = render(&name)?;
            let path = Self::file_path(dir, &name);

            // create_new fails on existing files, so nothing is ever replaced
            match OpenOptions::new().write(true).create_new(true).open(&path) {
                Ok(file) => {
                    Self::fill(file, &path, &text)?;
                    if suffix > 0 {
                        debug!("'{}' taken, saved as '{}'", base, name);
                    }
                    return Ok(name);
                }
                Err(e) if e.kind() == io::ErrorKind::AlreadyExists => suffix += 1,
                Err(e) => return Err(io_error(&path)(e)),
            }
        }
    }

    /// Write a freshly created file, removing it again if the write fails
    fn fill(mut out: impl Write, path: &Path, text: &str) -> Result<(), StoreError> {
        let result = out.write_all(text.as_bytes()).and_then(|()| out.flush());
        drop(out);
        result.map_err(|e| {
            if let Err(cleanup) = fs::remove_file(path) {
                warn!("Could not remove partial {}: {}", path.display(), cleanup);
            }
            io_error(path)(e)
        })
    }

    fn read(path: &Path, name: &str) -> Result<String, StoreError> {
        fs::read_to_string(path).map_err(|source| {
            if source.kind() == io::ErrorKind::NotFound {
                StoreError::NotFound(name.to_string())
            } else {
                io_error(path)(source)
            }
        })
    }

    fn list_dir(dir: &Path) -> Result<Vec<String>, StoreError> {
        let entries = match fs::read_dir(dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(io_error(dir)(e)),
        };

        let mut names = Vec::new();
        for entry in entries {
            let path = entry.map_err(io_error(dir))?.path();
            if !path.is_file() || path.extension().and_then(|e| e.to_str()) != Some(SEQUENCE_EXT) {
                continue;
            }
            if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
                names.push(stem.to_string());
            }
        }
        names.sort();
        Ok(names)
    }

    /// Save a sequence under its own name, or the first free suffixed name
    ///
    /// Returns the name it was saved under.
    pub fn save(&self, sequence: &Sequence) -> Result<String, StoreError> {
        let base = validate_name(sequence.name())?;
        let mut file = SequenceFile::from_sequence(sequence);

        let name = Self::create_unique(&self.root, base, |name| {
            file.name = name.to_string();
            toml::to_string(&file).map_err(|source| StoreError::Encode {
                name: name.to_string(),
                source,
            })
        })?;
        info!("Saved sequence '{}' ({} poses)", name, sequence.len());
        Ok(name)
    }

    /// Load a sequence by name
    pub fn load(&self, name: &str) -> Result<Sequence, StoreError> {
        let name = validate_name(name)?;
        let path = Self::file_path(&self.root, name);
        let text = Self::read(&path, name)?;

        let file: SequenceFile = toml::from_str(&text).map_err(|source| StoreError::Parse {
            path: path.clone(),
            source,
        })?;
        if file.name != name {
            debug!("{} names itself '{}'", path.display(), file.name);
        }
        file.into_sequence(name).map_err(|reason| StoreError::Corrupt {
            name: name.to_string(),
            reason,
        })
    }

    /// Names of all saved sequences, sorted
    pub fn list(&self) -> Result<Vec<String>, StoreError> {
        Self::list_dir(&self.root)
    }

    /// Save a two-arm recording
    pub fn save_dual(&self, recording: &DualRecording) -> Result<String, StoreError> {
        let base = validate_name(&recording.name)?;
        let mut recording = recording.clone();
        let name = Self::create_unique(&self.root.join(DUAL_DIR), base, |name| {
            recording.name = name.to_string();
            toml::to_string(&recording).map_err(|source| StoreError::Encode {
                name: name.to_string(),
                source,
            })
        })?;
        info!(
            "Saved dual recording '{}' ({} events)",
            name,
            recording.timeline.len()
        );
        Ok(name)
    }

    /// Load a two-arm recording
    pub fn load_dual(&self, name: &str) -> Result<DualRecording, StoreError> {
        let name = validate_name(name)?;
        let path = Self::file_path(&self.root.join(DUAL_DIR), name);
        let text = Self::read(&path, name)?;

        let mut recording: DualRecording =
            toml::from_str(&text).map_err(|source| StoreError::Parse { path, source })?;
        recording.name = name.to_string();
        Ok(recording)
    }

    /// Names of all saved dual recordings, sorted
    pub fn list_dual(&self) -> Result<Vec<String>, StoreError> {
        Self::list_dir(&self.root.join(DUAL_DIR))
    }

    /// Remember the last commanded pose of an arm
    pub fn save_live(&self, arm: &str, pose: &Pose) -> Result<(), StoreError> {
        let arm = validate_name(arm)?;
        let dir = self.root.join(STATE_DIR);
        fs::create_dir_all(&dir).map_err(io_error(&dir))?;

        let file = LiveFile {
            pulses: pose.pulses().to_vec(),
            magnets: pose.magnets().to_vec(),
        };
        let text = toml::to_string(&file).map_err(|source| StoreError::Encode {
            name: arm.to_string(),
            source,
        })?;
        let path = Self::file_path(&dir, arm);
        fs::write(&path, text).map_err(io_error(&path))?;
        debug!("Live pose of '{}': {:?}", arm, pose.pulses());
        Ok(())
    }

    /// Last commanded pose of an arm, if one was saved and is readable
    pub fn load_live(&self, arm: &str) -> Option<Pose> {
        let arm = validate_name(arm).ok()?;
        let path = Self::file_path(&self.root.join(STATE_DIR), arm);
        let text = fs::read_to_string(&path).ok()?;

        let parsed = toml::from_str::<LiveFile>(&text)
            .ok()
            .and_then(|file| Pose::new(&file.pulses, &file.magnets).ok());
        if parsed.is_none() {
            warn!("Ignoring unreadable live pose {}", path.display());
        }
        parsed
    }
}

impl SequenceLibrary for SequenceStore {
    type Error = StoreError;

    fn load(&mut self, name: &str) -> Result<Sequence, StoreError> {
        SequenceStore::load(self, name).map_err(|e| {
            warn!("Cannot load '{}': {}", name, e);
            e
        })
    }
}
