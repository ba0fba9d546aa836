//! Arm configuration files
//!
//! An `arm.toml` describes one arm:
//!
//! ```toml
//! name = "left"
//! tolerance = 20
//! magnets = 2
//!
//! [[joint]]
//! id = 1
//! degrees_per_unit = 0.135
//! axis = "yaw"
//!
//! [[joint]]
//! id = 2
//! trim = -50
//! degrees_per_unit = 0.135
//!
//! [geometry]
//! links = [{ up = 62.3 }, { joint = 2, up = 120.0 }]
//! tool = { length = 45.6, lateral = 4.9 }
//! ```
//!
//! Omitted joint fields take the standard servo defaults (500-2500 µs,
//! neutral 1500, no trim, normal direction, pitch axis).

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use armctl_core::config::{
    ArmConfig, ConfigError, Geometry, JointAxis, JointConfig, LinkConfig, ToolOffset,
    DEFAULT_NEUTRAL, DEFAULT_PULSE_MAX, DEFAULT_PULSE_MIN, DEFAULT_TOLERANCE,
};
use armctl_core::kinematics::{Direction, JointCalibration};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

/// Errors raised while loading an arm configuration
#[derive(Debug, thiserror::Error)]
pub enum ConfigLoadError {
    #[error("failed to read {path}: {source}")]
    Read {
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

    #[error("failed to encode configuration: {0}")]
    Encode(#[from] toml::ser::Error),

    #[error("geometry has too many links")]
    TooManyLinks,

    #[error("invalid arm configuration: {0}")]
    Invalid(ConfigError),
}

impl From<ConfigError> for ConfigLoadError {
    fn from(e: ConfigError) -> Self {
        ConfigLoadError::Invalid(e)
    }
}

fn default_name() -> String {
    String::from("arm")
}

fn default_tolerance() -> u16 {
    DEFAULT_TOLERANCE
}

fn default_pulse_min() -> u16 {
    DEFAULT_PULSE_MIN
}

fn default_pulse_max() -> u16 {
    DEFAULT_PULSE_MAX
}

fn default_neutral() -> u16 {
    DEFAULT_NEUTRAL
}

/// On-disk form of an arm configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ArmFile {
    #[serde(default = "default_name")]
    pub name: String,
    /// Start-pose tolerance in pulse units
    #[serde(default = "default_tolerance")]
    pub tolerance: u16,
    #[serde(default)]
    pub magnets: u8,
    #[serde(rename = "joint")]
    pub joints: Vec<JointFile>,
    pub geometry: GeometryFile,
}

/// One `[[joint]]` table
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct JointFile {
    pub id: u8,
    #[serde(default = "default_pulse_min")]
    pub pulse_min: u16,
    #[serde(default = "default_pulse_max")]
    pub pulse_max: u16,
    #[serde(default = "default_neutral")]
    pub neutral: u16,
    #[serde(default)]
    pub trim: i16,
    #[serde(default)]
    pub direction: Direction,
    /// Joint rotation per pulse unit, in degrees
    pub degrees_per_unit: f32,
    #[serde(default)]
    pub axis: JointAxis,
    #[serde(default)]
    pub jog_inverted: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct GeometryFile {
    pub links: Vec<LinkConfig>,
    #[serde(default)]
    pub tool: ToolOffset,
}

impl JointFile {
    fn to_joint(&self) -> JointConfig {
        JointConfig {
            id: self.id,
            pulse_min: self.pulse_min,
            pulse_max: self.pulse_max,
            calibration: JointCalibration {
                neutral: self.neutral,
                trim: self.trim,
                direction: self.direction,
                radians_per_unit: self.degrees_per_unit.to_radians(),
            },
            axis: self.axis,
            jog_inverted: self.jog_inverted,
        }
    }

    fn from_joint(joint: &JointConfig) -> Self {
        Self {
            id: joint.id,
            pulse_min: joint.pulse_min,
            pulse_max: joint.pulse_max,
            neutral: joint.calibration.neutral,
            trim: joint.calibration.trim,
            direction: joint.calibration.direction,
            degrees_per_unit: joint.calibration.radians_per_unit.to_degrees(),
            axis: joint.axis,
            jog_inverted: joint.jog_inverted,
        }
    }
}

impl ArmFile {
    /// Validate into a core configuration
    ///
    /// Joints are ordered by id first, so duplicate or missing ids surface as
    /// an out-of-order id.
    pub fn into_config(self) -> Result<ArmConfig, ConfigLoadError> {
        let mut joints: Vec<JointConfig> = self.joints.iter().map(JointFile::to_joint).collect();
        joints.sort_by_key(|j| j.id);

        let mut links = heapless::Vec::new();
        for link in self.geometry.links {
            links.push(link).map_err(|_| ConfigLoadError::TooManyLinks)?;
        }
        let geometry = Geometry {
            links,
            tool: self.geometry.tool,
        };

        Ok(ArmConfig::new(
            &self.name,
            &joints,
            self.magnets,
            geometry,
            self.tolerance,
        )?)
    }

    /// File form of an existing configuration
    pub fn from_config(config: &ArmConfig) -> Self {
        Self {
            name: config.name().to_string(),
            tolerance: config.tolerance(),
            magnets: config.magnet_count(),
            joints: config.joints().iter().map(JointFile::from_joint).collect(),
            geometry: GeometryFile {
                links: config.geometry().links.to_vec(),
                tool: config.geometry().tool,
            },
        }
    }
}

/// Parse a configuration from TOML text
pub fn parse_config(text: &str, path: &Path) -> Result<ArmConfig, ConfigLoadError> {
    let file: ArmFile = toml::from_str(text).map_err(|source| ConfigLoadError::Parse {
        path: path.to_path_buf(),
        source,
    })?;
    file.into_config()
}

/// Load an arm configuration, or the built-in arm when no path is given
pub fn load_config(path: Option<&Path>) -> Result<ArmConfig, ConfigLoadError> {
    let Some(path) = path else {
        debug!("No arm configuration given, using built-in arm");
        return Ok(ArmConfig::default());
    };

    let text = fs::read_to_string(path).map_err(|source| ConfigLoadError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    let config = parse_config(&text, path)?;
    info!(
        "Loaded arm '{}' from {} ({} joints, {} magnets)",
        config.name(),
        path.display(),
        config.joint_count(),
        config.magnet_count()
    );
    Ok(config)
}

/// Render a configuration as TOML
pub fn render_config(config: &ArmConfig) -> Result<String, ConfigLoadError> {
    Ok(toml::to_string_pretty(&ArmFile::from_config(config))?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use armctl_core::forward;

    const SAMPLE: &str = r#"
name = "left"
magnets = 1

[[joint]]
id = 2
degrees_per_unit = 0.09

[[joint]]
id = 1
degrees_per_unit = 0.09
axis = "yaw"
direction = "reversed"
trim = 12

[geometry]
links = [{ up = 50.0 }, { joint = 2, up = 100.0 }]
tool = { length = 10.0 }
"#;

    #[test]
    fn test_parse_sample() {
        let config = parse_config(SAMPLE, Path::new("arm.toml")).unwrap();
        assert_eq!(config.name(), "left");
        assert_eq!(config.tolerance(), DEFAULT_TOLERANCE);
        assert_eq!(config.magnet_count(), 1);
        assert_eq!(config.joint_count(), 2);

        let yaw = config.joint(1).unwrap();
        assert_eq!(yaw.axis, JointAxis::Yaw);
        assert_eq!(yaw.calibration.direction, Direction::Reversed);
        assert_eq!(yaw.calibration.trim, 12);
        assert_eq!(yaw.pulse_min, DEFAULT_PULSE_MIN);
        assert_eq!(config.joint(2).unwrap().axis, JointAxis::Pitch);

        let tip = forward(&config, &config.neutral_pose());
        assert!(tip.x.abs() < 1e-3);
        assert!((tip.z - 160.0).abs() < 1e-3);
    }

    #[test]
    fn test_duplicate_ids_rejected() {
        let text = SAMPLE.replace("id = 2", "id = 1");
        let err = parse_config(&text, Path::new("arm.toml")).unwrap_err();
        assert!(matches!(
            err,
            ConfigLoadError::Invalid(ConfigError::JointIdOutOfOrder { .. })
        ));
    }

    #[test]
    fn test_unknown_field_rejected() {
        let text = SAMPLE.replace("magnets = 1", "magnets = 1\ncolour = \"red\"");
        let err = parse_config(&text, Path::new("arm.toml")).unwrap_err();
        assert!(matches!(err, ConfigLoadError::Parse { .. }));
    }

    #[test]
    fn test_neutral_outside_range() {
        let text = SAMPLE.replace("trim = 12", "trim = 12\nneutral = 2600");
        let err = parse_config(&text, Path::new("arm.toml")).unwrap_err();
        assert!(matches!(
            err,
            ConfigLoadError::Invalid(ConfigError::NeutralOutOfRange { joint: 1 })
        ));
    }

    #[test]
    fn test_default_config_survives_render() {
        let config = ArmConfig::default();
        let text = render_config(&config).unwrap();
        let parsed = parse_config(&text, Path::new("arm.toml")).unwrap();

        assert_eq!(parsed.name(), config.name());
        assert_eq!(parsed.neutral_pose(), config.neutral_pose());
        let a = forward(&config, &config.neutral_pose());
        let b = forward(&parsed, &parsed.neutral_pose());
        assert!(a.distance(&b) < 1e-3);
    }

    #[test]
    fn test_missing_file() {
        let err = load_config(Some(Path::new("/nonexistent/arm.toml"))).unwrap_err();
        assert!(matches!(err, ConfigLoadError::Read { .. }));
        assert_eq!(load_config(None).unwrap(), ArmConfig::default());
    }
}
