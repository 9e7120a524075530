//! Configuration loading for the visualizer.
//!
//! All tunables are loaded from an optional TOML file; every section falls
//! back to its defaults, so an empty file is a valid configuration.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Complete visualizer configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct VizConfig {
    /// Window settings
    #[serde(default)]
    pub window: WindowConfig,
    /// Transport feed location
    #[serde(default)]
    pub feed: FeedConfig,
    /// Attribute-to-space mapping
    #[serde(default)]
    pub projection: ProjectionParams,
    /// Render-object animation
    #[serde(default)]
    pub motion: MotionConfig,
    /// Orbit camera
    #[serde(default)]
    pub camera: CameraConfig,
    /// View normalization scales
    #[serde(default)]
    pub views: ViewScales,
    /// Narrative analysis gating
    #[serde(default)]
    pub analysis: AnalysisConfig,
}

impl VizConfig {
    /// Loads configuration from a TOML file.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_str(&content)
    }

    /// Parses configuration from a TOML string.
    #[allow(clippy::should_implement_trait)]
    pub fn from_str(content: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Checks the bounds the camera clamps against.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let camera = &self.camera;
        if !(camera.min_distance <= camera.max_distance) {
            return Err(ConfigError::Invalid(format!(
                "camera.min_distance ({}) must not exceed camera.max_distance ({})",
                camera.min_distance, camera.max_distance
            )));
        }
        if !(0.0..std::f32::consts::FRAC_PI_2).contains(&camera.polar_margin) {
            return Err(ConfigError::Invalid(format!(
                "camera.polar_margin ({}) must be in [0, PI/2)",
                camera.polar_margin
            )));
        }
        Ok(())
    }

    /// Returns the configuration as a TOML string.
    pub fn to_toml(&self) -> Result<String, TomlSerializeError> {
        toml::to_string_pretty(self).map_err(TomlSerializeError)
    }
}

/// Window settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WindowConfig {
    pub title: String,
    pub width: f32,
    pub height: f32,
}

impl Default for WindowConfig {
    fn default() -> Self {
        Self {
            title: "Social Mobility Observatory".into(),
            width: 1280.0,
            height: 720.0,
        }
    }
}

/// Where the transport layer drops its messages.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FeedConfig {
    /// Directory watched for updates
    pub dir: PathBuf,
    /// Latest full agent set, relative to `dir`
    pub agents_file: String,
    /// Latest round statistics, relative to `dir`
    pub stats_file: String,
    /// Outward command log, relative to `dir`
    pub commands_file: String,
    /// Latest lifecycle message, relative to `dir`
    pub status_file: String,
    /// Latest narrative request, relative to `dir`
    pub narrative_request_file: String,
    /// Latest narrative service answer, relative to `dir`
    pub narrative_file: String,
    /// Directory for exported trajectory charts, relative to `dir`
    pub exports_dir: String,
}

impl Default for FeedConfig {
    fn default() -> Self {
        Self {
            dir: PathBuf::from("output"),
            agents_file: "agents.json".into(),
            stats_file: "stats.json".into(),
            commands_file: "commands.jsonl".into(),
            status_file: "status.json".into(),
            narrative_request_file: "narrative_request.json".into(),
            narrative_file: "narrative.json".into(),
            exports_dir: "exports".into(),
        }
    }
}

impl FeedConfig {
    pub fn agents_path(&self) -> PathBuf {
        self.dir.join(&self.agents_file)
    }

    pub fn stats_path(&self) -> PathBuf {
        self.dir.join(&self.stats_file)
    }

    pub fn commands_path(&self) -> PathBuf {
        self.dir.join(&self.commands_file)
    }

    pub fn status_path(&self) -> PathBuf {
        self.dir.join(&self.status_file)
    }

    pub fn narrative_request_path(&self) -> PathBuf {
        self.dir.join(&self.narrative_request_file)
    }

    pub fn narrative_path(&self) -> PathBuf {
        self.dir.join(&self.narrative_file)
    }

    pub fn exports_path(&self) -> PathBuf {
        self.dir.join(&self.exports_dir)
    }
}

/// Spatial spans used by the projection.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProjectionParams {
    /// Width of the x and z axes in world units
    pub span_xz: f32,
    /// Height of the y axis in world units
    pub span_y: f32,
    /// Lift applied to every y coordinate
    pub y_offset: f32,
    /// Full width of the scatter jitter in world units
    pub jitter_spread: f32,
}

impl Default for ProjectionParams {
    fn default() -> Self {
        Self {
            span_xz: 100.0,
            span_y: 35.0,
            y_offset: 3.0,
            jitter_spread: 3.0,
        }
    }
}

/// Render-object animation settings.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MotionConfig {
    /// Fraction of the remaining distance covered per tick
    pub damping: f32,
    /// Smallest semantic change that retargets an axis
    pub epsilon: f32,
    /// Distance under which an object is considered settled
    pub settle_distance: f32,
}

impl Default for MotionConfig {
    fn default() -> Self {
        Self {
            damping: 0.08,
            epsilon: 0.001,
            settle_distance: 1e-3,
        }
    }
}

/// Orbit camera settings.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CameraConfig {
    pub initial_distance: f32,
    pub min_distance: f32,
    pub max_distance: f32,
    /// Polar angle is kept within [margin, PI - margin]
    pub polar_margin: f32,
    pub initial_polar: f32,
    /// Auto-orbit angular rate in radians per second
    pub orbit_rate: f32,
    /// Eye height while auto-orbiting
    pub orbit_height: f32,
    /// Radians per pixel of drag
    pub drag_sensitivity: f32,
    /// Distance units per wheel unit
    pub wheel_scale: f32,
    pub fov_degrees: f32,
    pub near: f32,
    pub far: f32,
}

impl Default for CameraConfig {
    fn default() -> Self {
        Self {
            initial_distance: 120.0,
            min_distance: 40.0,
            max_distance: 250.0,
            polar_margin: 0.1,
            initial_polar: std::f32::consts::FRAC_PI_4,
            orbit_rate: 0.3,
            orbit_height: 60.0,
            drag_sensitivity: 0.01,
            wheel_scale: 0.1,
            fov_degrees: 75.0,
            near: 0.1,
            far: 1000.0,
        }
    }
}

/// Normalization scales for raw-magnitude axes.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ViewScales {
    /// Reward that maps to the top of the aspiration-outcomes y axis
    pub aspiration_reward_divisor: f32,
    /// Reward that maps to the top of the class-effect y axis
    pub class_effect_reward_divisor: f32,
    /// Talent band admitted by the class-effect view
    pub class_effect_talent_min: f32,
    pub class_effect_talent_max: f32,
    /// Age that maps to 1.0
    pub age_scale: f32,
    /// Repeat count that maps to 1.0
    pub repeatability_scale: f32,
    /// Reward rate that maps to 1.0
    pub reward_rate_scale: f32,
}

impl Default for ViewScales {
    fn default() -> Self {
        Self {
            aspiration_reward_divisor: 3000.0,
            class_effect_reward_divisor: 3000.0,
            class_effect_talent_min: 0.45,
            class_effect_talent_max: 0.55,
            age_scale: 50.0,
            repeatability_scale: 20.0,
            reward_rate_scale: 10.0,
        }
    }
}

/// Narrative analysis gating.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisConfig {
    /// Rounds that must elapse before an analysis may be requested
    pub min_rounds: u32,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self { min_rounds: 10 }
    }
}

/// Errors that can occur during configuration loading.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// IO error reading config file
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    /// Error parsing TOML config
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
    /// Values that parse but cannot be used together
    #[error("invalid configuration: {0}")]
    Invalid(String),
}

/// Error that can occur during TOML serialization.
#[derive(Debug, thiserror::Error)]
#[error("TOML serialize error: {0}")]
pub struct TomlSerializeError(#[source] pub toml::ser::Error);
