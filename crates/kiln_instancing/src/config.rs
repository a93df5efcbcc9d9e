//! # Instancing Configuration
//!
//! Loaded once at startup from TOML. Every field has a default, so an empty
//! file (or no file) is a valid configuration.
//!
//! ```toml
//! enabled = true
//! normal_debug = false
//!
//! [origin]
//! threshold = 512.0
//! grid = 16
//!
//! [instancer]
//! initial_capacity = 16
//! growth_factor = 2.0
//!
//! [updates]
//! distance_divisor = 1024
//! behind_camera = 2.0
//! ```

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{ConfigError, ConfigResult};

/// Smallest growth factor accepted for instance buffers.
pub const MIN_GROWTH_FACTOR: f32 = 1.5;

/// Top-level instancing configuration.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct InstancingConfig {
    /// Master switch. When false nothing is tracked or drawn.
    pub enabled: bool,
    /// Ask shaders to visualise normals.
    pub normal_debug: bool,
    /// Floating-origin policy.
    pub origin: OriginConfig,
    /// Instance buffer policy.
    pub instancer: InstancerConfig,
    /// Per-object update throttling.
    pub updates: UpdateConfig,
}

impl Default for InstancingConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            normal_debug: false,
            origin: OriginConfig::default(),
            instancer: InstancerConfig::default(),
            updates: UpdateConfig::default(),
        }
    }
}

/// Floating-origin policy.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OriginConfig {
    /// Camera drift from the origin (per axis, world units) that triggers a recenter.
    pub threshold: f64,
    /// The new origin is the camera position floored to a multiple of this.
    pub grid: i32,
}

impl Default for OriginConfig {
    fn default() -> Self {
        Self {
            threshold: 512.0,
            grid: 16,
        }
    }
}

/// Instance buffer growth policy.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct InstancerConfig {
    /// Instances the GPU buffer is sized for on first upload.
    pub initial_capacity: usize,
    /// Capacity multiplier applied when the buffer overflows.
    pub growth_factor: f32,
}

impl Default for InstancerConfig {
    fn default() -> Self {
        Self {
            initial_capacity: 16,
            growth_factor: 2.0,
        }
    }
}

impl InstancerConfig {
    /// Returns the capacity to grow to so that `required` instances fit.
    #[must_use]
    pub fn grow(&self, current: usize, required: usize) -> usize {
        let factor = self.growth_factor.max(MIN_GROWTH_FACTOR);
        let mut capacity = current.max(self.initial_capacity).max(1);
        while capacity < required {
            capacity = ((capacity as f32) * factor).ceil() as usize;
        }
        capacity
    }
}

/// Per-object update throttling.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct UpdateConfig {
    /// Squared distance per extra skipped frame.
    pub distance_divisor: i64,
    /// How far behind the camera an object may sit and still be updated.
    pub behind_camera: f32,
}

impl Default for UpdateConfig {
    fn default() -> Self {
        Self {
            distance_divisor: 1024,
            behind_camera: 2.0,
        }
    }
}

impl InstancingConfig {
    /// Parses a configuration from TOML text.
    ///
    /// # Errors
    ///
    /// Returns an error if the text is not valid TOML for this schema or a
    /// value is out of range.
    pub fn from_toml_str(text: &str) -> ConfigResult<Self> {
        let config: Self = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Loads a configuration file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn load(path: impl AsRef<Path>) -> ConfigResult<Self> {
        let text = std::fs::read_to_string(path.as_ref())?;
        let config = Self::from_toml_str(&text)?;
        tracing::debug!(path = %path.as_ref().display(), "loaded instancing config");
        Ok(config)
    }

    /// Checks value ranges.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] describing the first bad value.
    pub fn validate(&self) -> ConfigResult<()> {
        if !(self.origin.threshold.is_finite() && self.origin.threshold > 0.0) {
            return Err(ConfigError::Invalid(format!(
                "origin.threshold must be positive, got {}",
                self.origin.threshold
            )));
        }
        if self.origin.grid <= 0 {
            return Err(ConfigError::Invalid(format!(
                "origin.grid must be positive, got {}",
                self.origin.grid
            )));
        }
        if !self.instancer.growth_factor.is_finite() {
            return Err(ConfigError::Invalid("instancer.growth_factor must be finite".into()));
        }
        if self.updates.distance_divisor <= 0 {
            return Err(ConfigError::Invalid(format!(
                "updates.distance_divisor must be positive, got {}",
                self.updates.distance_divisor
            )));
        }
        Ok(())
    }
}
