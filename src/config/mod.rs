//! Configuration types for the repair pipeline.
//!
//! The thresholds below encode what is known about the instrument's firmware
//! history; the defaults are the calibrated values and a config file only
//! needs to override the ones under study.

use serde::{Deserialize, Serialize};
use std::path::Path;

/// Configuration for the defect classifier.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClassifierConfig {
    /// Sample-to-sample delta on any acceleration axis above which the file
    /// is attributed to the broken firmware patch.
    #[serde(default = "default_broken_patch_delta")]
    pub broken_patch_delta: f64,

    /// Lower bound (exclusive) of the mean acceleration magnitude window
    /// that identifies pre-SI milli-g data.
    #[serde(default = "default_legacy_mean_min")]
    pub legacy_mean_min: f64,

    /// Upper bound (exclusive) of the pre-SI mean magnitude window.
    #[serde(default = "default_legacy_mean_max")]
    pub legacy_mean_max: f64,
}

fn default_broken_patch_delta() -> f64 {
    2500.0
}

fn default_legacy_mean_min() -> f64 {
    // A resting gravity vector in milli-g reads ~1000.
    1000.0
}

fn default_legacy_mean_max() -> f64 {
    // Upper bound tolerates sensor noise and tilt.
    1060.0
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self {
            broken_patch_delta: default_broken_patch_delta(),
            legacy_mean_min: default_legacy_mean_min(),
            legacy_mean_max: default_legacy_mean_max(),
        }
    }
}

/// Configuration for the correction engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CorrectionConfig {
    /// Acceleration axis values above this carry the broken-patch offset.
    #[serde(default = "default_accel_offset_threshold")]
    pub accel_offset_threshold: f32,

    /// Fixed offset the broken patch added to affected acceleration axes.
    #[serde(default = "default_accel_offset")]
    pub accel_offset: f32,

    /// Magnetic-field axis values above this carry the broken-patch offset.
    #[serde(default = "default_mag_offset_threshold")]
    pub mag_offset_threshold: f32,

    /// Fixed offset the broken patch added to affected magnetic-field axes.
    #[serde(default = "default_mag_offset")]
    pub mag_offset: f32,

    /// Headings with absolute value below this are treated as invalid.
    #[serde(default = "default_heading_min_abs")]
    pub heading_min_abs: f64,

    /// A scalar reading dropping by more than this fraction of the previous
    /// value is discarded as a sensor glitch.
    #[serde(default = "default_sudden_drop_ratio")]
    pub sudden_drop_ratio: f64,
}

fn default_accel_offset_threshold() -> f32 {
    1250.0
}

fn default_accel_offset() -> f32 {
    2512.874
}

fn default_mag_offset_threshold() -> f32 {
    0.01
}

fn default_mag_offset() -> f32 {
    0.019_660_5
}

fn default_heading_min_abs() -> f64 {
    0.001
}

fn default_sudden_drop_ratio() -> f64 {
    0.98
}

impl Default for CorrectionConfig {
    fn default() -> Self {
        Self {
            accel_offset_threshold: default_accel_offset_threshold(),
            accel_offset: default_accel_offset(),
            mag_offset_threshold: default_mag_offset_threshold(),
            mag_offset: default_mag_offset(),
            heading_min_abs: default_heading_min_abs(),
            sudden_drop_ratio: default_sudden_drop_ratio(),
        }
    }
}

/// Main pipeline configuration combining all sub-configs.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PipelineConfig {
    #[serde(default)]
    pub classifier: ClassifierConfig,

    #[serde(default)]
    pub correction: CorrectionConfig,
}

impl PipelineConfig {
    /// Load configuration from a YAML file.
    pub fn from_yaml<P: AsRef<Path>>(path: P) -> Result<Self, Box<dyn std::error::Error>> {
        let content = std::fs::read_to_string(path)?;
        let config: PipelineConfig = serde_yaml::from_str(&content)?;
        Ok(config)
    }

    /// Save configuration to a YAML file.
    pub fn to_yaml<P: AsRef<Path>>(&self, path: P) -> Result<(), Box<dyn std::error::Error>> {
        let content = serde_yaml::to_string(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }
}
