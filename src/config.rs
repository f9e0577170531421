//! Tunable parameters for chart detection, object detection and extraction.
//!
//! Every section deserializes with defaults, so a JSON file only needs to name the
//! values it overrides:
//!
//! ```no_run
//! use banana_qc::config::ProcessingConfig;
//! use std::path::Path;
//!
//! let config = ProcessingConfig::from_json_file(Path::new("config.json"))?;
//! # Ok::<(), banana_qc::error::ConfigError>(())
//! ```

use crate::error::ConfigError;
use serde::{Deserialize, Serialize};
use std::path::Path;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProcessingConfig {
    pub chart: ChartDetectionConfig,
    pub objects: ObjectDetectionConfig,
    pub extraction: ExtractionConfig,
}

/// Parameters for locating the ColorChecker grid.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChartDetectionConfig {
    /// Gaussian blur sigma applied before segmentation (0 disables blurring)
    pub blur_sigma: f32,

    /// Maximum L1 RGB distance between 4-neighbours for a pixel to count as flat
    pub flat_tolerance: u32,

    /// Minimum cell area in pixels
    pub min_patch_area: u32,

    /// Maximum cell area as a fraction of the image area
    pub max_patch_area_ratio: f32,

    /// Minimum ratio of component pixels to bounding box area
    pub min_fill_ratio: f32,

    /// Accepted cell aspect ratio (width / height)
    pub min_aspect: f32,
    pub max_aspect: f32,

    /// Relative tolerance for cell size and grid spacing
    pub size_tolerance: f32,

    /// Fraction of the cell trimmed on each side before sampling its color
    pub sample_margin: f32,
}

impl Default for ChartDetectionConfig {
    fn default() -> Self {
        Self {
            blur_sigma: 0.0,
            flat_tolerance: 24,
            min_patch_area: 36,
            max_patch_area_ratio: 0.05,
            min_fill_ratio: 0.8,
            min_aspect: 0.5,
            max_aspect: 2.0,
            size_tolerance: 0.25,
            sample_margin: 0.2,
        }
    }
}

/// Parameters for the yellow-object ("banana") detector.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ObjectDetectionConfig {
    /// Class label attached to every detection
    pub label: String,

    /// Hue band in degrees
    pub hue_min: f32,
    pub hue_max: f32,

    /// Minimum HSV value (brightness) for a pixel to join the mask
    pub min_value: f32,

    /// Saturation thresholds, one proposal pass per entry
    pub saturation_levels: Vec<f32>,

    /// Radius of the morphological opening applied to each mask
    pub opening_radius: u8,

    /// Minimum region area in pixels
    pub min_area: u32,

    /// Minimum region area as a fraction of the image area
    pub min_area_ratio: f32,

    /// Proposals scoring below this are discarded
    pub confidence_threshold: f32,

    /// Non-maximum suppression IoU threshold
    pub iou_threshold: f32,
}

impl Default for ObjectDetectionConfig {
    fn default() -> Self {
        Self {
            label: "banana".to_string(),
            hue_min: 40.0,
            hue_max: 70.0,
            min_value: 0.35,
            saturation_levels: vec![0.45, 0.3],
            opening_radius: 1,
            min_area: 64,
            min_area_ratio: 0.0005,
            confidence_threshold: 0.25,
            iou_threshold: 0.5,
        }
    }
}

/// How the output image is derived from the detections.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExtractionConfig {
    /// Pixels added around the union of detection boxes
    pub padding: u32,

    /// Paint pixels outside every detection box white
    pub mask_background: bool,
}

impl Default for ExtractionConfig {
    fn default() -> Self {
        Self {
            padding: 10,
            mask_background: false,
        }
    }
}

impl ProcessingConfig {
    /// Load configuration from a JSON file and validate it
    pub fn from_json_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_json_str(&content)
    }

    pub fn from_json_str(content: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_json_string(&self) -> Result<String, ConfigError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Check that every threshold lies in its meaningful range
    pub fn validate(&self) -> Result<(), ConfigError> {
        let chart = &self.chart;
        if chart.blur_sigma < 0.0 {
            return Err(invalid("chart.blur_sigma", "must be >= 0"));
        }
        if !(chart.max_patch_area_ratio > 0.0 && chart.max_patch_area_ratio <= 1.0) {
            return Err(invalid("chart.max_patch_area_ratio", "must be in (0, 1]"));
        }
        if !(0.0..=1.0).contains(&chart.min_fill_ratio) {
            return Err(invalid("chart.min_fill_ratio", "must be in [0, 1]"));
        }
        if !(chart.min_aspect > 0.0 && chart.min_aspect <= chart.max_aspect) {
            return Err(invalid("chart.min_aspect", "must be positive and <= max_aspect"));
        }
        if !(0.0..1.0).contains(&chart.size_tolerance) {
            return Err(invalid("chart.size_tolerance", "must be in [0, 1)"));
        }
        if !(0.0..0.5).contains(&chart.sample_margin) {
            return Err(invalid("chart.sample_margin", "must be in [0, 0.5)"));
        }

        let objects = &self.objects;
        if !(objects.hue_min < objects.hue_max) {
            return Err(invalid("objects.hue_min", "hue band is empty"));
        }
        if objects.saturation_levels.is_empty() {
            return Err(invalid("objects.saturation_levels", "at least one level is required"));
        }
        if objects
            .saturation_levels
            .iter()
            .any(|s| !(0.0..=1.0).contains(s))
        {
            return Err(invalid("objects.saturation_levels", "levels must be in [0, 1]"));
        }
        if !(0.0..=1.0).contains(&objects.min_value) {
            return Err(invalid("objects.min_value", "must be in [0, 1]"));
        }
        if !(0.0..=1.0).contains(&objects.confidence_threshold) {
            return Err(invalid("objects.confidence_threshold", "must be in [0, 1]"));
        }
        if !(objects.iou_threshold > 0.0 && objects.iou_threshold <= 1.0) {
            return Err(invalid("objects.iou_threshold", "must be in (0, 1]"));
        }
        if !(0.0..1.0).contains(&objects.min_area_ratio) {
            return Err(invalid("objects.min_area_ratio", "must be in [0, 1)"));
        }

        Ok(())
    }
}

fn invalid(field: &'static str, reason: &str) -> ConfigError {
    ConfigError::Invalid {
        field,
        reason: reason.to_string(),
    }
}
