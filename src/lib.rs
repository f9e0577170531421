//! # Banana QC
//!
//! Image processing core for banana quality control photos:
//! - color correction against a Macbeth ColorChecker found in the frame
//! - localization, counting and extraction of bananas
//! - both at once
//!
//! ```rust,no_run
//! use banana_qc::{Mode, ProcessingConfig, process};
//!
//! let image = image::open("tray.jpg")?;
//! let result = process(&image, Mode::Combined, &ProcessingConfig::default());
//! if let Some(metadata) = result.metadata() {
//!     for (key, value) in metadata {
//!         println!("{key}: {value}");
//!     }
//! }
//! # Ok::<(), image::ImageError>(())
//! ```

pub mod api;
pub mod calibration;
pub mod config;
pub mod detection;
pub mod error;
pub mod logging;
pub mod models;
pub mod pipeline;
pub mod steps;

pub use calibration::{ColorCalibrator, ColorTransform};
pub use config::ProcessingConfig;
pub use detection::{ColorChartDetector, ObjectDetector};
pub use error::{ErrorKind, ProcessingError, Result};
pub use models::{BoundingBox, ColorMetrics, ColorPatch, DetectionRegion};
pub use pipeline::{Metadata, MetadataValue, Mode, Pipeline, PipelineData, PipelineStep, ProcessingResult};

use image::DynamicImage;

/// Run the standard pipeline for `mode` on an already decoded image
pub fn process(image: &DynamicImage, mode: Mode, config: &ProcessingConfig) -> ProcessingResult {
    Pipeline::for_mode(mode, config).run(image)
}
