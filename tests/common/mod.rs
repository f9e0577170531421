#![allow(dead_code)]

mod fixtures;
#[allow(unused_imports)]
pub use fixtures::*;

// Re-export commonly used types from banana_qc for tests
#[allow(unused_imports)]
pub use banana_qc::{
    BoundingBox, ColorCalibrator, ColorChartDetector, ColorPatch, DetectionRegion, ErrorKind, Metadata,
    MetadataValue, Mode, ObjectDetector, ProcessingConfig, ProcessingError, ProcessingResult,
};
