use crate::calibration::ColorCalibrator;
use crate::config::{ChartDetectionConfig, ExtractionConfig, ObjectDetectionConfig};
use crate::detection::{ColorChartDetector, ObjectDetector, chart_bounds};
use crate::error::{ProcessingError, Result};
use crate::models::BoundingBox;
use crate::pipeline::{
    BANANA_EXTRACTION_VERSION, COLOR_CORRECTION_VERSION, MetadataValue, Mode, PipelineContext, PipelineData,
    PipelineStep, keys,
};
use image::{DynamicImage, Rgb, Rgba};
use tracing::{debug, info};

/// Locate the reference chart
pub struct ChartDetectionStep {
    detector: ColorChartDetector,
}

impl ChartDetectionStep {
    pub fn new(config: ChartDetectionConfig) -> Self {
        Self {
            detector: ColorChartDetector::new(config),
        }
    }
}

impl PipelineStep for ChartDetectionStep {
    fn process(&self, mut data: PipelineData, _context: &PipelineContext) -> Result<PipelineData> {
        data.patches = self.detector.detect(&data.source)?;
        Ok(data)
    }

    fn name(&self) -> &str {
        "Chart Detection"
    }
}

/// Locate target objects on the unmodified source, ignoring the chart area.
///
/// In extraction-only mode no chart step ran before this one, so the chart is
/// looked for here; an image without a chart is not an error.
pub struct ObjectDetectionStep {
    detector: ObjectDetector,
    chart: ColorChartDetector,
}

impl ObjectDetectionStep {
    pub fn new(config: ObjectDetectionConfig, chart: ChartDetectionConfig) -> Self {
        Self {
            detector: ObjectDetector::new(config),
            chart: ColorChartDetector::new(chart),
        }
    }
}

impl PipelineStep for ObjectDetectionStep {
    fn process(&self, mut data: PipelineData, context: &PipelineContext) -> Result<PipelineData> {
        if context.mode == Mode::ObjectExtraction && data.patches.is_empty() {
            data.patches = match self.chart.detect(&data.source) {
                Ok(patches) => patches,
                Err(ProcessingError::ColorCheckerNotFound(reason)) => {
                    debug!(%reason, "no chart to exclude");
                    Vec::new()
                }
                Err(err) => return Err(err),
            };
        }

        // Patch boxes stop short of the chart frame; grow by half a cell to cover it
        let exclusions: Vec<BoundingBox> = chart_bounds(&data.patches)
            .map(|bounds| {
                let margin = data.patches[0].bbox.width / 2;
                bounds.padded(margin, data.source.width(), data.source.height())
            })
            .into_iter()
            .collect();

        data.regions = self.detector.detect_excluding(&data.source, &exclusions)?;
        info!(count = data.regions.len(), label = self.detector.label(), "objects detected");
        Ok(data)
    }

    fn name(&self) -> &str {
        "Object Detection"
    }
}

/// Fit the chart transform, record the error metrics and correct the image
pub struct CalibrationStep {
    calibrator: ColorCalibrator,
}

impl CalibrationStep {
    pub fn new() -> Self {
        Self {
            calibrator: ColorCalibrator::new(),
        }
    }
}

impl Default for CalibrationStep {
    fn default() -> Self {
        Self::new()
    }
}

impl PipelineStep for CalibrationStep {
    fn process(&self, mut data: PipelineData, _context: &PipelineContext) -> Result<PipelineData> {
        let transform = self.calibrator.fit(&data.patches)?;
        let metrics = self.calibrator.measure_error(&data.patches, &transform);
        let corrected = self.calibrator.apply(&data.image, &transform)?;

        info!(
            delta_e_orig = metrics.delta_e_before,
            delta_e_corrected = metrics.delta_e_after,
            "color correction applied"
        );

        data.image = corrected;
        Ok(data
            .with_metadata(keys::DELTA_E_ORIG, MetadataValue::Float(metrics.delta_e_before))
            .with_metadata(keys::DELTA_E_CORRECTED, MetadataValue::Float(metrics.delta_e_after))
            .with_metadata(
                keys::COLOR_CORRECTION_VERSION,
                MetadataValue::String(COLOR_CORRECTION_VERSION.to_string()),
            ))
    }

    fn name(&self) -> &str {
        "Color Calibration"
    }
}

/// Crop the image to the detected objects
pub struct ExtractionStep {
    config: ExtractionConfig,
}

impl ExtractionStep {
    pub fn new(config: ExtractionConfig) -> Self {
        Self { config }
    }
}

impl PipelineStep for ExtractionStep {
    fn process(&self, mut data: PipelineData, _context: &PipelineContext) -> Result<PipelineData> {
        let union = data
            .regions
            .iter()
            .map(|r| r.bbox)
            .reduce(|acc, b| acc.union(&b))
            .ok_or(ProcessingError::ObjectNotFound)?;

        let crop = union.padded(self.config.padding, data.image.width(), data.image.height());
        let mut cropped = data.image.crop_imm(crop.x, crop.y, crop.width, crop.height);

        if self.config.mask_background {
            let boxes: Vec<BoundingBox> = data
                .regions
                .iter()
                .map(|r| BoundingBox::new(r.bbox.x - crop.x, r.bbox.y - crop.y, r.bbox.width, r.bbox.height))
                .collect();
            mask_outside(&mut cropped, &boxes);
        }

        let count = data.regions.len() as i64;
        data.image = cropped;
        Ok(data
            .with_metadata(keys::NUMBER_OF_BANANAS, MetadataValue::Int(count))
            .with_metadata(
                keys::BANANA_EXTRACTION_VERSION,
                MetadataValue::String(BANANA_EXTRACTION_VERSION.to_string()),
            ))
    }

    fn name(&self) -> &str {
        "Object Extraction"
    }
}

/// Paint every pixel outside `boxes` white, keeping alpha
fn mask_outside(image: &mut DynamicImage, boxes: &[BoundingBox]) {
    let outside = |x: u32, y: u32| !boxes.iter().any(|b| b.contains(x, y));
    match image {
        DynamicImage::ImageRgb8(buf) => {
            for (x, y, pixel) in buf.enumerate_pixels_mut() {
                if outside(x, y) {
                    *pixel = Rgb([255, 255, 255]);
                }
            }
        }
        DynamicImage::ImageRgba8(buf) => {
            for (x, y, pixel) in buf.enumerate_pixels_mut() {
                if outside(x, y) {
                    *pixel = Rgba([255, 255, 255, pixel[3]]);
                }
            }
        }
        _ => {}
    }
}
