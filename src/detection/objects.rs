//! Yellow-object ("banana") localization.
//!
//! Region proposals come from thresholding the image in HSV at several saturation
//! levels; every level yields one proposal per connected blob, so the same object
//! is usually proposed more than once and non-maximum suppression collapses the
//! duplicates.

use crate::config::ObjectDetectionConfig;
use crate::detection::{contours, nms, preprocessing};
use crate::error::{ProcessingError, Result};
use crate::models::{BoundingBox, DetectionRegion};
use image::{DynamicImage, GrayImage, Luma};
use imageproc::region_labelling::Connectivity;
use tracing::{debug, instrument};

/// Per-pixel class evidence
#[derive(Debug, Clone, Copy)]
struct PixelScore {
    /// Saturation when hue and value fall inside the class band, otherwise negative
    saturation: f32,
    /// Hue closeness to the band center times saturation, in [0, 1]
    score: f32,
}

pub struct ObjectDetector {
    config: ObjectDetectionConfig,
}

impl ObjectDetector {
    pub fn new(config: ObjectDetectionConfig) -> Self {
        Self { config }
    }

    pub fn label(&self) -> &str {
        &self.config.label
    }

    /// Locate every instance of the target class, most confident first
    pub fn detect(&self, image: &DynamicImage) -> Result<Vec<DetectionRegion>> {
        self.detect_excluding(image, &[])
    }

    /// Like [`ObjectDetector::detect`], ignoring proposals lying mostly inside `exclusions`
    #[instrument(skip_all, fields(width = image.width(), height = image.height()))]
    pub fn detect_excluding(
        &self,
        image: &DynamicImage,
        exclusions: &[BoundingBox],
    ) -> Result<Vec<DetectionRegion>> {
        let proposals = self.propose(image);
        let total = proposals.len();

        let candidates: Vec<DetectionRegion> = proposals
            .into_iter()
            .filter(|r| r.confidence >= self.config.confidence_threshold)
            .filter(|r| !exclusions.iter().any(|zone| mostly_inside(&r.bbox, zone)))
            .collect();

        let regions = nms::non_max_suppression(candidates, self.config.iou_threshold);
        debug!(proposals = total, detections = regions.len(), "object detection finished");

        if regions.is_empty() {
            return Err(ProcessingError::ObjectNotFound);
        }
        Ok(regions)
    }

    /// One proposal per blob per saturation level
    fn propose(&self, image: &DynamicImage) -> Vec<DetectionRegion> {
        let rgb = image.to_rgb8();
        let (width, height) = rgb.dimensions();
        let scores: Vec<PixelScore> = rgb.pixels().map(|p| self.score_pixel(p)).collect();

        let min_area = self
            .config
            .min_area
            .max((width as f32 * height as f32 * self.config.min_area_ratio) as u32);

        let mut proposals = Vec::new();
        for &level in &self.config.saturation_levels {
            let mask = GrayImage::from_fn(width, height, |x, y| {
                let s = scores[(y * width + x) as usize];
                Luma([if s.saturation >= level { 255 } else { 0 }])
            });
            let mask = preprocessing::remove_noise(&mask, self.config.opening_radius);

            let blobs = contours::find_weighted_components(&mask, Connectivity::Eight, min_area, |x, y| {
                scores[(y * width + x) as usize].score
            });
            debug!(level, blobs = blobs.len(), "saturation level proposals");

            proposals.extend(blobs.iter().map(|blob| DetectionRegion {
                bbox: blob.bbox(),
                confidence: blob.mean_weight(),
                label: self.config.label.clone(),
            }));
        }

        proposals
    }

    fn score_pixel(&self, pixel: &image::Rgb<u8>) -> PixelScore {
        let (hue, saturation, value) = preprocessing::to_hsv(pixel);
        let (lo, hi) = (self.config.hue_min, self.config.hue_max);
        if hue < lo || hue > hi || value < self.config.min_value {
            return PixelScore {
                saturation: -1.0,
                score: 0.0,
            };
        }

        let center = (lo + hi) / 2.0;
        let half_width = (hi - lo) / 2.0;
        let hue_score = (1.0 - (hue - center).abs() / half_width).clamp(0.0, 1.0);
        PixelScore {
            saturation,
            score: hue_score * saturation,
        }
    }
}

impl Default for ObjectDetector {
    fn default() -> Self {
        Self::new(ObjectDetectionConfig::default())
    }
}

/// More than half of `region` lies inside `zone`
fn mostly_inside(region: &BoundingBox, zone: &BoundingBox) -> bool {
    let overlap = region.intersection(zone).map_or(0, |b| b.area());
    overlap * 2 > region.area()
}
