//! Color calibration against a detected reference chart.
//!
//! A [`ColorCalibrator`] fits an affine transform over linear sRGB from the chart's
//! measured patches to their reference values, applies it to whole images and
//! reports the mean CIEDE2000 error before and after correction.

pub mod reference;
pub mod transform;

use crate::detection::preprocessing;
use crate::error::{ProcessingError, Result};
use crate::models::{ColorMetrics, ColorPatch};
use image::DynamicImage;
use palette::color_difference::Ciede2000;
use palette::{FromColor, Lab, LinSrgb, Srgb};
use rayon::prelude::*;
use tracing::debug;

pub use reference::{CHART_COLS, CHART_ROWS, PATCH_COUNT};
pub use transform::ColorTransform;

/// CIEDE2000 distance between two sRGB colors
pub fn delta_e(a: Srgb, b: Srgb) -> f32 {
    let lab_a: Lab = Lab::from_color(a);
    let lab_b: Lab = Lab::from_color(b);
    lab_a.difference(lab_b)
}

pub struct ColorCalibrator {
    required_patches: usize,
}

impl ColorCalibrator {
    pub fn new() -> Self {
        Self {
            required_patches: PATCH_COUNT,
        }
    }

    /// Fit the measured -> reference transform for a full chart.
    ///
    /// The least-squares fit minimizes linear RGB error; when its mean delta E on
    /// the chart is not below that of identity, identity is returned instead.
    pub fn fit(&self, patches: &[ColorPatch]) -> Result<ColorTransform> {
        if patches.len() < self.required_patches {
            return Err(ProcessingError::InsufficientPatches {
                expected: self.required_patches,
                found: patches.len(),
            });
        }

        let pairs: Vec<(Srgb, Srgb)> = patches.iter().map(|p| (p.measured, p.reference)).collect();
        let fitted = ColorTransform::fit(&pairs)?;
        let identity = ColorTransform::identity();

        let fitted_error = mean_delta_e(patches, &fitted);
        let identity_error = mean_delta_e(patches, &identity);
        if fitted_error >= identity_error {
            debug!(fitted_error, identity_error, "fit does not improve on identity");
            return Ok(identity);
        }

        debug!(matrix = ?fitted.matrix(), fitted_error, "fitted color transform");
        Ok(fitted)
    }

    /// Map every pixel through `transform`; alpha is left untouched
    pub fn apply(&self, image: &DynamicImage, transform: &ColorTransform) -> Result<DynamicImage> {
        match preprocessing::normalize(image)? {
            DynamicImage::ImageRgb8(mut buf) => {
                let row_len = buf.width() as usize * 3;
                transform_pixels(&mut buf, 3, row_len, transform);
                Ok(DynamicImage::ImageRgb8(buf))
            }
            DynamicImage::ImageRgba8(mut buf) => {
                let row_len = buf.width() as usize * 4;
                transform_pixels(&mut buf, 4, row_len, transform);
                Ok(DynamicImage::ImageRgba8(buf))
            }
            other => Err(ProcessingError::unexpected(format!(
                "unsupported color layout {:?}",
                other.color()
            ))),
        }
    }

    /// Mean CIEDE2000 of measured vs reference colors, before and after `transform`
    pub fn measure_error(&self, patches: &[ColorPatch], transform: &ColorTransform) -> ColorMetrics {
        ColorMetrics {
            delta_e_before: mean_delta_e(patches, &ColorTransform::identity()),
            delta_e_after: mean_delta_e(patches, transform),
        }
    }
}

impl Default for ColorCalibrator {
    fn default() -> Self {
        Self::new()
    }
}

/// Mean delta E of the mapped measured colors, 0 for no patches
fn mean_delta_e(patches: &[ColorPatch], transform: &ColorTransform) -> f32 {
    if patches.is_empty() {
        return 0.0;
    }
    let total: f32 = patches
        .iter()
        .map(|p| delta_e(transform.map(p.measured), p.reference))
        .sum();
    total / patches.len() as f32
}

/// Transform interleaved 8-bit pixels in place, one row per parallel task
fn transform_pixels(data: &mut [u8], channels: usize, row_len: usize, transform: &ColorTransform) {
    let lut = linearization_table();

    data.par_chunks_mut(row_len).for_each(|row| {
        for px in row.chunks_exact_mut(channels) {
            let mapped = transform.map_linear([
                lut[px[0] as usize],
                lut[px[1] as usize],
                lut[px[2] as usize],
            ]);
            let encoded = transform::from_linear(mapped);
            px[0] = to_u8(encoded.red);
            px[1] = to_u8(encoded.green);
            px[2] = to_u8(encoded.blue);
        }
    });
}

/// Linear value of every 8-bit sRGB code
fn linearization_table() -> [f64; 256] {
    let mut lut = [0.0; 256];
    for (code, slot) in lut.iter_mut().enumerate() {
        let lin: LinSrgb = Srgb::new(code as u8, 0, 0).into_format::<f32>().into_linear();
        *slot = lin.red as f64;
    }
    lut
}

fn to_u8(v: f32) -> u8 {
    (v * 255.0).round().clamp(0.0, 255.0) as u8
}
