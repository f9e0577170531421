use crate::error::{ProcessingError, Result};
use image::{DynamicImage, GrayImage, Luma, Rgb, RgbImage};
use imageproc::distance_transform::Norm;
use imageproc::filter::gaussian_blur_f32;
use imageproc::morphology::open;
use palette::{FromColor, Hsv, Srgb};

/// Normalize to 8-bit RGB, or 8-bit RGBA when the source carries alpha
pub fn normalize(img: &DynamicImage) -> Result<DynamicImage> {
    if img.width() == 0 || img.height() == 0 {
        return Err(ProcessingError::unexpected(format!(
            "unsupported image shape {}x{}",
            img.width(),
            img.height()
        )));
    }

    Ok(if img.color().has_alpha() {
        DynamicImage::ImageRgba8(img.to_rgba8())
    } else {
        DynamicImage::ImageRgb8(img.to_rgb8())
    })
}

/// Apply Gaussian blur to reduce sensor noise; a non-positive sigma returns a copy
pub fn apply_blur(img: &RgbImage, sigma: f32) -> RgbImage {
    if sigma <= 0.0 {
        return img.clone();
    }
    gaussian_blur_f32(img, sigma)
}

/// L1 distance between two RGB pixels
pub fn color_distance(a: &Rgb<u8>, b: &Rgb<u8>) -> u32 {
    a.0.iter()
        .zip(b.0.iter())
        .map(|(&p, &q)| (p as i32 - q as i32).unsigned_abs())
        .sum()
}

/// Mark pixels whose color matches all of their 4-neighbours within `tolerance`.
///
/// Flat pixels are 255, pixels on a color edge are 0.
pub fn flat_mask(img: &RgbImage, tolerance: u32) -> GrayImage {
    let (width, height) = img.dimensions();
    let mut mask = GrayImage::from_pixel(width, height, Luma([255u8]));

    for y in 0..height {
        for x in 0..width {
            let pixel = img.get_pixel(x, y);
            if x + 1 < width && color_distance(pixel, img.get_pixel(x + 1, y)) > tolerance {
                mask.put_pixel(x, y, Luma([0]));
                mask.put_pixel(x + 1, y, Luma([0]));
            }
            if y + 1 < height && color_distance(pixel, img.get_pixel(x, y + 1)) > tolerance {
                mask.put_pixel(x, y, Luma([0]));
                mask.put_pixel(x, y + 1, Luma([0]));
            }
        }
    }

    mask
}

/// Remove speckles narrower than `radius` pixels from a binary mask
pub fn remove_noise(mask: &GrayImage, radius: u8) -> GrayImage {
    if radius == 0 {
        return mask.clone();
    }
    open(mask, Norm::LInf, radius)
}

/// Convert an 8-bit RGB pixel to HSV with hue in degrees [0, 360)
pub fn to_hsv(pixel: &Rgb<u8>) -> (f32, f32, f32) {
    let srgb = Srgb::new(pixel[0], pixel[1], pixel[2]).into_format::<f32>();
    let hsv = Hsv::from_color(srgb);
    (hsv.hue.into_positive_degrees(), hsv.saturation, hsv.value)
}
