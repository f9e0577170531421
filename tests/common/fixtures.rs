use banana_qc::calibration::reference::{COLOR_CHECKER, ChartLayout, reference_color, render_chart};
use banana_qc::{BoundingBox, ColorPatch};
use image::imageops::overlay;
use image::{DynamicImage, ImageFormat, Rgb, RgbImage};
use imageproc::drawing::draw_filled_ellipse_mut;
use std::io::Cursor;

pub const BACKGROUND: Rgb<u8> = Rgb([128, 128, 128]);
pub const BANANA_YELLOW: Rgb<u8> = Rgb([230, 200, 40]);

/// Where the chart sits on the canvases built below
pub const CHART_ORIGIN: (u32, u32) = (20, 20);

pub fn solid_image(width: u32, height: u32, color: [u8; 3]) -> DynamicImage {
    DynamicImage::ImageRgb8(RgbImage::from_pixel(width, height, Rgb(color)))
}

/// Upright default chart on a 400x300 gray canvas
pub fn chart_image() -> DynamicImage {
    let mut canvas = RgbImage::from_pixel(400, 300, BACKGROUND);
    paste_chart(&mut canvas);
    DynamicImage::ImageRgb8(canvas)
}

pub fn paste_chart(canvas: &mut RgbImage) {
    let chart = render_chart(&ChartLayout::default());
    overlay(canvas, &chart, CHART_ORIGIN.0 as i64, CHART_ORIGIN.1 as i64);
}

/// Elongated yellow ellipses on a light gray background
pub fn banana_image(width: u32, height: u32, centers: &[(i32, i32)]) -> DynamicImage {
    let mut img = RgbImage::from_pixel(width, height, Rgb([200, 200, 200]));
    for &center in centers {
        draw_banana(&mut img, center);
    }
    DynamicImage::ImageRgb8(img)
}

pub fn draw_banana(img: &mut RgbImage, center: (i32, i32)) {
    draw_filled_ellipse_mut(img, center, 50, 18, BANANA_YELLOW);
}

/// 600x400 canvas with the chart top-left and two bananas beside it
pub fn tray_image() -> DynamicImage {
    let mut canvas = RgbImage::from_pixel(600, 400, BACKGROUND);
    paste_chart(&mut canvas);
    draw_banana(&mut canvas, (480, 120));
    draw_banana(&mut canvas, (200, 330));
    DynamicImage::ImageRgb8(canvas)
}

/// Scale every channel in sRGB space, as a strongly tinted light source would
pub fn color_cast(image: &DynamicImage, gains: [f32; 3]) -> DynamicImage {
    let mut rgb = image.to_rgb8();
    for pixel in rgb.pixels_mut() {
        for (channel, gain) in pixel.0.iter_mut().zip(gains) {
            *channel = (*channel as f32 * gain).round().clamp(0.0, 255.0) as u8;
        }
    }
    DynamicImage::ImageRgb8(rgb)
}

/// Horizontal/vertical color ramp covering a wide gamut
pub fn gradient_image(width: u32, height: u32) -> DynamicImage {
    DynamicImage::ImageRgb8(RgbImage::from_fn(width, height, |x, y| {
        Rgb([
            (x * 255 / width.max(1)) as u8,
            (y * 255 / height.max(1)) as u8,
            ((x + y) * 127 / (width + height).max(1)) as u8 + 64,
        ])
    }))
}

/// Chart patches whose measured colors equal their references
pub fn ideal_patches() -> Vec<ColorPatch> {
    COLOR_CHECKER
        .iter()
        .enumerate()
        .map(|(index, (name, _))| ColorPatch {
            index,
            name: *name,
            centroid: (0.0, 0.0),
            bbox: BoundingBox::new(0, 0, 1, 1),
            measured: reference_color(index),
            reference: reference_color(index),
        })
        .collect()
}

pub fn png_bytes(image: &DynamicImage) -> Vec<u8> {
    let mut buf = Vec::new();
    image
        .write_to(&mut Cursor::new(&mut buf), ImageFormat::Png)
        .expect("Failed to encode test image");
    buf
}

/// Largest per-channel difference between two images of equal size
pub fn max_channel_diff(a: &DynamicImage, b: &DynamicImage) -> u8 {
    a.to_rgba8()
        .as_raw()
        .iter()
        .zip(b.to_rgba8().as_raw())
        .map(|(p, q)| p.abs_diff(*q))
        .max()
        .unwrap_or(0)
}
