mod common;

use approx::assert_relative_eq;
use banana_qc::ColorTransform;
use banana_qc::calibration::reference::PATCH_COUNT;
use common::*;
use image::{DynamicImage, Rgba, RgbaImage};
use palette::Srgb;

#[test]
fn test_fit_is_deterministic() -> anyhow::Result<()> {
    let cast = color_cast(&chart_image(), [0.8, 0.9, 0.7]);
    let patches = ColorChartDetector::default().detect(&cast)?;
    let calibrator = ColorCalibrator::new();

    let first = calibrator.fit(&patches)?;
    let second = calibrator.fit(&patches)?;
    assert_eq!(first, second);
    Ok(())
}

#[test]
fn test_identity_fit_leaves_image_unchanged() -> anyhow::Result<()> {
    let calibrator = ColorCalibrator::new();
    let transform = calibrator.fit(&ideal_patches())?;

    for (fitted, expected) in transform.matrix().iter().zip(ColorTransform::identity().matrix().iter()) {
        assert_relative_eq!(*fitted, *expected, epsilon = 1e-6);
    }

    let image = gradient_image(64, 48);
    let corrected = calibrator.apply(&image, &transform)?;
    assert_eq!((corrected.width(), corrected.height()), (image.width(), image.height()));
    assert!(max_channel_diff(&image, &corrected) <= 1);
    Ok(())
}

#[test]
fn test_fit_never_scores_worse_than_identity() -> anyhow::Result<()> {
    let calibrator = ColorCalibrator::new();
    for image in [chart_image(), color_cast(&chart_image(), [0.8, 0.9, 0.7])] {
        let patches = ColorChartDetector::default().detect(&image)?;
        let transform = calibrator.fit(&patches)?;
        let metrics = calibrator.measure_error(&patches, &transform);
        assert!(
            metrics.delta_e_after <= metrics.delta_e_before,
            "after = {}, before = {}",
            metrics.delta_e_after,
            metrics.delta_e_before
        );
    }
    Ok(())
}

#[test]
fn test_correction_reduces_error_on_tinted_chart() -> anyhow::Result<()> {
    let cast = color_cast(&chart_image(), [0.8, 0.9, 0.7]);
    let patches = ColorChartDetector::default().detect(&cast)?;
    let calibrator = ColorCalibrator::new();

    let transform = calibrator.fit(&patches)?;
    let metrics = calibrator.measure_error(&patches, &transform);

    assert!(metrics.delta_e_before > 3.0, "before = {}", metrics.delta_e_before);
    assert!(metrics.delta_e_after >= 0.0);
    assert!(
        metrics.delta_e_after < metrics.delta_e_before * 0.5,
        "after = {}, before = {}",
        metrics.delta_e_after,
        metrics.delta_e_before
    );
    Ok(())
}

#[test]
fn test_corrected_chart_matches_reference() -> anyhow::Result<()> {
    let cast = color_cast(&chart_image(), [0.8, 0.9, 0.7]);
    let calibrator = ColorCalibrator::new();
    let detector = ColorChartDetector::default();

    let transform = calibrator.fit(&detector.detect(&cast)?)?;
    let corrected = calibrator.apply(&cast, &transform)?;

    let before = calibrator.measure_error(&detector.detect(&cast)?, &ColorTransform::identity());
    let after = calibrator.measure_error(&detector.detect(&corrected)?, &ColorTransform::identity());
    assert!(after.delta_e_before < before.delta_e_before);
    Ok(())
}

#[test]
fn test_fit_requires_full_chart() {
    let patches = ideal_patches();
    let err = ColorCalibrator::new().fit(&patches[..10]).unwrap_err();
    assert_eq!(
        err,
        ProcessingError::InsufficientPatches {
            expected: PATCH_COUNT,
            found: 10
        }
    );
}

#[test]
fn test_fit_rejects_degenerate_measurements() {
    let patches: Vec<ColorPatch> = ideal_patches()
        .into_iter()
        .map(|mut p| {
            p.measured = Srgb::new(0.5, 0.5, 0.5);
            p
        })
        .collect();

    let err = ColorCalibrator::new().fit(&patches).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::UnexpectedError);
}

#[test]
fn test_apply_clamps_and_keeps_alpha() -> anyhow::Result<()> {
    let mut matrix = *ColorTransform::identity().matrix();
    // Double every channel and push red past the top of the range
    matrix *= 2.0;
    matrix[(0, 3)] = 0.5;
    let transform = ColorTransform::from_matrix(matrix);

    let image = DynamicImage::ImageRgba8(RgbaImage::from_fn(8, 8, |x, y| {
        Rgba([200, (x * 30) as u8, (y * 30) as u8, 77])
    }));
    let corrected = ColorCalibrator::new().apply(&image, &transform)?;

    let rgba = corrected.as_rgba8().expect("alpha layout preserved");
    for pixel in rgba.pixels() {
        assert_eq!(pixel[0], 255);
        assert_eq!(pixel[3], 77);
    }
    Ok(())
}

#[test]
fn test_identity_transform_has_zero_error_on_ideal_patches() {
    let metrics = ColorCalibrator::new().measure_error(&ideal_patches(), &ColorTransform::identity());
    assert_relative_eq!(metrics.delta_e_before, 0.0, epsilon = 1e-3);
    assert_relative_eq!(metrics.delta_e_after, 0.0, epsilon = 1e-3);
}
