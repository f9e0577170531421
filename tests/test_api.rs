mod common;

use banana_qc::api::{self, ApiResponse, ERROR_HEADER, Endpoint, JSON_MEDIA_TYPE, PNG_MEDIA_TYPE, REQUEST_ID_HEADER};
use common::*;
use image::GenericImageView;

#[test]
fn test_invalid_upload_is_a_client_error() {
    let response = api::handle_upload(
        Endpoint::ColorCorrection,
        b"definitely not an image",
        &ProcessingConfig::default(),
    );

    assert_eq!(response.status, 400);
    assert!(!response.is_success());
    assert_eq!(response.media_type, JSON_MEDIA_TYPE);
    assert!(response.header(ERROR_HEADER).is_some_and(|m| m.starts_with("Not valid image file")));

    let body: serde_json::Value = serde_json::from_slice(&response.body).expect("error body is JSON");
    assert_eq!(body["kind"], "invalid_image");
    assert_eq!(body["message"].as_str(), response.header(ERROR_HEADER));

    let request_id = response.header(REQUEST_ID_HEADER).expect("request id header");
    assert!(uuid::Uuid::parse_str(request_id).is_ok());
}

#[test]
fn test_color_correction_returns_png_and_metadata() {
    let input = color_cast(&chart_image(), [1.15, 0.95, 0.75]);
    let response = api::handle_upload(
        Endpoint::ColorCorrection,
        &png_bytes(&input),
        &ProcessingConfig::default(),
    );

    assert_eq!(response.status, 200);
    assert_eq!(response.media_type, PNG_MEDIA_TYPE);
    assert!(response.header(ERROR_HEADER).is_none());

    let decoded = image::load_from_memory(&response.body).expect("body is a PNG");
    assert_eq!(decoded.dimensions(), input.dimensions());

    let before: f32 = response.header("delta_e_orig").expect("delta_e_orig").parse().unwrap();
    let after: f32 = response
        .header("delta_e_corrected")
        .expect("delta_e_corrected")
        .parse()
        .unwrap();
    assert!(after <= before);
    assert_eq!(response.header("color_correction_version"), Some("0.1.0"));
}

#[test]
fn test_metadata_floats_use_two_decimals() {
    let input = color_cast(&chart_image(), [1.1, 1.0, 0.85]);
    let response = api::handle_upload(
        Endpoint::ColorCorrection,
        &png_bytes(&input),
        &ProcessingConfig::default(),
    );

    let value = response.header("delta_e_orig").expect("delta_e_orig");
    let (_, decimals) = value.split_once('.').expect("decimal point");
    assert_eq!(decimals.len(), 2);
}

#[test]
fn test_banana_extraction_without_bananas() {
    let response = api::handle_upload(
        Endpoint::BananaExtraction,
        &png_bytes(&solid_image(64, 64, [255, 255, 255])),
        &ProcessingConfig::default(),
    );

    assert_eq!(response.status, 422);
    assert_eq!(response.header(ERROR_HEADER), Some("No banana found"));
    assert!(response.header(REQUEST_ID_HEADER).is_some());
}

#[test]
fn test_banana_extraction_reports_count() {
    let response = api::handle_upload(
        Endpoint::BananaExtraction,
        &png_bytes(&banana_image(400, 300, &[(100, 80), (280, 220)])),
        &ProcessingConfig::default(),
    );

    assert_eq!(response.status, 200);
    assert_eq!(response.header("number_of_bananas"), Some("2"));
    assert_eq!(response.header("banana_extraction_version"), Some("0.1.0"));
}

#[test]
fn test_combined_processing_endpoint() {
    let response = api::handle_upload(
        Endpoint::CombinedProcessing,
        &png_bytes(&tray_image()),
        &ProcessingConfig::default(),
    );

    assert_eq!(response.status, 200);
    for key in [
        "delta_e_orig",
        "delta_e_corrected",
        "color_correction_version",
        "number_of_bananas",
        "banana_extraction_version",
    ] {
        assert!(response.header(key).is_some(), "missing header {key}");
    }
}

#[test]
fn test_request_ids_are_unique() {
    let config = ProcessingConfig::default();
    let first = api::handle_upload(Endpoint::ColorCorrection, b"", &config);
    let second = api::handle_upload(Endpoint::ColorCorrection, b"", &config);
    assert_ne!(first.header(REQUEST_ID_HEADER), second.header(REQUEST_ID_HEADER));
}

#[test]
fn test_endpoint_paths() {
    for endpoint in Endpoint::ALL {
        assert_eq!(Endpoint::from_path(endpoint.path()), Some(endpoint));
    }
    assert_eq!(Endpoint::from_path("/unknown"), None);
    assert_eq!(Endpoint::BananaExtraction.mode(), Mode::ObjectExtraction);
    assert_eq!(Endpoint::CombinedProcessing.mode(), Mode::Combined);
}

#[test]
fn test_status_codes_by_kind() {
    assert_eq!(api::status_for(ErrorKind::InvalidImage), 400);
    assert_eq!(api::status_for(ErrorKind::ColorCheckerNotFound), 422);
    assert_eq!(api::status_for(ErrorKind::InsufficientPatches), 422);
    assert_eq!(api::status_for(ErrorKind::ObjectNotFound), 422);
    assert_eq!(api::status_for(ErrorKind::UnexpectedError), 500);

    let response = ApiResponse::from_error(&ProcessingError::unexpected("boom \"quoted\""));
    assert_eq!(response.status, 500);
    assert_eq!(response.header(ERROR_HEADER), Some("Unexpected error: boom \"quoted\""));

    let body: serde_json::Value = serde_json::from_slice(&response.body).expect("error body is JSON");
    assert_eq!(body["kind"], "unexpected_error");
    assert_eq!(body["message"], "Unexpected error: boom \"quoted\"");
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_concurrent_uploads_on_blocking_pool() {
    let config = std::sync::Arc::new(ProcessingConfig::default());
    let uploads = [
        (Endpoint::BananaExtraction, png_bytes(&banana_image(200, 120, &[(100, 60)]))),
        (Endpoint::ColorCorrection, png_bytes(&chart_image())),
        (Endpoint::ColorCorrection, b"garbage".to_vec()),
    ];

    let mut tasks = tokio::task::JoinSet::new();
    for (endpoint, bytes) in uploads {
        let config = std::sync::Arc::clone(&config);
        tasks.spawn_blocking(move || (endpoint, api::handle_upload(endpoint, &bytes, &config)));
    }

    let mut statuses = Vec::new();
    while let Some(joined) = tasks.join_next().await {
        let (endpoint, response) = joined.expect("task completed");
        statuses.push((endpoint.path(), response.status));
    }
    statuses.sort();

    assert_eq!(
        statuses,
        vec![
            ("/banana_extraction", 200),
            ("/color_correction", 200),
            ("/color_correction", 400)
        ]
    );
}
