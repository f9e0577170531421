//! Request/response mapping for the three image processing endpoints.
//!
//! This layer decodes an uploaded file, runs the matching [`Pipeline`] and turns the
//! [`ProcessingResult`] into a status code, headers and body. It does not listen on
//! a socket; a web framework (or the CLI) drives it.

use crate::config::ProcessingConfig;
use crate::error::{ErrorKind, ProcessingError};
use crate::pipeline::{Mode, Pipeline, ProcessingResult};
use image::{DynamicImage, ImageFormat};
use serde_json::json;
use std::io::Cursor;
use tracing::{info, info_span, warn};
use uuid::Uuid;

pub const REQUEST_ID_HEADER: &str = "x-request-id";
pub const ERROR_HEADER: &str = "error";
pub const PNG_MEDIA_TYPE: &str = "image/png";
pub const JSON_MEDIA_TYPE: &str = "application/json";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Endpoint {
    ColorCorrection,
    BananaExtraction,
    CombinedProcessing,
}

impl Endpoint {
    pub const ALL: [Endpoint; 3] = [
        Endpoint::ColorCorrection,
        Endpoint::BananaExtraction,
        Endpoint::CombinedProcessing,
    ];

    pub fn path(&self) -> &'static str {
        match self {
            Endpoint::ColorCorrection => "/color_correction",
            Endpoint::BananaExtraction => "/banana_extraction",
            Endpoint::CombinedProcessing => "/combined_processing",
        }
    }

    pub fn from_path(path: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|e| e.path() == path)
    }

    pub fn mode(&self) -> Mode {
        match self {
            Endpoint::ColorCorrection => Mode::ColorCorrection,
            Endpoint::BananaExtraction => Mode::ObjectExtraction,
            Endpoint::CombinedProcessing => Mode::Combined,
        }
    }
}

#[derive(Debug, Clone)]
pub struct ApiResponse {
    pub status: u16,
    pub headers: Vec<(String, String)>,
    pub media_type: &'static str,
    pub body: Vec<u8>,
}

impl ApiResponse {
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.as_str())
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Build the response for a pipeline outcome: PNG plus metadata headers on
    /// success, an error header and JSON body on failure
    pub fn from_result(result: ProcessingResult) -> Self {
        match result {
            ProcessingResult::Success { image, metadata } => match encode_png(&image) {
                Ok(body) => ApiResponse {
                    status: 200,
                    headers: metadata
                        .iter()
                        .map(|(key, value)| (key.clone(), value.to_string()))
                        .collect(),
                    media_type: PNG_MEDIA_TYPE,
                    body,
                },
                Err(err) => Self::from_error(&err),
            },
            ProcessingResult::Failure { kind, message } => Self::failure(kind, message),
        }
    }

    pub fn from_error(err: &ProcessingError) -> Self {
        Self::failure(err.kind(), err.to_string())
    }

    fn failure(kind: ErrorKind, message: String) -> Self {
        let body = json!({ "kind": kind.as_str(), "message": message })
            .to_string()
            .into_bytes();

        ApiResponse {
            status: status_for(kind),
            headers: vec![(ERROR_HEADER.to_string(), message)],
            media_type: JSON_MEDIA_TYPE,
            body,
        }
    }
}

pub fn status_for(kind: ErrorKind) -> u16 {
    match kind {
        ErrorKind::InvalidImage => 400,
        ErrorKind::ColorCheckerNotFound | ErrorKind::ObjectNotFound | ErrorKind::InsufficientPatches => 422,
        ErrorKind::UnexpectedError => 500,
    }
}

/// Decode an uploaded file in any format the `image` crate recognizes
pub fn decode_upload(bytes: &[u8]) -> Result<DynamicImage, ProcessingError> {
    image::load_from_memory(bytes).map_err(|e| ProcessingError::InvalidImage(e.to_string()))
}

pub fn encode_png(image: &DynamicImage) -> Result<Vec<u8>, ProcessingError> {
    let mut buf = Vec::new();
    image
        .write_to(&mut Cursor::new(&mut buf), ImageFormat::Png)
        .map_err(|e| ProcessingError::unexpected(format!("failed to encode PNG: {e}")))?;
    Ok(buf)
}

/// Serve one upload: decode, process, and build the response
pub fn handle_upload(endpoint: Endpoint, bytes: &[u8], config: &ProcessingConfig) -> ApiResponse {
    let request_id = Uuid::new_v4().to_string();
    let span = info_span!("request", id = %request_id, endpoint = endpoint.path());
    let _guard = span.enter();

    let mut response = match decode_upload(bytes) {
        Ok(image) => {
            let pipeline = Pipeline::for_mode(endpoint.mode(), config);
            ApiResponse::from_result(pipeline.run(&image))
        }
        Err(err) => {
            warn!(error = %err, size = bytes.len(), "rejected upload");
            ApiResponse::from_error(&err)
        }
    };

    info!(status = response.status, "request finished");
    response
        .headers
        .push((REQUEST_ID_HEADER.to_string(), request_id));
    response
}
