use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Failures produced while processing a single image
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ProcessingError {
    #[error("Not valid image file: {0}")]
    InvalidImage(String),

    #[error("No ColorChecker found: {0}")]
    ColorCheckerNotFound(String),

    #[error("Insufficient color patches: expected {expected}, got {found}")]
    InsufficientPatches { expected: usize, found: usize },

    #[error("No banana found")]
    ObjectNotFound,

    #[error("Unexpected error: {0}")]
    Unexpected(String),
}

/// Discriminant of [`ProcessingError`], suitable for branching and serialization
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    InvalidImage,
    ColorCheckerNotFound,
    InsufficientPatches,
    ObjectNotFound,
    UnexpectedError,
}

impl ProcessingError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            ProcessingError::InvalidImage(_) => ErrorKind::InvalidImage,
            ProcessingError::ColorCheckerNotFound(_) => ErrorKind::ColorCheckerNotFound,
            ProcessingError::InsufficientPatches { .. } => ErrorKind::InsufficientPatches,
            ProcessingError::ObjectNotFound => ErrorKind::ObjectNotFound,
            ProcessingError::Unexpected(_) => ErrorKind::UnexpectedError,
        }
    }

    pub fn unexpected(message: impl Into<String>) -> Self {
        ProcessingError::Unexpected(message.into())
    }
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::InvalidImage => "invalid_image",
            ErrorKind::ColorCheckerNotFound => "color_checker_not_found",
            ErrorKind::InsufficientPatches => "insufficient_patches",
            ErrorKind::ObjectNotFound => "object_not_found",
            ErrorKind::UnexpectedError => "unexpected_error",
        }
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Failures while loading or validating a [`crate::config::ProcessingConfig`]
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse config: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("Invalid config value: {field} ({reason})")]
    Invalid { field: &'static str, reason: String },
}

pub type Result<T> = std::result::Result<T, ProcessingError>;
