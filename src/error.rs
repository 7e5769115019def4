//! Error types for overlay editing and compositing

use thiserror::Error;

/// Result type alias for overlay operations
pub type Result<T> = std::result::Result<T, OverlayError>;

/// Error types surfaced by the editing engine
///
/// Only base-image failures are meant to block an editor session. Segmentation
/// and style problems are converted to degraded states at their boundary and
/// appear here only when a caller asks for them directly.
#[derive(Error, Debug)]
pub enum OverlayError {
    /// Input/output errors (file not found, permission denied, etc.)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Image codec errors from the `image` crate
    #[error("Image error: {0}")]
    Image(#[from] image::ImageError),

    /// Base image could not be decoded
    #[error("Decode error: {0}")]
    Decode(String),

    /// Segmentation model load, inference or mask errors
    #[error("Segmentation error: {0}")]
    Segmentation(String),

    /// Invalid configuration or parameters
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Command referenced an overlay that does not exist
    #[error("Unknown overlay: {0}")]
    UnknownOverlay(String),

    /// No decoded preview image is available for rendering
    #[error("Preview unavailable: {0}")]
    PreviewUnavailable(String),

    /// Encoding the composited frame failed
    #[error("Export error: {0}")]
    Export(String),

    /// JSON (de)serialization errors
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Generic error for unexpected conditions
    #[error("Internal error: {0}")]
    Internal(String),
}

impl OverlayError {
    /// Create a new decode error
    pub fn decode<S: Into<String>>(msg: S) -> Self {
        Self::Decode(msg.into())
    }

    /// Create a new segmentation error
    pub fn segmentation<S: Into<String>>(msg: S) -> Self {
        Self::Segmentation(msg.into())
    }

    /// Create a new invalid configuration error
    pub fn invalid_config<S: Into<String>>(msg: S) -> Self {
        Self::InvalidConfig(msg.into())
    }

    /// Create a new unknown overlay error
    pub fn unknown_overlay<S: Into<String>>(id: S) -> Self {
        Self::UnknownOverlay(id.into())
    }

    /// Create a new preview unavailable error
    pub fn preview_unavailable<S: Into<String>>(msg: S) -> Self {
        Self::PreviewUnavailable(msg.into())
    }

    /// Create a new export error
    pub fn export<S: Into<String>>(msg: S) -> Self {
        Self::Export(msg.into())
    }

    /// Create a new internal error
    pub fn internal<S: Into<String>>(msg: S) -> Self {
        Self::Internal(msg.into())
    }

    /// Create file I/O error with operation context
    pub fn file_io_error<P: AsRef<std::path::Path>>(
        operation: &str,
        path: P,
        error: &std::io::Error,
    ) -> Self {
        let path_display = path.as_ref().display();
        Self::Io(std::io::Error::new(
            error.kind(),
            format!("Failed to {} '{}': {}", operation, path_display, error),
        ))
    }

    /// Create configuration error with valid ranges
    pub fn config_value_error<T: std::fmt::Display>(
        parameter: &str,
        value: T,
        valid_range: &str,
        recommended: Option<T>,
    ) -> Self {
        let recommendation = match recommended {
            Some(rec) => format!(" Recommended: {}", rec),
            None => String::new(),
        };

        Self::InvalidConfig(format!(
            "Invalid {}: {} (valid range: {}).{}",
            parameter, value, valid_range, recommendation
        ))
    }

    /// Create segmentation error naming the segmenter and stage
    pub fn segmentation_stage_error(segmenter: &str, stage: &str, details: &str) -> Self {
        Self::Segmentation(format!(
            "Segmenter '{}' failed at stage '{}': {}",
            segmenter, stage, details
        ))
    }
}
