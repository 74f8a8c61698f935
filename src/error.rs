use std::time::Duration;
use thiserror::Error;

/// Failures a single analysis run can run into.
///
/// Only `ImageDecode` ends a run; every other variant is recorded in the
/// report under the attribute it belongs to.
#[derive(Debug, Error)]
pub enum AnalysisError {
    #[error("failed to decode image: {0}")]
    ImageDecode(String),

    #[error("no face detected")]
    NoFaceDetected,

    #[error("{detector} failed: {message}")]
    DetectorInvocation { detector: String, message: String },

    #[error("invalid image")]
    InvalidRegion,

    #[error("{detector} timed out after {}ms", .timeout.as_millis())]
    DetectorTimeout { detector: String, timeout: Duration },

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("{0}")]
    Usage(String),
}

impl AnalysisError {
    pub fn is_fatal(&self) -> bool {
        matches!(self, AnalysisError::ImageDecode(_))
    }
}
