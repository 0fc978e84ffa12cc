use std::path::PathBuf;

/// Everything that can go wrong between receiving image bytes and returning
/// a prediction. The HTTP layer maps `DecodeFailure` to a client error and
/// the rest to server errors.
#[derive(Debug, thiserror::Error)]
pub enum PredictError {
    #[error("model artifact missing or unreadable: {path}: {reason}")]
    ArtifactMissing { path: PathBuf, reason: String },

    #[error("failed to decode image: {0}")]
    DecodeFailure(#[from] image::ImageError),

    #[error("unexpected tensor shape: expected {expected:?}, got {got:?}")]
    ShapeMismatch {
        expected: Vec<usize>,
        got: Vec<usize>,
    },

    #[error("inference failed: {0}")]
    InferenceFailure(String),
}

impl PredictError {
    /// True for errors caused by the caller's input rather than the service.
    pub fn is_client_error(&self) -> bool {
        matches!(self, PredictError::DecodeFailure(_))
    }
}
