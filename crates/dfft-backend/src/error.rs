use dfft_transpose::TransposeError;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FftError {
    #[error("length mismatch: expected {expected}, got {actual}")]
    LengthMismatch { expected: usize, actual: usize },
    #[error("invalid plan layout: {detail}")]
    InvalidLayout { detail: String },
    #[error("{backend} does not support {operation}")]
    Unsupported {
        operation: &'static str,
        backend: &'static str,
    },
    #[error("unknown backend `{name}` (expected naive or rustfft)")]
    UnknownBackend { name: String },
    #[error(transparent)]
    Transpose(#[from] TransposeError),
}
