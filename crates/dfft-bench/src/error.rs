use dfft_backend::FftError;
use dfft_comm::CommError;
use dfft_transpose::{AllocationError, DecompositionError, TransposeError};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum BenchError {
    #[error("invalid number of processes: {procs} is not a power of 2")]
    ProcessCount { procs: usize },
    #[error(
        "invalid decomposition {value}: use 0 for automatic, 1 for slab, 2 for rod, 3 for slab with 2D FFT"
    )]
    UnknownDecomposition { value: u32 },
    #[error("invalid decomposition: the {backend} library does not support an automatic decomposition")]
    AutomaticUnsupported { backend: &'static str },
    #[error("invalid extent {extent}: must be a multiple of the process count {procs}")]
    SlabExtent { extent: usize, procs: usize },
    #[error("invalid extent {extent}: must be divisible by 2")]
    RodExtent { extent: usize },
    #[error("invalid decomposition obtained: {0}")]
    Decomposition(#[from] DecompositionError),
    #[error(transparent)]
    Allocation(#[from] AllocationError),
    #[error("residue {residual:e} exceeds tolerance {tolerance:e}")]
    Verification { residual: f64, tolerance: f64 },
    #[error(transparent)]
    Comm(#[from] CommError),
    #[error(transparent)]
    Transpose(#[from] TransposeError),
    #[error(transparent)]
    Fft(#[from] FftError),
    #[error("could not write output: {detail}")]
    Output { detail: String },
}

impl BenchError {
    /// Process exit status for this failure.
    #[must_use]
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::ProcessCount { .. } | Self::Output { .. } => 1,
            Self::UnknownDecomposition { .. }
            | Self::AutomaticUnsupported { .. }
            | Self::SlabExtent { .. }
            | Self::RodExtent { .. } => 2,
            Self::Verification { .. } => 3,
            Self::Allocation(_) => 5,
            Self::Decomposition(_) => 6,
            Self::Comm(err) => comm_code(err),
            Self::Transpose(err) => transpose_code(err),
            Self::Fft(FftError::Transpose(err)) => transpose_code(err),
            Self::Fft(FftError::Unsupported { .. }) => 2,
            Self::Fft(_) => 4,
        }
    }

    /// Whether every rank necessarily reached this same error on its own.
    ///
    /// Such failures need no abort; anything else may leave peers waiting
    /// in a collective.
    #[must_use]
    pub fn is_collective_verdict(&self) -> bool {
        matches!(
            self,
            Self::ProcessCount { .. }
                | Self::UnknownDecomposition { .. }
                | Self::AutomaticUnsupported { .. }
                | Self::SlabExtent { .. }
                | Self::RodExtent { .. }
                | Self::Decomposition(_)
                | Self::Verification { .. }
        ) || self.abort_code().is_some()
    }

    /// Code carried by a group abort that reached this rank.
    #[must_use]
    pub fn abort_code(&self) -> Option<i32> {
        match self {
            Self::Comm(err) => err.abort_code(),
            Self::Transpose(TransposeError::Comm(err))
            | Self::Fft(FftError::Transpose(TransposeError::Comm(err))) => err.abort_code(),
            _ => None,
        }
    }
}

impl From<std::io::Error> for BenchError {
    fn from(err: std::io::Error) -> Self {
        Self::Output {
            detail: err.to_string(),
        }
    }
}

fn comm_code(err: &CommError) -> i32 {
    err.abort_code().unwrap_or(4)
}

fn transpose_code(err: &TransposeError) -> i32 {
    match err {
        TransposeError::Comm(inner) => comm_code(inner),
        TransposeError::Allocation(_) => 5,
        TransposeError::Decomposition(_) => 6,
        TransposeError::LengthMismatch { .. } | TransposeError::SlabShape { .. } => 4,
    }
}
