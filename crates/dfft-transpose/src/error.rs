use dfft_comm::CommError;
use thiserror::Error;

use crate::buffer::AllocationError;
use crate::decomposition::DecompositionError;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransposeError {
    #[error(transparent)]
    Decomposition(#[from] DecompositionError),
    #[error(transparent)]
    Allocation(#[from] AllocationError),
    #[error("buffer holds {actual} elements, domain needs {expected}")]
    LengthMismatch { expected: usize, actual: usize },
    #[error("slab data of {len} elements is not {slabs} squares of side {extent}")]
    SlabShape {
        len: usize,
        extent: usize,
        slabs: usize,
    },
    #[error("collective failed: {0}")]
    Comm(#[from] CommError),
}

pub(crate) fn check_len(expected: usize, actual: usize) -> Result<(), TransposeError> {
    if expected != actual {
        return Err(TransposeError::LengthMismatch { expected, actual });
    }
    Ok(())
}
