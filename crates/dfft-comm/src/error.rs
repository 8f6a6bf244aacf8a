use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CommError {
    /// The group was torn down by a coordinated abort.
    #[error("communicator group aborted with code {code}")]
    Aborted { code: i32 },
    #[error("exchange buffer holds {actual} words, expected {expected}")]
    BufferLength { expected: usize, actual: usize },
    #[error("process grid {dims:?} does not tile a group of {size} ranks")]
    GridMismatch { dims: [usize; 2], size: usize },
    /// The transport refused an operation (MPI returned no communicator, etc.).
    #[error("transport failure: {detail}")]
    Transport { detail: String },
}

impl CommError {
    /// Exit code a rank should terminate with after this failure.
    ///
    /// An abort carries the code chosen by the rank that triggered it so that
    /// every member of the group exits identically.
    #[must_use]
    pub fn abort_code(&self) -> Option<i32> {
        match self {
            Self::Aborted { code } => Some(*code),
            _ => None,
        }
    }
}
