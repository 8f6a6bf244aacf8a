#![forbid(unsafe_code)]

//! Collective transport used by the distributed transpose engine.
//!
//! ## Module layout
//!
//! | Module   | Contents                                                     |
//! |----------|--------------------------------------------------------------|
//! | `error`  | [`CommError`]                                                |
//! | `solo`   | [`SelfComm`], the single-rank identity transport             |
//! | `thread` | [`ThreadUniverse`] / [`ThreadComm`], ranks as scoped threads |
//! | `mpi`    | `MpiComm` over `MPI_COMM_WORLD` (feature `mpi`)              |
//!
//! Every operation on [`Communicator`] is a blocking collective: each member
//! of the communicator must make the same call, in the same order, before any
//! of them returns.

pub mod error;
#[cfg(feature = "mpi")]
pub mod mpi;
pub mod solo;
pub mod thread;

pub use error::CommError;
#[cfg(feature = "mpi")]
pub use mpi::MpiComm;
pub use solo::SelfComm;
pub use thread::{PANIC_ABORT_CODE, ThreadComm, ThreadUniverse};

/// Blocking collective primitives over a fixed group of ranks.
///
/// The data-moving operations are object safe so that numeric backends can
/// borrow a `&dyn Communicator`; the constructors that return a new
/// communicator require `Self: Sized`.
pub trait Communicator {
    /// Rank of the calling member, in `0..size()`.
    fn rank(&self) -> usize;

    /// Number of members.
    fn size(&self) -> usize;

    /// Blocks until every member has entered the barrier.
    fn barrier(&self) -> Result<(), CommError>;

    /// Uniform all-to-all exchange of `f64` words.
    ///
    /// Chunk `r` of `send` is delivered to rank `r`; chunk `s` of `recv` is
    /// filled from rank `s`. Both buffers must hold exactly `chunk * size()`
    /// words.
    fn all_to_all(&self, send: &[f64], recv: &mut [f64], chunk: usize) -> Result<(), CommError>;

    /// Sum of `local` over every member. All members receive the same value.
    fn all_reduce_sum(&self, local: f64) -> Result<f64, CommError>;

    /// Tears down the whole group the caller belongs to.
    ///
    /// Peers blocked in a collective are released with
    /// [`CommError::Aborted`] instead of waiting forever.
    fn abort(&self, code: i32);

    fn is_root(&self) -> bool {
        self.rank() == 0
    }

    /// Builds a non-periodic 2-D Cartesian communicator over all members.
    ///
    /// Returns the new communicator and the caller's `[c0, c1]` coordinates.
    /// `dims[0] * dims[1]` must equal [`Communicator::size`].
    fn create_cartesian(&self, dims: [usize; 2]) -> Result<(Self, [usize; 2]), CommError>
    where
        Self: Sized;

    /// Partitions members by `color`; ranks inside each part follow `key`,
    /// ties broken by the parent rank.
    fn split(&self, color: usize, key: usize) -> Result<Self, CommError>
    where
        Self: Sized;
}

pub(crate) fn check_exchange_lengths(
    send: &[f64],
    recv: &[f64],
    chunk: usize,
    size: usize,
) -> Result<(), CommError> {
    let expected = chunk.checked_mul(size).ok_or(CommError::BufferLength {
        expected: usize::MAX,
        actual: send.len(),
    })?;
    if send.len() != expected {
        return Err(CommError::BufferLength {
            expected,
            actual: send.len(),
        });
    }
    if recv.len() != expected {
        return Err(CommError::BufferLength {
            expected,
            actual: recv.len(),
        });
    }
    Ok(())
}

pub(crate) fn check_grid(dims: [usize; 2], size: usize) -> Result<(), CommError> {
    if dims[0].checked_mul(dims[1]) != Some(size) {
        return Err(CommError::GridMismatch { dims, size });
    }
    Ok(())
}

/// Converts the coordinates a transport reports for a rank into a position
/// on a `dims` grid.
#[cfg_attr(not(feature = "mpi"), allow(dead_code))]
pub(crate) fn grid_coords(position: &[i32], dims: [usize; 2]) -> Result<[usize; 2], CommError> {
    let mut coords = [0usize; 2];
    if position.len() != coords.len() {
        return Err(CommError::Transport {
            detail: format!("expected 2 grid coordinates, got {}", position.len()),
        });
    }
    for ((coord, &raw), dim) in coords.iter_mut().zip(position).zip(dims) {
        *coord = usize::try_from(raw)
            .ok()
            .filter(|&c| c < dim)
            .ok_or_else(|| CommError::Transport {
                detail: format!("grid coordinate {raw} outside 0..{dim}"),
            })?;
    }
    Ok(coords)
}
