//! MPI transport (feature `mpi`).
//!
//! Wraps an rsmpi `SimpleCommunicator`, or the `CartesianCommunicator`
//! built by `MPI_Cart_create`. The caller owns the `Universe`
//! returned by `mpi::initialize()` and must keep it alive for as long as any
//! `MpiComm` exists; dropping it finalizes MPI.

use log::{debug, error};
use mpi::collective::SystemOperation;
use mpi::environment::Universe;
use mpi::topology::{CartesianCommunicator, Color, SimpleCommunicator};
use mpi::traits::*;

use crate::{CommError, Communicator, check_exchange_lengths, check_grid, grid_coords};

enum Handle {
    Simple(SimpleCommunicator),
    Cartesian(CartesianCommunicator),
}

/// Runs `$body` with `$comm` bound to whichever rsmpi communicator is held.
macro_rules! with_comm {
    ($handle:expr, $comm:ident => $body:expr) => {
        match $handle {
            Handle::Simple($comm) => $body,
            Handle::Cartesian($comm) => $body,
        }
    };
}

pub struct MpiComm {
    inner: Handle,
}

impl MpiComm {
    /// A handle on `MPI_COMM_WORLD`.
    #[must_use]
    pub fn world(universe: &Universe) -> Self {
        Self {
            inner: Handle::Simple(universe.world()),
        }
    }
}

impl Communicator for MpiComm {
    fn rank(&self) -> usize {
        with_comm!(&self.inner, comm => comm.rank() as usize)
    }

    fn size(&self) -> usize {
        with_comm!(&self.inner, comm => comm.size() as usize)
    }

    fn barrier(&self) -> Result<(), CommError> {
        // MPI errors are fatal under the default handler.
        with_comm!(&self.inner, comm => comm.barrier());
        Ok(())
    }

    fn all_to_all(&self, send: &[f64], recv: &mut [f64], chunk: usize) -> Result<(), CommError> {
        check_exchange_lengths(send, recv, chunk, self.size())?;
        with_comm!(&self.inner, comm => comm.all_to_all_into(send, recv));
        Ok(())
    }

    fn all_reduce_sum(&self, local: f64) -> Result<f64, CommError> {
        let mut global = 0.0f64;
        with_comm!(&self.inner, comm => {
            comm.all_reduce_into(&local, &mut global, SystemOperation::sum())
        });
        Ok(global)
    }

    fn abort(&self, code: i32) {
        error!("rank {} calling MPI_Abort with code {code}", self.rank());
        with_comm!(&self.inner, comm => comm.abort(code))
    }

    fn create_cartesian(&self, dims: [usize; 2]) -> Result<(Self, [usize; 2]), CommError> {
        check_grid(dims, self.size())?;
        let mut counts = [0i32; 2];
        for (count, dim) in counts.iter_mut().zip(dims) {
            *count = i32::try_from(dim).map_err(|_| CommError::Transport {
                detail: format!("grid dimension {dim} exceeds the MPI range"),
            })?;
        }
        // Non-periodic, MPI may reorder ranks.
        let cart = with_comm!(&self.inner, comm => {
            comm.create_cartesian_communicator(&counts, &[false, false], true)
        })
        .ok_or_else(|| CommError::Transport {
            detail: String::from("MPI_Cart_create returned no communicator"),
        })?;
        let coords = grid_coords(&cart.rank_to_coordinates(cart.rank()), dims)?;
        debug!(
            "rank {} placed at {coords:?} of a {}x{} grid as rank {}",
            self.rank(),
            dims[0],
            dims[1],
            cart.rank()
        );
        Ok((
            Self {
                inner: Handle::Cartesian(cart),
            },
            coords,
        ))
    }

    fn split(&self, color: usize, key: usize) -> Result<Self, CommError> {
        let color = i32::try_from(color).map_err(|_| CommError::Transport {
            detail: format!("split color {color} exceeds the MPI range"),
        })?;
        let key = i32::try_from(key).map_err(|_| CommError::Transport {
            detail: format!("split key {key} exceeds the MPI range"),
        })?;
        with_comm!(&self.inner, comm => {
            comm.split_by_color_with_key(Color::with_value(color), key)
        })
        .map(|inner| Self {
            inner: Handle::Simple(inner),
        })
        .ok_or_else(|| CommError::Transport {
            detail: format!("MPI_Comm_split returned no communicator for color {color}"),
        })
    }
}
