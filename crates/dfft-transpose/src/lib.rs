#![forbid(unsafe_code)]

//! Distributed transpose engine for pencil and slab decomposed 3-D FFTs.
//!
//! A cube of `E³` complex samples is spread over a `g0 x g1` process grid.
//! Each rank owns a `d1 x d0 x E` block (slowest to fastest), where
//! `d0 = E / g0` and `d1 = E / g1`. Only the innermost axis is contiguous,
//! so between rounds of 1-D transforms the engine rotates a new axis into
//! that position with a rearrange, an all-to-all exchange and an unpack.
//!
//! ## Module layout
//!
//! | Module          | Contents                                               |
//! |-----------------|--------------------------------------------------------|
//! | `decomposition` | [`plan_decomposition`], slab/rod grid arithmetic       |
//! | `plan`          | [`TransposePlan`], [`ProcessGrid`], communicator setup |
//! | `permute`       | rearrange / unpack index permutations                  |
//! | `engine`        | [`exchange`], [`transpose_slices`], [`distributed_transpose`] |
//! | `local`         | [`local_transpose`] of square slabs                    |
//! | `buffer`        | [`DoubleBuffer`]                                       |

pub mod buffer;
pub mod decomposition;
pub mod engine;
pub mod error;
pub mod local;
pub mod permute;
pub mod plan;

pub use buffer::{AllocationError, DoubleBuffer};
pub use decomposition::{
    Decomposition, DecompositionError, DecompositionKind, plan_decomposition, rod_grid,
};
pub use engine::{distributed_transpose, exchange, transpose_slices};
pub use error::TransposeError;
pub use local::local_transpose;
pub use num_complex::Complex64;
pub use permute::{rearrange, rearrange_index, unpack, unpack_index};
pub use plan::{ProcessGrid, TransposePlan, build_process_grid};

/// Axis of a distributed transpose.
///
/// `Row` exchanges within the row communicator (ranks sharing `c1`),
/// `Column` within the column communicator (ranks sharing `c0`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Direction {
    Row,
    Column,
}

impl Direction {
    /// Complex elements every rank sends to each peer in one exchange.
    #[must_use]
    pub fn chunk_elements(self, domain: Domain) -> usize {
        let Domain { d0, d1, .. } = domain;
        match self {
            Self::Row => d0 * d0 * d1,
            Self::Column => d0 * d1 * d1,
        }
    }

    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            Self::Row => "row",
            Self::Column => "column",
        }
    }
}

/// Per-rank block extents.
///
/// Constructed only through [`Domain::new`], so `d0` and `d1` are non-zero
/// divisors of `extent` everywhere a `Domain` is observed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Domain {
    d0: usize,
    d1: usize,
    extent: usize,
}

impl Domain {
    pub fn new(d0: usize, d1: usize, extent: usize) -> Result<Self, DecompositionError> {
        let divides = |d: usize| d > 0 && extent.is_multiple_of(d);
        if extent == 0 || !divides(d0) || !divides(d1) {
            return Err(DecompositionError::InvalidDomain { d0, d1, extent });
        }
        d0.checked_mul(d1)
            .and_then(|plane| plane.checked_mul(extent))
            .ok_or(DecompositionError::InvalidDomain { d0, d1, extent })?;
        Ok(Self { d0, d1, extent })
    }

    #[must_use]
    pub fn d0(&self) -> usize {
        self.d0
    }

    #[must_use]
    pub fn d1(&self) -> usize {
        self.d1
    }

    #[must_use]
    pub fn extent(&self) -> usize {
        self.extent
    }

    /// Complex elements held by one rank.
    #[must_use]
    pub fn len(&self) -> usize {
        self.d0 * self.d1 * self.extent
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Number of `E x E` slabs in a slab-decomposed block (`d0 == E`).
    #[must_use]
    pub fn slab_count(&self) -> usize {
        self.d1
    }

    /// Global `(x, y, z)` position of local slot `index` on the rank at
    /// grid coordinates `coords`.
    #[must_use]
    pub fn global_position(&self, coords: [usize; 2], index: usize) -> [usize; 3] {
        let i = index / (self.d0 * self.extent);
        let j = (index / self.extent) % self.d0;
        let k = index % self.extent;
        [i + coords[1] * self.d1, j + coords[0] * self.d0, k]
    }

    /// Local slot holding global `position`, if the rank at `coords` owns it.
    #[must_use]
    pub fn local_index(&self, coords: [usize; 2], position: [usize; 3]) -> Option<usize> {
        let [x, y, z] = position;
        let i = x.checked_sub(coords[1] * self.d1)?;
        let j = y.checked_sub(coords[0] * self.d0)?;
        (i < self.d1 && j < self.d0 && z < self.extent)
            .then(|| i * self.d0 * self.extent + j * self.extent + z)
    }
}
