//! Process-grid and per-rank domain arithmetic.
//!
//! Everything here is a pure function of `(extent, procs, kind)`, so every
//! rank reaches the same verdict without exchanging a message.

use log::debug;
use thiserror::Error;

use crate::Domain;

/// How the cube is split over processes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DecompositionKind {
    /// Layout chosen by a backend with its own distributed 3-D transform.
    Auto,
    /// One axis split: grid `1 x P`.
    Slab,
    /// Two axes split: grid `i x P/i` with `i` even.
    Rod,
}

impl DecompositionKind {
    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            Self::Auto => "auto",
            Self::Slab => "slab",
            Self::Rod => "rod",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DecompositionError {
    #[error("cube extent must be at least 1")]
    ZeroExtent,
    #[error("at least one process is required")]
    NoProcesses,
    #[error("extent {extent} does not split evenly over {parts} processes")]
    Remainder { extent: usize, parts: usize },
    #[error("no even divisor of {procs} at or below its square root; no rod grid exists")]
    RodFactor { procs: usize },
    #[error("block {d0}x{d1} does not tile a cube of extent {extent}")]
    InvalidDomain { d0: usize, d1: usize, extent: usize },
}

/// Grid shape and per-rank block of a decomposition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Decomposition {
    pub kind: DecompositionKind,
    /// `[g0, g1]`, with `g0 * g1 == procs`.
    pub dims: [usize; 2],
    pub domain: Domain,
}

impl Decomposition {
    #[must_use]
    pub fn procs(&self) -> usize {
        self.dims[0] * self.dims[1]
    }
}

/// Largest even `i <= floor(sqrt(procs))` dividing `procs`, as `[i, procs / i]`.
pub fn rod_grid(procs: usize) -> Result<[usize; 2], DecompositionError> {
    (1..=procs.isqrt())
        .rev()
        .find(|&i| i.is_multiple_of(2) && procs.is_multiple_of(i))
        .map(|i| [i, procs / i])
        .ok_or(DecompositionError::RodFactor { procs })
}

/// Derives the process grid and per-rank block for `procs` ranks.
///
/// `Auto` uses the slab grid; whether the chosen backend can actually run an
/// automatic transform is a separate capability check.
pub fn plan_decomposition(
    extent: usize,
    procs: usize,
    kind: DecompositionKind,
) -> Result<Decomposition, DecompositionError> {
    if extent == 0 {
        return Err(DecompositionError::ZeroExtent);
    }
    if procs == 0 {
        return Err(DecompositionError::NoProcesses);
    }
    let dims = match kind {
        DecompositionKind::Auto | DecompositionKind::Slab => [1, procs],
        DecompositionKind::Rod => rod_grid(procs)?,
    };
    for parts in dims {
        if !extent.is_multiple_of(parts) {
            return Err(DecompositionError::Remainder { extent, parts });
        }
    }
    let domain = Domain::new(extent / dims[0], extent / dims[1], extent)?;
    debug!(
        "{} decomposition of {extent}^3 over {procs}: grid {}x{}, block {}x{}x{extent}",
        kind.name(),
        dims[0],
        dims[1],
        domain.d1(),
        domain.d0()
    );
    Ok(Decomposition { kind, dims, domain })
}
