//! The ping-pong pair of block-sized buffers.

use log::debug;
use thiserror::Error;

use crate::Complex64;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("could not allocate the {which} buffer of {elements} complex elements")]
pub struct AllocationError {
    pub which: &'static str,
    pub elements: usize,
}

/// Primary and scratch block buffers of identical length.
///
/// The primary half always holds the current block between transposes; the
/// scratch half is free for any operation to clobber.
#[derive(Debug)]
pub struct DoubleBuffer {
    primary: Vec<Complex64>,
    scratch: Vec<Complex64>,
}

impl DoubleBuffer {
    /// Allocates both halves, zero-filled, without aborting on exhaustion.
    pub fn allocate(len: usize) -> Result<Self, AllocationError> {
        let primary = zeroed(len, "primary")?;
        let scratch = zeroed(len, "secondary")?;
        debug!("allocated double buffer of 2x{len} complex elements");
        Ok(Self { primary, scratch })
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.primary.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.primary.is_empty()
    }

    #[must_use]
    pub fn primary(&self) -> &[Complex64] {
        &self.primary
    }

    pub fn primary_mut(&mut self) -> &mut [Complex64] {
        &mut self.primary
    }

    /// Both halves at once, as `(primary, scratch)`.
    pub fn split_mut(&mut self) -> (&mut [Complex64], &mut [Complex64]) {
        (&mut self.primary, &mut self.scratch)
    }
}

fn zeroed(len: usize, which: &'static str) -> Result<Vec<Complex64>, AllocationError> {
    let mut buf = Vec::new();
    buf.try_reserve_exact(len).map_err(|_| AllocationError {
        which,
        elements: len,
    })?;
    buf.resize(len, Complex64::new(0.0, 0.0));
    Ok(buf)
}
