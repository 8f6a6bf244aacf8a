//! Rearrange -> all-to-all -> unpack.

use dfft_comm::Communicator;
use log::debug;

use crate::buffer::DoubleBuffer;
use crate::error::check_len;
use crate::permute::{rearrange, unpack};
use crate::plan::TransposePlan;
use crate::{Complex64, Direction, Domain, TransposeError};

/// Uniform all-to-all of `chunk_elements` complex values per peer.
///
/// Values travel as `(re, im)` pairs of `f64`, whatever produced them.
pub fn exchange<C: Communicator + ?Sized>(
    comm: &C,
    chunk_elements: usize,
    send: &[Complex64],
    recv: &mut [Complex64],
) -> Result<(), TransposeError> {
    let words = chunk_elements
        .checked_mul(2)
        .ok_or(TransposeError::LengthMismatch {
            expected: usize::MAX,
            actual: send.len(),
        })?;
    comm.all_to_all(
        bytemuck::cast_slice(send),
        bytemuck::cast_slice_mut(recv),
        words,
    )?;
    Ok(())
}

/// One distributed transpose of the block in `primary`, using `scratch` as
/// the second buffer. The result is left in `primary`.
pub fn transpose_slices<C: Communicator + ?Sized>(
    comm: &C,
    direction: Direction,
    domain: Domain,
    primary: &mut [Complex64],
    scratch: &mut [Complex64],
) -> Result<(), TransposeError> {
    check_len(domain.len(), primary.len())?;
    check_len(domain.len(), scratch.len())?;
    let chunk = direction.chunk_elements(domain);

    rearrange(direction, domain, primary, scratch)?;
    debug!("{} rearrange done, chunk {chunk}", direction.name());
    exchange(comm, chunk, scratch, primary)?;
    debug!("{} exchange done over {} ranks", direction.name(), comm.size());
    unpack(direction, domain, primary, scratch)?;
    primary.copy_from_slice(scratch);
    Ok(())
}

/// [`transpose_slices`] over the plan's communicator and a [`DoubleBuffer`].
pub fn distributed_transpose<C: Communicator>(
    plan: &TransposePlan<C>,
    domain: Domain,
    buffers: &mut DoubleBuffer,
) -> Result<(), TransposeError> {
    let (primary, scratch) = buffers.split_mut();
    transpose_slices(plan.comm(), plan.direction(), domain, primary, scratch)
}
