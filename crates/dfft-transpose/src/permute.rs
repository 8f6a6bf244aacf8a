//! Index permutations bracketing the all-to-all exchange.
//!
//! `rearrange` orders a block so that the run destined for peer `r` is the
//! `r`-th contiguous chunk of the send buffer; `unpack` scatters the received
//! chunks into final local order. Both are bijections of `[0, d0*d1*E)`.
//!
//! The closed-form `*_index` functions are the reference formulas. The slice
//! kernels walk the block with nested loops instead, which avoids a division
//! per element; the unit tests pin the two together.

use crate::error::check_len;
use crate::{Direction, Domain, TransposeError};

/// Destination of element `i` in the rearranged send buffer.
#[must_use]
pub fn rearrange_index(direction: Direction, domain: Domain, i: usize) -> usize {
    let (d0, d1, e) = (domain.d0(), domain.d1(), domain.extent());
    match direction {
        Direction::Row => {
            (i % d0) * d0 + ((i % e) / d0) * d0 * d0 * d1 + (i / e) % d0 + (i / (d0 * e)) * d0 * d0
        }
        Direction::Column => (i % e) * d0 * d1 + ((i / e) % d0) * d1 + i / (d0 * e),
    }
}

/// Destination of element `i` of the received buffer in final local order.
#[must_use]
pub fn unpack_index(direction: Direction, domain: Domain, i: usize) -> usize {
    let (d0, d1, e) = (domain.d0(), domain.d1(), domain.extent());
    let run = match direction {
        Direction::Row => d0,
        Direction::Column => d1,
    };
    let chunk = direction.chunk_elements(domain);
    i % run + ((i / run) % (d0 * d1)) * e + (i / chunk) * run
}

/// Scatters `input` into `output` in send order for `direction`.
pub fn rearrange<T: Copy>(
    direction: Direction,
    domain: Domain,
    input: &[T],
    output: &mut [T],
) -> Result<(), TransposeError> {
    check_len(domain.len(), input.len())?;
    check_len(domain.len(), output.len())?;
    let (d0, d1, e) = (domain.d0(), domain.d1(), domain.extent());

    // input index = a*(d0*E) + b*E + c, a < d1, b < d0, c < E
    for (a, plane) in input.chunks_exact(d0 * e).enumerate() {
        for (b, line) in plane.chunks_exact(e).enumerate() {
            match direction {
                Direction::Row => {
                    let base = b + a * d0 * d0;
                    for (c, &value) in line.iter().enumerate() {
                        output[base + (c % d0) * d0 + (c / d0) * d0 * d0 * d1] = value;
                    }
                }
                Direction::Column => {
                    let base = b * d1 + a;
                    for (c, &value) in line.iter().enumerate() {
                        output[base + c * d0 * d1] = value;
                    }
                }
            }
        }
    }
    Ok(())
}

/// Scatters the received chunks in `input` into final local order.
pub fn unpack<T: Copy>(
    direction: Direction,
    domain: Domain,
    input: &[T],
    output: &mut [T],
) -> Result<(), TransposeError> {
    check_len(domain.len(), input.len())?;
    check_len(domain.len(), output.len())?;
    let e = domain.extent();
    let run = match direction {
        Direction::Row => domain.d0(),
        Direction::Column => domain.d1(),
    };

    // input index = q*chunk + m*run + r, r < run, m < d0*d1
    for (q, chunk) in input
        .chunks_exact(direction.chunk_elements(domain))
        .enumerate()
    {
        for (m, values) in chunk.chunks_exact(run).enumerate() {
            let start = m * e + q * run;
            output[start..start + run].copy_from_slice(values);
        }
    }
    Ok(())
}
