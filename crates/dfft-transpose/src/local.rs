use crate::TransposeError;

/// Transposes `slabs` contiguous `extent x extent` squares in place.
///
/// The diagonal is never touched and applying it twice restores the input.
pub fn local_transpose<T>(data: &mut [T], extent: usize, slabs: usize) -> Result<(), TransposeError> {
    let square = extent.checked_mul(extent);
    if square.and_then(|sq| sq.checked_mul(slabs)) != Some(data.len()) {
        return Err(TransposeError::SlabShape {
            len: data.len(),
            extent,
            slabs,
        });
    }
    if extent == 0 {
        return Ok(());
    }
    for slab in data.chunks_exact_mut(extent * extent) {
        for j in 1..extent {
            for k in 0..j {
                slab.swap(j * extent + k, k * extent + j);
            }
        }
    }
    Ok(())
}
