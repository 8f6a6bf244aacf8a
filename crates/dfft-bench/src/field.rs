//! Synthetic input fields, the expected spectrum, and their comparison.

use std::f64::consts::PI;
use std::fmt::Write as _;

use dfft_comm::Communicator;
use dfft_transpose::{Complex64, Domain};

use crate::format::format_g;

/// Maximum normalised residue accepted by [`residual`].
pub const TOLERANCE: f64 = 1e-10;

/// Fills `data` with `sin(2π(x + y + z) / E)`.
///
/// Its forward transform is zero except for `-i E³/2` at `(1, 1, 1)` and
/// `+i E³/2` at `(E-1, E-1, E-1)`.
pub fn fill_multisine(data: &mut [Complex64], domain: Domain, coords: [usize; 2]) {
    let ratio = 2.0 * PI / domain.extent() as f64;
    for (index, value) in data.iter_mut().enumerate() {
        let [x, y, z] = domain.global_position(coords, index);
        let angle = ratio * x as f64 + ratio * y as f64 + ratio * z as f64;
        *value = Complex64::new(angle.sin(), 0.0);
    }
}

/// Fills `data` with the global linear index in the real part and the
/// owner's grid coordinates (`100 c0 + c1`) in the imaginary part.
pub fn fill_counting(data: &mut [Complex64], domain: Domain, coords: [usize; 2]) {
    let e = domain.extent();
    let owner = (coords[0] * 100 + coords[1]) as f64;
    for (index, value) in data.iter_mut().enumerate() {
        let [x, y, z] = domain.global_position(coords, index);
        *value = Complex64::new((x * e * e + y * e + z) as f64, owner);
    }
}

/// Expected transform of [`fill_multisine`] at one global position.
#[must_use]
pub fn reference_value(extent: usize, position: [usize; 3]) -> Complex64 {
    let e = extent as f64;
    let peak = 0.5 * e * e * e;
    let far = extent.saturating_sub(1);
    // The far peak wins where both coincide.
    if position == [far; 3] {
        Complex64::new(0.0, peak)
    } else if position == [1; 3] {
        Complex64::new(0.0, -peak)
    } else {
        Complex64::new(0.0, 0.0)
    }
}

/// Σ|computed − reference| over the whole cube, divided by E³.
///
/// Collective: every rank receives the same value.
pub fn residual<C: Communicator + ?Sized>(
    comm: &C,
    data: &[Complex64],
    domain: Domain,
    coords: [usize; 2],
) -> Result<f64, dfft_comm::CommError> {
    let extent = domain.extent();
    let local = data
        .iter()
        .enumerate()
        .map(|(index, value)| {
            let position = domain.global_position(coords, index);
            (value - reference_value(extent, position)).norm()
        })
        .sum::<f64>();
    let global = comm.all_reduce_sum(local)?;
    let e = extent as f64;
    Ok(global / (e * e * e))
}

/// Human readable dump of one rank's block: a `(c0,c1)` header, then one
/// line per `(i, j)` row of `re,im` pairs, planes separated by blank lines.
#[must_use]
pub fn render_block(data: &[Complex64], domain: Domain, coords: [usize; 2]) -> String {
    let clean = |v: f64| if v.abs() > 1e-5 { v } else { 0.0 };
    let mut out = format!("({},{})\n", coords[0], coords[1]);
    for plane in data.chunks(domain.d0() * domain.extent()) {
        for row in plane.chunks(domain.extent()) {
            for value in row {
                let _ = write!(
                    out,
                    "{},{} ",
                    format_g(clean(value.re)),
                    format_g(clean(value.im))
                );
            }
            out.push('\n');
        }
        out.push_str("\n\n");
    }
    out
}
