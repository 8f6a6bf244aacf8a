#![no_main]

use arbitrary::Arbitrary;
use dfft_transpose::{DecompositionKind, plan_decomposition};
use libfuzzer_sys::fuzz_target;

#[derive(Debug, Arbitrary)]
struct GridInput {
    extent: u16,
    procs: u16,
    rod: bool,
}

fuzz_target!(|input: GridInput| {
    let extent = usize::from(input.extent);
    let procs = usize::from(input.procs);
    let kind = if input.rod {
        DecompositionKind::Rod
    } else {
        DecompositionKind::Slab
    };
    let Ok(plan) = plan_decomposition(extent, procs, kind) else {
        return;
    };
    let [g0, g1] = plan.dims;
    assert_eq!(g0 * g1, procs);
    assert_eq!(plan.domain.d0() * g0, extent);
    assert_eq!(plan.domain.d1() * g1, extent);
    if input.rod {
        assert!(g0.is_multiple_of(2) && g0 * g0 <= procs);
    } else {
        assert_eq!(g0, 1);
    }
});
