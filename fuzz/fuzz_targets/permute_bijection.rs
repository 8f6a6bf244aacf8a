#![no_main]

use arbitrary::Arbitrary;
use dfft_transpose::{Direction, Domain, local_transpose, rearrange_index, unpack_index};
use libfuzzer_sys::fuzz_target;

#[derive(Debug, Arbitrary)]
struct PermuteInput {
    extent: u8,
    d0_pick: u8,
    d1_pick: u8,
    column: bool,
}

fn pick_divisor(extent: usize, pick: u8) -> usize {
    let divisors = (1..=extent)
        .filter(|d| extent.is_multiple_of(*d))
        .collect::<Vec<_>>();
    divisors[usize::from(pick) % divisors.len()]
}

fuzz_target!(|input: PermuteInput| {
    let extent = usize::from(input.extent % 24) + 1;
    let d0 = pick_divisor(extent, input.d0_pick);
    let d1 = pick_divisor(extent, input.d1_pick);
    let Ok(domain) = Domain::new(d0, d1, extent) else {
        return;
    };
    let direction = if input.column {
        Direction::Column
    } else {
        Direction::Row
    };

    let len = domain.len();
    let mut hit_rearrange = vec![false; len];
    let mut hit_unpack = vec![false; len];
    for index in 0..len {
        let r = rearrange_index(direction, domain, index);
        let u = unpack_index(direction, domain, index);
        assert!(!std::mem::replace(&mut hit_rearrange[r], true));
        assert!(!std::mem::replace(&mut hit_unpack[u], true));
    }

    if d0 == extent {
        let original = (0..len).map(|i| i as u32).collect::<Vec<_>>();
        let mut data = original.clone();
        local_transpose(&mut data, extent, d1).expect("square slabs");
        local_transpose(&mut data, extent, d1).expect("square slabs");
        assert_eq!(data, original);
    }
});
