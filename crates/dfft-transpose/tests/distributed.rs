//! Multi-rank transposes on the thread transport.
//!
//! Every sample is tagged with its global `(x, y, z)` before the pipeline
//! runs, so after the transposes each slot can be checked against the
//! position it must have come from.

use dfft_comm::{CommError, Communicator, ThreadUniverse};
use dfft_transpose::{
    Complex64, DecompositionKind, DoubleBuffer, TransposeError, build_process_grid,
    distributed_transpose, local_transpose, plan_decomposition,
};

fn encode([x, y, z]: [usize; 3], extent: usize) -> Complex64 {
    Complex64::new((x * extent * extent + y * extent + z) as f64, 0.5)
}

fn decode(value: Complex64, extent: usize) -> [usize; 3] {
    let v = value.re as usize;
    [v / (extent * extent), (v / extent) % extent, v % extent]
}

struct RankBlock {
    coords: [usize; 2],
    positions: Vec<[usize; 3]>,
    values: Vec<Complex64>,
}

/// Runs `rounds` forward pipelines (rod: row + column, slab: local +
/// column) and returns every rank's block.
fn run_pipeline(
    kind: DecompositionKind,
    extent: usize,
    procs: usize,
    rounds: usize,
) -> Vec<RankBlock> {
    let plan = plan_decomposition(extent, procs, kind).expect("valid decomposition");
    let universe = ThreadUniverse::new(procs).expect("universe");
    universe
        .run(|world| {
            let grid = build_process_grid(&world, &plan).expect("process grid");
            let domain = grid.domain();
            let coords = grid.coords();
            let positions = (0..domain.len())
                .map(|i| domain.global_position(coords, i))
                .collect::<Vec<_>>();
            let mut buffers = DoubleBuffer::allocate(domain.len()).expect("buffers");
            for (slot, position) in buffers.primary_mut().iter_mut().zip(&positions) {
                *slot = encode(*position, extent);
            }
            for _ in 0..rounds {
                match kind {
                    DecompositionKind::Rod => {
                        distributed_transpose(grid.row_plan(), domain, &mut buffers)
                            .expect("row transpose");
                    }
                    _ => {
                        local_transpose(buffers.primary_mut(), extent, domain.slab_count())
                            .expect("local transpose");
                    }
                }
                distributed_transpose(grid.column_plan(), domain, &mut buffers)
                    .expect("column transpose");
            }
            let values = buffers.primary().to_vec();
            grid.release();
            RankBlock {
                coords,
                positions,
                values,
            }
        })
        .expect("ranks should start")
}

fn assert_rotated(blocks: &[RankBlock], extent: usize) {
    for block in blocks {
        for (position, value) in block.positions.iter().zip(&block.values) {
            let [o0, o1, o2] = decode(*value, extent);
            assert_eq!(
                *position,
                [o1, o2, o0],
                "rank at {:?} holds a sample from ({o0},{o1},{o2})",
                block.coords
            );
            assert_eq!(value.im, 0.5);
        }
    }
}

#[test]
fn rod_pipeline_rotates_global_axes() {
    for (extent, procs) in [(4, 4), (8, 4), (6, 6), (8, 8), (12, 6)] {
        let blocks = run_pipeline(DecompositionKind::Rod, extent, procs, 1);
        assert_eq!(blocks.len(), procs);
        assert_rotated(&blocks, extent);
    }
}

#[test]
fn slab_pipeline_rotates_global_axes() {
    for (extent, procs) in [(4, 1), (4, 2), (4, 4), (6, 3), (8, 8)] {
        let blocks = run_pipeline(DecompositionKind::Slab, extent, procs, 1);
        assert_rotated(&blocks, extent);
    }
}

#[test]
fn three_rod_pipelines_restore_every_block() {
    for (extent, procs) in [(4, 4), (6, 6)] {
        for block in run_pipeline(DecompositionKind::Rod, extent, procs, 3) {
            for (position, value) in block.positions.iter().zip(&block.values) {
                assert_eq!(decode(*value, extent), *position);
            }
        }
    }
}

#[test]
fn abort_on_one_rank_fails_the_exchange_everywhere() {
    let plan = plan_decomposition(4, 4, DecompositionKind::Rod).expect("plan");
    let universe = ThreadUniverse::new(4).expect("universe");
    let outcomes = universe
        .run(|world| {
            let grid = build_process_grid(&world, &plan).expect("grid");
            let domain = grid.domain();
            let mut buffers = DoubleBuffer::allocate(domain.len()).expect("buffers");
            if world.rank() == 3 {
                world.abort(5);
                return Err(TransposeError::Comm(CommError::Aborted { code: 5 }));
            }
            distributed_transpose(grid.row_plan(), domain, &mut buffers)?;
            distributed_transpose(grid.column_plan(), domain, &mut buffers)
        })
        .expect("ranks should start");
    for outcome in outcomes {
        assert_eq!(
            outcome,
            Err(TransposeError::Comm(CommError::Aborted { code: 5 }))
        );
    }
}
