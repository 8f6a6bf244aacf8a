//! One rank's benchmark run: validation, setup, timed transform, checking,
//! the result line and shutdown.

use std::io::Write;
use std::time::Instant;

use dfft_backend::{FftBackend, FftPlan, PlanLayout, resolve_backend};
use dfft_comm::Communicator;
use dfft_transpose::{
    Complex64, DecompositionKind, Domain, DoubleBuffer, ProcessGrid, build_process_grid,
    distributed_transpose, local_transpose, plan_decomposition,
};
use log::{debug, error, info};
use serde::Serialize;

use crate::BenchError;
use crate::config::{RunConfig, validate_parameters};
use crate::field::{TOLERANCE, fill_counting, fill_multisine, render_block, residual};
use crate::format::format_g;

/// Outcome of one run as seen by the calling rank.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RunReport {
    pub procs: usize,
    pub extent: usize,
    pub decomposition: &'static str,
    pub fft_mode: &'static str,
    pub backend: &'static str,
    pub grid: [usize; 2],
    pub reorg_seconds: f64,
    pub fft_seconds: f64,
    pub total_seconds: f64,
    /// Absent when the data was printed or some work was skipped.
    pub residual: Option<f64>,
}

impl RunReport {
    /// The machine readable `fft-results:` line.
    #[must_use]
    pub fn result_line(&self) -> String {
        format!(
            "fft-results:{},{},{},{},{},{},{},{}",
            self.procs,
            self.extent,
            self.decomposition,
            self.fft_mode,
            self.backend,
            format_g(self.reorg_seconds),
            format_g(self.fft_seconds),
            format_g(self.total_seconds)
        )
    }
}

/// Six timestamps `t0..t5` in seconds since the start of the transform.
///
/// FFT phases are `t0..t1`, `t2..t3` and `t4..t5`; reorganisation phases are
/// `t1..t2` and `t3..t4`.
#[derive(Debug, Clone, Copy)]
pub struct PhaseClock {
    origin: Instant,
    stamps: [f64; 6],
}

impl PhaseClock {
    #[must_use]
    pub fn start() -> Self {
        Self {
            origin: Instant::now(),
            stamps: [0.0; 6],
        }
    }

    /// Sets stamp `index` and every later stamp to the current time, so a
    /// phase that never runs takes zero time.
    pub fn mark(&mut self, index: usize) {
        let now = self.origin.elapsed().as_secs_f64();
        for stamp in self.stamps.iter_mut().skip(index) {
            *stamp = now;
        }
    }

    #[must_use]
    pub fn stamps(&self) -> [f64; 6] {
        self.stamps
    }

    #[must_use]
    pub fn reorg_seconds(&self) -> f64 {
        let t = self.stamps;
        (t[2] - t[1]) + (t[4] - t[3])
    }

    #[must_use]
    pub fn fft_seconds(&self) -> f64 {
        let t = self.stamps;
        (t[1] - t[0]) + (t[3] - t[2]) + (t[5] - t[4])
    }

    #[must_use]
    pub fn total_seconds(&self) -> f64 {
        self.stamps[5] - self.stamps[0]
    }
}

/// Runs the benchmark on the calling rank. Collective over `world`.
///
/// Rank 0 writes the result line to `out`; with `print` set every rank writes
/// its block there in grid order. A failure only this rank can see aborts the
/// whole group with the failure's exit code, so no peer is left waiting in a
/// collective.
pub fn run_rank<C: Communicator, W: Write>(
    world: &C,
    config: &RunConfig,
    out: &mut W,
) -> Result<RunReport, BenchError> {
    let outcome = execute(world, config, out);
    if let Err(err) = &outcome
        && !err.is_collective_verdict()
    {
        error!("rank {} failed: {err}; aborting", world.rank());
        world.abort(err.exit_code());
    }
    outcome
}

fn execute<C: Communicator, W: Write>(
    world: &C,
    config: &RunConfig,
    out: &mut W,
) -> Result<RunReport, BenchError> {
    let procs = world.size();
    let backend = resolve_backend(config.backend);
    let kind = validate_parameters(procs, config, backend)?;
    let decomposition = plan_decomposition(config.extent, procs, kind)?;
    let grid = build_process_grid(world, &decomposition)?;
    let outcome = run_on_grid(&grid, kind, backend, config, out);
    grid.release();
    outcome
}

fn run_on_grid<C: Communicator, W: Write>(
    grid: &ProcessGrid<C>,
    kind: DecompositionKind,
    backend: &'static dyn FftBackend,
    config: &RunConfig,
    out: &mut W,
) -> Result<RunReport, BenchError> {
    let domain = grid.domain();
    let mut buffers = DoubleBuffer::allocate(domain.len())?;
    let mut fft = backend.prepare(PlanLayout {
        domain,
        use_2d: config.use_2d,
        automatic: kind == DecompositionKind::Auto,
    })?;
    let outcome = benchmark(grid, kind, backend, config, fft.as_mut(), &mut buffers, out);
    fft.teardown();
    drop(buffers);
    outcome
}

fn benchmark<C: Communicator, W: Write>(
    grid: &ProcessGrid<C>,
    kind: DecompositionKind,
    backend: &'static dyn FftBackend,
    config: &RunConfig,
    fft: &mut dyn FftPlan,
    buffers: &mut DoubleBuffer,
    out: &mut W,
) -> Result<RunReport, BenchError> {
    let cart = grid.cartesian();
    let domain = grid.domain();
    let coords = grid.coords();
    let dims = grid.dims();

    if config.skips_work() {
        fill_counting(buffers.primary_mut(), domain, coords);
    } else {
        fill_multisine(buffers.primary_mut(), domain, coords);
    }

    if cart.is_root() {
        let e = config.extent;
        info!(
            "running 3-D FFT benchmark with {} ranks: problem {e}x{e}x{e}, {} decomposition {}x{}, \
             each block {}x{}x{e}, library {}, 2-D FFT calls: {}",
            cart.size(),
            kind.name(),
            dims[0],
            dims[1],
            domain.d1(),
            domain.d0(),
            backend.name(),
            if config.use_2d { "yes" } else { "no" }
        );
        if config.skip {
            info!("skip is set, the calculation will be skipped");
        }
        if config.skip_fft {
            info!("skip-fft is set, FFTs will be skipped");
        }
    }

    cart.barrier()?;

    let mut clock = PhaseClock::start();
    if !config.skip {
        transform(grid, kind, config, fft, buffers, &mut clock)?;
    }
    debug!("rank {} phase stamps {:?}", cart.rank(), clock.stamps());

    let residual = if config.print {
        print_blocks(cart, buffers.primary(), domain, coords, out)?;
        None
    } else if config.skips_work() {
        if cart.is_root() {
            info!("skipping data checking because some steps have been skipped");
        }
        None
    } else {
        let residue = residual(cart, buffers.primary(), domain, coords)?;
        if cart.is_root() {
            info!("Residue = {}", format_g(residue));
        }
        if residue.is_nan() || residue > TOLERANCE {
            return Err(BenchError::Verification {
                residual: residue,
                tolerance: TOLERANCE,
            });
        }
        Some(residue)
    };

    let report = RunReport {
        procs: cart.size(),
        extent: config.extent,
        decomposition: kind.name(),
        fft_mode: if config.use_2d { "2DFFT" } else { "1DFFT" },
        backend: backend.name(),
        grid: dims,
        reorg_seconds: clock.reorg_seconds(),
        fft_seconds: clock.fft_seconds(),
        total_seconds: clock.total_seconds(),
        residual,
    };

    if cart.is_root() {
        writeln!(out, "{}", report.result_line())?;
        if config.json {
            serde_json::to_writer(&mut *out, &report).map_err(|err| BenchError::Output {
                detail: err.to_string(),
            })?;
            writeln!(out)?;
        }
        out.flush()?;
    }
    Ok(report)
}

/// The timed section: FFTs and transposes in the order the decomposition
/// needs them.
fn transform<C: Communicator>(
    grid: &ProcessGrid<C>,
    kind: DecompositionKind,
    config: &RunConfig,
    fft: &mut dyn FftPlan,
    buffers: &mut DoubleBuffer,
    clock: &mut PhaseClock,
) -> Result<(), BenchError> {
    let domain = grid.domain();
    let run_fft = !config.skip_fft;

    match kind {
        DecompositionKind::Auto => {
            if run_fft {
                let (primary, scratch) = buffers.split_mut();
                fft.run_automatic_3d(primary, scratch, grid.column_plan().comm())?;
            }
            clock.mark(5);
        }
        DecompositionKind::Slab => {
            if config.use_2d {
                if run_fft {
                    fft.run_2d(buffers.primary_mut())?;
                }
                clock.mark(1);
            } else {
                lines(fft, buffers, run_fft)?;
                clock.mark(1);
                local_transpose(buffers.primary_mut(), domain.extent(), domain.slab_count())?;
                clock.mark(2);
                lines(fft, buffers, run_fft)?;
                clock.mark(3);
            }
            distributed_transpose(grid.column_plan(), domain, buffers)?;
            clock.mark(4);
            lines(fft, buffers, run_fft)?;
            clock.mark(5);
        }
        DecompositionKind::Rod => {
            lines(fft, buffers, run_fft)?;
            clock.mark(1);
            distributed_transpose(grid.row_plan(), domain, buffers)?;
            clock.mark(2);
            lines(fft, buffers, run_fft)?;
            clock.mark(3);
            distributed_transpose(grid.column_plan(), domain, buffers)?;
            clock.mark(4);
            lines(fft, buffers, run_fft)?;
            clock.mark(5);
        }
    }
    Ok(())
}

fn lines(
    fft: &mut dyn FftPlan,
    buffers: &mut DoubleBuffer,
    run_fft: bool,
) -> Result<(), BenchError> {
    if run_fft {
        fft.run_batch_1d(buffers.primary_mut())?;
    }
    Ok(())
}

/// Writes every rank's block in grid order, one rank at a time.
fn print_blocks<C: Communicator, W: Write>(
    cart: &C,
    data: &[Complex64],
    domain: Domain,
    coords: [usize; 2],
    out: &mut W,
) -> Result<(), BenchError> {
    for turn in 0..cart.size() {
        if turn == cart.rank() {
            out.write_all(render_block(data, domain, coords).as_bytes())?;
            out.flush()?;
        }
        cart.barrier()?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use dfft_backend::BackendKind;
    use dfft_comm::{CommError, Communicator, SelfComm, ThreadUniverse};

    use super::{PhaseClock, RunReport, run_rank};
    use crate::{BenchError, RunConfig};

    fn config(extent: usize, decomposition: u32) -> RunConfig {
        RunConfig {
            extent,
            decomposition,
            use_2d: decomposition == 3,
            ..RunConfig::default()
        }
    }

    #[test]
    fn skipped_phases_take_no_time() {
        let mut clock = PhaseClock::start();
        clock.mark(1);
        let t = clock.stamps();
        assert!(t[1..].iter().all(|&s| s == t[1]));
        assert_eq!(clock.reorg_seconds(), 0.0);
        assert_eq!(clock.fft_seconds(), clock.total_seconds());
    }

    #[test]
    fn result_line_layout() {
        let report = RunReport {
            procs: 4,
            extent: 8,
            decomposition: "rod",
            fft_mode: "1DFFT",
            backend: "rustfft",
            grid: [2, 2],
            reorg_seconds: 0.5,
            fft_seconds: 0.000_012_5,
            total_seconds: 1.0,
            residual: Some(0.0),
        };
        assert_eq!(
            report.result_line(),
            "fft-results:4,8,rod,1DFFT,rustfft,0.5,1.25e-05,1"
        );
    }

    #[test]
    fn single_rank_slab_verifies_and_reports() {
        let mut out = Vec::new();
        let report = run_rank(&SelfComm, &config(4, 1), &mut out).expect("run should succeed");
        let text = String::from_utf8(out).expect("utf8");
        assert!(text.starts_with("fft-results:1,4,slab,1DFFT,rustfft,"));
        assert_eq!(text.lines().count(), 1);
        assert!(report.residual.expect("checked") < 1e-10);
    }

    #[test]
    fn naive_backend_slab_2d_verifies() {
        let mut run = config(8, 3);
        run.backend = BackendKind::NaiveDft;
        let mut out = Vec::new();
        let report = run_rank(&SelfComm, &run, &mut out).expect("run should succeed");
        assert_eq!(report.fft_mode, "2DFFT");
        assert_eq!(report.backend, "naive-dft");
        assert!(report.residual.expect("checked") < 1e-10);
    }

    #[test]
    fn every_decomposition_verifies_on_four_ranks() {
        for decomposition in [0, 1, 2, 3] {
            let universe = ThreadUniverse::new(4).expect("universe");
            let run = config(8, decomposition);
            let reports = universe
                .run(|world| {
                    let mut out = Vec::new();
                    let report = run_rank(&world, &run, &mut out);
                    (report, out)
                })
                .expect("ranks should start");
            for (rank, (report, out)) in reports.into_iter().enumerate() {
                let report = report.expect("run should succeed");
                assert!(report.residual.expect("checked") < 1e-10);
                assert_eq!(out.is_empty(), rank != 0);
            }
        }
    }

    #[test]
    fn json_report_follows_the_result_line() {
        let mut run = config(4, 1);
        run.json = true;
        let mut out = Vec::new();
        run_rank(&SelfComm, &run, &mut out).expect("run should succeed");
        let text = String::from_utf8(out).expect("utf8");
        let json = text.lines().nth(1).expect("json line");
        let value: serde_json::Value = serde_json::from_str(json).expect("valid json");
        assert_eq!(value["decomposition"], "slab");
        assert_eq!(value["grid"], serde_json::json!([1, 1]));
    }

    #[test]
    fn skipping_leaves_data_unchecked() {
        let mut run = config(4, 2);
        run.skip = true;
        let universe = ThreadUniverse::new(4).expect("universe");
        let reports = universe
            .run(|world| run_rank(&world, &run, &mut std::io::sink()))
            .expect("ranks should start");
        for report in reports {
            let report = report.expect("run should succeed");
            assert_eq!(report.residual, None);
            assert_eq!(report.total_seconds, 0.0);
        }
    }

    #[test]
    fn configuration_errors_are_reported_without_abort() {
        let universe = ThreadUniverse::new(2).expect("universe");
        let reports = universe
            .run(|world| run_rank(&world, &config(4, 2), &mut std::io::sink()))
            .expect("ranks should start");
        for report in reports {
            let err = report.expect_err("no rod grid for two ranks");
            assert_eq!(err.exit_code(), 6);
        }
    }

    #[test]
    fn unverifiable_extent_fails_with_exit_three() {
        let err = run_rank(&SelfComm, &config(2, 1), &mut std::io::sink())
            .expect_err("peaks overlap at extent 2");
        assert!(matches!(err, BenchError::Verification { .. }));
        assert_eq!(err.exit_code(), 3);
    }

    #[test]
    fn local_failure_aborts_every_peer() {
        struct Broken;
        impl std::io::Write for Broken {
            fn write(&mut self, _: &[u8]) -> std::io::Result<usize> {
                Err(std::io::Error::other("closed"))
            }
            fn flush(&mut self) -> std::io::Result<()> {
                Ok(())
            }
        }

        let universe = ThreadUniverse::new(2).expect("universe");
        let mut run = config(4, 1);
        run.print = true;
        let reports = universe
            .run(|world| {
                if world.rank() == 0 {
                    run_rank(&world, &run, &mut Broken)
                } else {
                    run_rank(&world, &run, &mut std::io::sink())
                }
            })
            .expect("ranks should start");
        assert!(matches!(reports[0], Err(BenchError::Output { .. })));
        assert_eq!(
            reports[1],
            Err(BenchError::Comm(CommError::Aborted { code: 1 }))
        );
    }
}
