#![forbid(unsafe_code)]

use std::io::{self, Write};
use std::process::ExitCode;

use clap::Parser;
use dfft_backend::resolve_backend;
use dfft_bench::{BenchError, Cli, LogLevel, RunConfig, RunReport, run_rank};
use dfft_comm::ThreadUniverse;
use env_logger::Env;

fn main() -> ExitCode {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(err) => {
            // Help and version go to stdout and are not failures.
            let code = u8::from(err.use_stderr());
            let _ = err.print();
            return ExitCode::from(code);
        }
    };

    init_logging(cli.log_level);
    let config = RunConfig::from(&cli);

    if cli.library {
        eprintln!(
            "This executable uses the {} library.",
            resolve_backend(config.backend).name()
        );
        return ExitCode::SUCCESS;
    }

    #[cfg(feature = "mpi")]
    let outcome = if cli.mpi {
        run_mpi(cli.ranks, &config)
    } else {
        run_threads(cli.ranks, &config)
    };
    #[cfg(not(feature = "mpi"))]
    let outcome = run_threads(cli.ranks, &config);

    match outcome {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("dfft-bench: {err}");
            ExitCode::from(u8::try_from(err.exit_code()).unwrap_or(1))
        }
    }
}

fn init_logging(level: LogLevel) {
    env_logger::Builder::from_env(Env::default().default_filter_or("info"))
        .filter_level(level.filter())
        .format(format_log_record)
        .init();
}

fn format_log_record(
    buf: &mut env_logger::fmt::Formatter,
    record: &log::Record,
) -> io::Result<()> {
    let timestamp = buf.timestamp_micros();
    let thread = std::thread::current();
    writeln!(
        buf,
        "[{} {:>5} {} {}] {}",
        timestamp,
        record.level(),
        thread.name().unwrap_or("main"),
        record.target(),
        record.args()
    )
}

fn run_threads(ranks: usize, config: &RunConfig) -> Result<(), BenchError> {
    let universe = ThreadUniverse::new(ranks)?;
    let outcomes = universe.run(|world| run_rank(&world, config, &mut io::stdout()))?;
    first_failure(outcomes)
}

#[cfg(feature = "mpi")]
fn run_mpi(ranks: usize, config: &RunConfig) -> Result<(), BenchError> {
    use dfft_comm::{CommError, MpiComm};

    if ranks != 1 {
        log::warn!("--ranks is ignored under --mpi; the launcher decides the rank count");
    }
    let Some(universe) = mpi::initialize() else {
        return Err(BenchError::Comm(CommError::Transport {
            detail: String::from("MPI was already initialised"),
        }));
    };
    let world = MpiComm::world(&universe);
    run_rank(&world, config, &mut io::stdout().lock()).map(|_| ())
}

/// The error to exit with: the rank that caused a failure rather than the
/// peers that only received its abort.
fn first_failure(outcomes: Vec<Result<RunReport, BenchError>>) -> Result<(), BenchError> {
    let mut errors = outcomes
        .into_iter()
        .filter_map(Result::err)
        .collect::<Vec<_>>();
    if errors.is_empty() {
        return Ok(());
    }
    let cause = errors
        .iter()
        .position(|err| err.abort_code().is_none())
        .unwrap_or(0);
    Err(errors.swap_remove(cause))
}
