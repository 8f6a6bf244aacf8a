//! Command line surface and the validated run configuration.

use clap::{Parser, ValueEnum};
use dfft_backend::{BackendKind, FftBackend};
use dfft_transpose::DecompositionKind;

use crate::BenchError;

#[derive(Debug, Parser)]
#[command(
    name = "dfft-bench",
    version = env!("CARGO_PKG_VERSION"),
    about = "Distributed 3-D FFT benchmark",
    long_about = r#"
Transforms a multisine cube of extent^3 complex samples distributed over a
grid of ranks, timing the FFT and data reorganisation phases separately.

Decompositions:
  0  automatic (backend drives the whole distributed transform)
  1  slab: 1 x P grid, local transpose plus one distributed transpose
  2  rod:  i x P/i grid, two distributed transposes
  3  slab with 2D FFTs used on each slab

A single line `fft-results:<procs>,<extent>,<decomp>,<1DFFT|2DFFT>,<library>,
<reorg s>,<fft s>,<total s>` is written to stdout by rank 0.
"#,
    after_help = r#"
Environment Variables:
  DFFT_RANKS=<n>           Number of ranks run as threads (default: 1)
  DFFT_BACKEND=<name>      FFT library: naive or rustfft (default: rustfft)
  DFFT_LOG_LEVEL=<level>   error, warn, info, debug, trace (default: info)
"#
)]
pub struct Cli {
    /// Side of the global data cube
    #[arg(short = 'x', long = "extent", default_value_t = 4, value_parser = parse_positive)]
    pub extent: usize,

    /// Decomposition: 0 automatic, 1 slab, 2 rod, 3 slab with 2D FFTs
    #[arg(short = 'd', long = "decomposition", default_value_t = 1)]
    pub decomposition: u32,

    /// Print the FFT library in use and exit
    #[arg(short = 'l', long = "library")]
    pub library: bool,

    /// Skip all FFT and communication steps
    #[arg(short = 'n', long = "skip")]
    pub skip: bool,

    /// Skip all FFT steps
    #[arg(short = 'f', long = "skip-fft")]
    pub skip_fft: bool,

    /// Print the data instead of checking it
    #[arg(short = 'p', long = "print")]
    pub print: bool,

    /// Number of ranks, each run as a thread of this process
    #[arg(long, env = "DFFT_RANKS", default_value_t = 1, value_parser = parse_positive)]
    pub ranks: usize,

    /// FFT library
    #[arg(long, env = "DFFT_BACKEND", default_value = "rustfft")]
    pub backend: BackendKind,

    /// Set log level
    #[arg(long, value_enum, env = "DFFT_LOG_LEVEL", default_value = "info")]
    pub log_level: LogLevel,

    /// Also write the result as one JSON object
    #[arg(long)]
    pub json: bool,

    /// Run over MPI_COMM_WORLD instead of threads
    #[cfg(feature = "mpi")]
    #[arg(long)]
    pub mpi: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl LogLevel {
    #[must_use]
    pub fn filter(self) -> log::LevelFilter {
        match self {
            Self::Error => log::LevelFilter::Error,
            Self::Warn => log::LevelFilter::Warn,
            Self::Info => log::LevelFilter::Info,
            Self::Debug => log::LevelFilter::Debug,
            Self::Trace => log::LevelFilter::Trace,
        }
    }
}

fn parse_positive(s: &str) -> Result<usize, String> {
    match s.trim().parse::<usize>() {
        Ok(0) => Err(String::from("must be at least 1")),
        Ok(value) => Ok(value),
        Err(err) => Err(format!("`{s}` is not a positive integer: {err}")),
    }
}

/// Plain values the orchestrator runs with; identical on every rank.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunConfig {
    pub extent: usize,
    /// Raw `-d` value; checked by [`validate_parameters`].
    pub decomposition: u32,
    pub use_2d: bool,
    pub skip: bool,
    pub skip_fft: bool,
    pub print: bool,
    pub backend: BackendKind,
    pub json: bool,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            extent: 4,
            decomposition: 1,
            use_2d: false,
            skip: false,
            skip_fft: false,
            print: false,
            backend: BackendKind::default(),
            json: false,
        }
    }
}

impl From<&Cli> for RunConfig {
    fn from(cli: &Cli) -> Self {
        Self {
            extent: cli.extent,
            decomposition: cli.decomposition,
            use_2d: cli.decomposition == 3,
            skip: cli.skip,
            skip_fft: cli.skip_fft,
            print: cli.print,
            backend: cli.backend,
            json: cli.json,
        }
    }
}

impl RunConfig {
    /// Anything was skipped, so the result cannot be verified.
    #[must_use]
    pub fn skips_work(&self) -> bool {
        self.skip || self.skip_fft
    }
}

/// Checks the process count, decomposition and extent before any collective.
///
/// Pure arithmetic on values every rank shares, so each rank reaches the same
/// verdict independently.
pub fn validate_parameters(
    procs: usize,
    config: &RunConfig,
    backend: &dyn FftBackend,
) -> Result<DecompositionKind, BenchError> {
    if !procs.is_power_of_two() {
        return Err(BenchError::ProcessCount { procs });
    }
    let kind = match config.decomposition {
        0 => DecompositionKind::Auto,
        1 | 3 => DecompositionKind::Slab,
        2 => DecompositionKind::Rod,
        value => return Err(BenchError::UnknownDecomposition { value }),
    };
    let extent = config.extent;
    match kind {
        DecompositionKind::Auto if !backend.supports_automatic_3d() => {
            Err(BenchError::AutomaticUnsupported {
                backend: backend.name(),
            })
        }
        DecompositionKind::Slab if !extent.is_multiple_of(procs) => {
            Err(BenchError::SlabExtent { extent, procs })
        }
        DecompositionKind::Rod if !extent.is_multiple_of(2) => {
            Err(BenchError::RodExtent { extent })
        }
        _ => Ok(kind),
    }
}

#[cfg(test)]
mod tests {
    use clap::Parser;
    use dfft_backend::{BackendKind, resolve_backend};
    use dfft_transpose::DecompositionKind;

    use super::{Cli, LogLevel, RunConfig, validate_parameters};
    use crate::BenchError;

    fn parse(args: &[&str]) -> Result<Cli, clap::Error> {
        Cli::try_parse_from(std::iter::once("dfft-bench").chain(args.iter().copied()))
    }

    #[test]
    fn defaults_match_the_classic_benchmark() {
        let cli = parse(&[]).expect("no arguments");
        let config = RunConfig::from(&cli);
        assert_eq!(config.extent, 4);
        assert_eq!(config.decomposition, 1);
        assert!(!config.use_2d);
        assert_eq!(cli.log_level, LogLevel::Info);
    }

    #[test]
    fn short_flags_are_accepted() {
        let cli = parse(&["-x", "16", "-d3", "-f", "-p", "--ranks", "4", "--backend", "naive"])
            .expect("valid flags");
        let config = RunConfig::from(&cli);
        assert_eq!(config.extent, 16);
        assert!(config.use_2d && config.skip_fft && config.print);
        assert_eq!(config.backend, BackendKind::NaiveDft);
        assert_eq!(cli.ranks, 4);
    }

    #[test]
    fn zero_extent_and_garbage_fail_to_parse() {
        assert!(parse(&["-x", "0"]).is_err());
        assert!(parse(&["-x", "four"]).is_err());
        assert!(parse(&["--backend", "fftw"]).is_err());
        assert!(parse(&["-q"]).is_err());
    }

    #[test]
    fn validation_follows_the_decomposition_rules() {
        let rustfft = resolve_backend(BackendKind::RustFft);
        let naive = resolve_backend(BackendKind::NaiveDft);
        let with = |extent, decomposition| RunConfig {
            extent,
            decomposition,
            ..RunConfig::default()
        };

        assert_eq!(
            validate_parameters(3, &with(6, 1), rustfft),
            Err(BenchError::ProcessCount { procs: 3 })
        );
        assert_eq!(
            validate_parameters(4, &with(8, 2), rustfft),
            Ok(DecompositionKind::Rod)
        );
        assert_eq!(
            validate_parameters(4, &with(7, 2), rustfft),
            Err(BenchError::RodExtent { extent: 7 })
        );
        assert_eq!(
            validate_parameters(4, &with(6, 1), rustfft),
            Err(BenchError::SlabExtent { extent: 6, procs: 4 })
        );
        assert_eq!(
            validate_parameters(2, &with(4, 3), rustfft),
            Ok(DecompositionKind::Slab)
        );
        assert_eq!(
            validate_parameters(1, &with(4, 0), naive),
            Err(BenchError::AutomaticUnsupported {
                backend: "naive-dft"
            })
        );
        assert_eq!(
            validate_parameters(1, &with(4, 9), rustfft),
            Err(BenchError::UnknownDecomposition { value: 9 })
        );
    }
}
