#![forbid(unsafe_code)]

//! Benchmark driver for the distributed 3-D FFT.
//!
//! Every rank runs [`run_rank`] over its own communicator handle. Ranks fill
//! their block of a multisine cube, transform it with the chosen
//! decomposition, and check the spectrum against its two analytic peaks.
//! Rank 0 reports the timings as a single `fft-results:` line.
//!
//! ## Module layout
//!
//! | Module   | Contents                                             |
//! |----------|------------------------------------------------------|
//! | `config` | [`Cli`], [`RunConfig`], [`validate_parameters`]      |
//! | `field`  | input fields, reference spectrum, [`residual`]       |
//! | `run`    | [`run_rank`], [`RunReport`], [`PhaseClock`]          |
//! | `format` | [`format_g`], printf `%g` rendering                  |
//! | `error`  | [`BenchError`] and its exit codes                    |

pub mod config;
pub mod error;
pub mod field;
pub mod format;
pub mod run;

pub use config::{Cli, LogLevel, RunConfig, validate_parameters};
pub use error::BenchError;
pub use field::{
    TOLERANCE, fill_counting, fill_multisine, reference_value, render_block, residual,
};
pub use format::format_g;
pub use run::{PhaseClock, RunReport, run_rank};
