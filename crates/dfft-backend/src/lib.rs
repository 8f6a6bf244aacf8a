#![forbid(unsafe_code)]

//! Numeric FFT backends behind one capability interface.
//!
//! A backend is stateless; [`FftBackend::prepare`] returns an owned
//! [`FftPlan`] sized for one rank's block, which the caller threads through
//! every transform call and finally hands back to [`FftPlan::teardown`].
//! All transforms are forward and unnormalised.

pub mod error;
pub mod fast;
pub mod naive;
mod plan;

use std::fmt::{Display, Formatter};
use std::str::FromStr;

use dfft_comm::Communicator;
use dfft_transpose::{Complex64, Domain};

pub use error::FftError;
pub use fast::RustFftBackend;
pub use naive::NaiveDftBackend;

/// Backends that can serve transform requests.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum BackendKind {
    NaiveDft,
    #[default]
    RustFft,
}

impl BackendKind {
    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            Self::NaiveDft => "naive",
            Self::RustFft => "rustfft",
        }
    }
}

impl Display for BackendKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for BackendKind {
    type Err = FftError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "naive" | "naive-dft" => Ok(Self::NaiveDft),
            "rustfft" => Ok(Self::RustFft),
            _ => Err(FftError::UnknownBackend {
                name: s.to_string(),
            }),
        }
    }
}

/// Shape a plan is prepared for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PlanLayout {
    pub domain: Domain,
    /// Slab blocks will be transformed with [`FftPlan::run_2d`].
    pub use_2d: bool,
    /// The whole cube will be transformed with [`FftPlan::run_automatic_3d`].
    pub automatic: bool,
}

pub trait FftBackend: Send + Sync {
    fn kind(&self) -> BackendKind;

    /// Library name reported in the result line.
    fn name(&self) -> &'static str;

    /// Whether [`FftPlan::run_automatic_3d`] is available.
    fn supports_automatic_3d(&self) -> bool;

    fn prepare(&self, layout: PlanLayout) -> Result<Box<dyn FftPlan>, FftError>;
}

/// Transform plan for one rank's block.
pub trait FftPlan: Send {
    fn layout(&self) -> PlanLayout;

    /// Forward 1-D transform of every contiguous run of `E` samples.
    fn run_batch_1d(&mut self, data: &mut [Complex64]) -> Result<(), FftError>;

    /// Forward 2-D transform of each `E x E` slab, in natural order.
    fn run_2d(&mut self, data: &mut [Complex64]) -> Result<(), FftError>;

    /// Forward 3-D transform of the whole distributed cube.
    ///
    /// Collective over `comm`, which must group every rank of the slab
    /// decomposition ordered by slab. On return each rank holds the spectrum
    /// in the same rotated layout a slab pipeline leaves behind.
    fn run_automatic_3d(
        &mut self,
        data: &mut [Complex64],
        scratch: &mut [Complex64],
        comm: &dyn Communicator,
    ) -> Result<(), FftError>;

    fn teardown(self: Box<Self>);
}

static NAIVE_BACKEND: NaiveDftBackend = NaiveDftBackend;
static RUSTFFT_BACKEND: RustFftBackend = RustFftBackend;

#[must_use]
pub fn resolve_backend(kind: BackendKind) -> &'static dyn FftBackend {
    match kind {
        BackendKind::NaiveDft => &NAIVE_BACKEND,
        BackendKind::RustFft => &RUSTFFT_BACKEND,
    }
}
