//! The plan shared by every backend: a batched line kernel plus the slab
//! bookkeeping that turns it into 2-D and distributed 3-D transforms.

use dfft_comm::Communicator;
use dfft_transpose::{Complex64, Direction, local_transpose, transpose_slices};
use log::debug;

use crate::{FftError, FftPlan, PlanLayout};

/// Forward transform of fixed-length lines.
pub(crate) trait LineKernel: Send {
    /// Transforms every consecutive run of `E` samples of `data` in place.
    fn forward_lines(&mut self, data: &mut [Complex64]);
}

pub(crate) struct LinePlan<K> {
    layout: PlanLayout,
    backend: &'static str,
    automatic_supported: bool,
    kernel: K,
}

impl<K: LineKernel> LinePlan<K> {
    pub(crate) fn new(
        layout: PlanLayout,
        backend: &'static str,
        automatic_supported: bool,
        kernel: K,
    ) -> Result<Self, FftError> {
        if layout.automatic && !automatic_supported {
            return Err(FftError::Unsupported {
                operation: "automatic 3-D transforms",
                backend,
            });
        }
        let domain = layout.domain;
        if (layout.use_2d || layout.automatic) && domain.d0() != domain.extent() {
            return Err(FftError::InvalidLayout {
                detail: format!(
                    "slab transforms need full planes, block is {}x{}x{}",
                    domain.d1(),
                    domain.d0(),
                    domain.extent()
                ),
            });
        }
        debug!(
            "{backend} plan prepared for {} lines of {} (2d: {}, automatic: {})",
            domain.d0() * domain.d1(),
            domain.extent(),
            layout.use_2d,
            layout.automatic
        );
        Ok(Self {
            layout,
            backend,
            automatic_supported,
            kernel,
        })
    }

    fn check_len(&self, data: &[Complex64]) -> Result<(), FftError> {
        let expected = self.layout.domain.len();
        if data.len() != expected {
            return Err(FftError::LengthMismatch {
                expected,
                actual: data.len(),
            });
        }
        Ok(())
    }

    /// Rows, then columns through a pair of square transposes.
    fn planes(&mut self, data: &mut [Complex64]) -> Result<(), FftError> {
        let domain = self.layout.domain;
        self.kernel.forward_lines(data);
        local_transpose(data, domain.extent(), domain.slab_count())?;
        self.kernel.forward_lines(data);
        Ok(())
    }
}

impl<K: LineKernel> FftPlan for LinePlan<K> {
    fn layout(&self) -> PlanLayout {
        self.layout
    }

    fn run_batch_1d(&mut self, data: &mut [Complex64]) -> Result<(), FftError> {
        self.check_len(data)?;
        self.kernel.forward_lines(data);
        Ok(())
    }

    fn run_2d(&mut self, data: &mut [Complex64]) -> Result<(), FftError> {
        if !self.layout.use_2d {
            return Err(FftError::InvalidLayout {
                detail: String::from("plan was not prepared for 2-D transforms"),
            });
        }
        self.check_len(data)?;
        self.planes(data)?;
        let domain = self.layout.domain;
        local_transpose(data, domain.extent(), domain.slab_count())?;
        Ok(())
    }

    fn run_automatic_3d(
        &mut self,
        data: &mut [Complex64],
        scratch: &mut [Complex64],
        comm: &dyn Communicator,
    ) -> Result<(), FftError> {
        if !self.automatic_supported {
            return Err(FftError::Unsupported {
                operation: "automatic 3-D transforms",
                backend: self.backend,
            });
        }
        if !self.layout.automatic {
            return Err(FftError::InvalidLayout {
                detail: String::from("plan was not prepared for automatic 3-D transforms"),
            });
        }
        self.check_len(data)?;
        self.check_len(scratch)?;
        self.planes(data)?;
        transpose_slices(comm, Direction::Column, self.layout.domain, data, scratch)?;
        self.kernel.forward_lines(data);
        Ok(())
    }

    fn teardown(self: Box<Self>) {
        debug!("{} plan torn down", self.backend);
    }
}
