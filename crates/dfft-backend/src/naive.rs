//! O(n²) reference DFT.

use std::f64::consts::PI;

use dfft_transpose::Complex64;

use crate::plan::{LineKernel, LinePlan};
use crate::{BackendKind, FftBackend, FftError, FftPlan, PlanLayout};

#[derive(Debug, Default)]
pub struct NaiveDftBackend;

impl FftBackend for NaiveDftBackend {
    fn kind(&self) -> BackendKind {
        BackendKind::NaiveDft
    }

    fn name(&self) -> &'static str {
        "naive-dft"
    }

    fn supports_automatic_3d(&self) -> bool {
        false
    }

    fn prepare(&self, layout: PlanLayout) -> Result<Box<dyn FftPlan>, FftError> {
        let kernel = NaiveKernel::new(layout.domain.extent());
        Ok(Box::new(LinePlan::new(layout, self.name(), false, kernel)?))
    }
}

struct NaiveKernel {
    twiddles: Vec<Complex64>,
    line: Vec<Complex64>,
}

impl NaiveKernel {
    fn new(n: usize) -> Self {
        let twiddles = (0..n)
            .map(|t| Complex64::from_polar(1.0, -2.0 * PI * (t as f64) / (n as f64)))
            .collect();
        Self {
            twiddles,
            line: vec![Complex64::new(0.0, 0.0); n],
        }
    }
}

impl LineKernel for NaiveKernel {
    fn forward_lines(&mut self, data: &mut [Complex64]) {
        let n = self.twiddles.len();
        if n == 0 {
            return;
        }
        for line in data.chunks_exact_mut(n) {
            for (k, out) in self.line.iter_mut().enumerate() {
                // Twiddle exponents wrap mod n.
                *out = line
                    .iter()
                    .enumerate()
                    .map(|(t, &value)| value * self.twiddles[(k * t) % n])
                    .sum();
            }
            line.copy_from_slice(&self.line);
        }
    }
}
