//! Backend on top of the `rustfft` planner.

use std::sync::Arc;

use dfft_transpose::Complex64;
use rustfft::{Fft, FftDirection, FftPlanner};

use crate::plan::{LineKernel, LinePlan};
use crate::{BackendKind, FftBackend, FftError, FftPlan, PlanLayout};

#[derive(Debug, Default)]
pub struct RustFftBackend;

impl FftBackend for RustFftBackend {
    fn kind(&self) -> BackendKind {
        BackendKind::RustFft
    }

    fn name(&self) -> &'static str {
        "rustfft"
    }

    fn supports_automatic_3d(&self) -> bool {
        true
    }

    fn prepare(&self, layout: PlanLayout) -> Result<Box<dyn FftPlan>, FftError> {
        let mut planner = FftPlanner::new();
        let fft = planner.plan_fft(layout.domain.extent(), FftDirection::Forward);
        let scratch = vec![Complex64::new(0.0, 0.0); fft.get_inplace_scratch_len()];
        let kernel = RustFftKernel { fft, scratch };
        Ok(Box::new(LinePlan::new(layout, self.name(), true, kernel)?))
    }
}

struct RustFftKernel {
    fft: Arc<dyn Fft<f64>>,
    scratch: Vec<Complex64>,
}

impl LineKernel for RustFftKernel {
    fn forward_lines(&mut self, data: &mut [Complex64]) {
        // rustfft walks a buffer holding several lines back to back.
        self.fft.process_with_scratch(data, &mut self.scratch);
    }
}

#[cfg(test)]
mod tests {
    use dfft_comm::SelfComm;
    use dfft_transpose::{Complex64, Domain};

    use super::RustFftBackend;
    use crate::{FftBackend, FftError, NaiveDftBackend, PlanLayout};

    fn ramp(len: usize) -> Vec<Complex64> {
        (0..len)
            .map(|i| Complex64::new((i as f64 * 0.37).sin(), (i as f64 * 0.11).cos()))
            .collect()
    }

    fn max_diff(a: &[Complex64], b: &[Complex64]) -> f64 {
        a.iter().zip(b).map(|(x, y)| (x - y).norm()).fold(0.0, f64::max)
    }

    #[test]
    fn agrees_with_naive_dft_on_batches() {
        for extent in [1, 2, 3, 5, 8, 12] {
            let layout = PlanLayout {
                domain: Domain::new(extent, 1, extent).expect("domain"),
                use_2d: true,
                automatic: false,
            };
            let mut fast = RustFftBackend.prepare(layout).expect("rustfft plan");
            let mut naive = NaiveDftBackend.prepare(layout).expect("naive plan");
            let mut a = ramp(layout.domain.len());
            let mut b = a.clone();
            fast.run_batch_1d(&mut a).expect("rustfft batch");
            naive.run_batch_1d(&mut b).expect("naive batch");
            assert!(max_diff(&a, &b) < 1e-9, "1-D extent {extent}");

            fast.run_2d(&mut a).expect("rustfft 2d");
            naive.run_2d(&mut b).expect("naive 2d");
            assert!(max_diff(&a, &b) < 1e-8, "2-D extent {extent}");
        }
    }

    #[test]
    fn two_d_transform_matches_direct_sum() {
        let extent = 4;
        let layout = PlanLayout {
            domain: Domain::new(extent, 2, extent).expect("domain"),
            use_2d: true,
            automatic: false,
        };
        let input = ramp(layout.domain.len());
        let mut data = input.clone();
        let mut plan = RustFftBackend.prepare(layout).expect("plan");
        plan.run_2d(&mut data).expect("2d");

        let n = extent as f64;
        for slab in 0..2 {
            for k1 in 0..extent {
                for k2 in 0..extent {
                    let mut acc = Complex64::new(0.0, 0.0);
                    for j in 0..extent {
                        for k in 0..extent {
                            let phase = -2.0 * std::f64::consts::PI * ((k1 * j + k2 * k) as f64) / n;
                            acc += input[slab * 16 + j * extent + k] * Complex64::from_polar(1.0, phase);
                        }
                    }
                    let got = data[slab * 16 + k1 * extent + k2];
                    assert!((got - acc).norm() < 1e-10, "slab {slab} ({k1},{k2})");
                }
            }
        }
    }

    #[test]
    fn run_2d_requires_a_2d_plan() {
        let layout = PlanLayout {
            domain: Domain::new(2, 2, 2).expect("domain"),
            use_2d: false,
            automatic: false,
        };
        let mut plan = RustFftBackend.prepare(layout).expect("plan");
        let mut data = vec![Complex64::new(0.0, 0.0); 8];
        assert!(matches!(
            plan.run_2d(&mut data),
            Err(FftError::InvalidLayout { .. })
        ));
    }

    #[test]
    fn slab_layouts_need_full_planes() {
        let layout = PlanLayout {
            domain: Domain::new(2, 4, 4).expect("domain"),
            use_2d: true,
            automatic: false,
        };
        assert!(matches!(
            RustFftBackend.prepare(layout).err(),
            Some(FftError::InvalidLayout { .. })
        ));
    }

    #[test]
    fn automatic_transform_on_one_rank_puts_the_peak_in_place() {
        let extent = 4;
        let layout = PlanLayout {
            domain: Domain::new(extent, extent, extent).expect("domain"),
            use_2d: false,
            automatic: true,
        };
        let mut data = vec![Complex64::new(1.0, 0.0); layout.domain.len()];
        let mut scratch = vec![Complex64::new(0.0, 0.0); layout.domain.len()];
        let mut plan = RustFftBackend.prepare(layout).expect("plan");
        plan.run_automatic_3d(&mut data, &mut scratch, &SelfComm)
            .expect("automatic transform");
        // A constant cube transforms to a single DC spike of E^3.
        assert!((data[0] - Complex64::new(64.0, 0.0)).norm() < 1e-9);
        assert!(data[1..].iter().all(|z| z.norm() < 1e-9));
        plan.teardown();
    }
}
