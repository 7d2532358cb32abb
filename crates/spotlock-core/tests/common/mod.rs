// Each integration test binary compiles this module separately and uses a
// different subset of it.
#![allow(dead_code)]

use ndarray::{s, Array2};

use spotlock_core::fitter::PeakLocator;
use spotlock_core::kernel::GaussianKernel;
use spotlock_core::types::{Offset, PeakCandidate};

/// Synthetic spot image: unit-height Gaussian displaced from the grid
/// center by `offset`, same convention as the model's kernel.
pub fn synthetic_spot(size: (usize, usize), sigma: f64, offset: Offset) -> Array2<f64> {
    GaussianKernel::new(size, sigma).render(offset)
}

/// Paint a Gaussian spot at absolute frame coordinates `(x0, y0)`.
///
/// Uses the pipeline's kernel convention, `exp(-d^2 / (2 * sigma^2))`.
pub fn paint_spot(frame: &mut Array2<f64>, x0: f64, y0: f64, sigma: f64, amplitude: f64) {
    let half_inv_sigma_sq = 0.5 / (sigma * sigma);
    for ((i, j), v) in frame.indexed_iter_mut() {
        let u = x0 - i as f64;
        let w = y0 - j as f64;
        *v += amplitude * (-(u * u + w * w) * half_inv_sigma_sq).exp();
    }
}

/// Brightest-pixel locator with a fixed crop half-width. Stands in for the
/// matched-filter maxima finder of the vision pipeline.
pub struct BrightestPixelLocator {
    pub roi_size: usize,
    pub threshold: f64,
}

impl PeakLocator for BrightestPixelLocator {
    fn locate(&mut self, image: &Array2<f64>) -> Option<PeakCandidate> {
        let (h, w) = image.dim();
        let mut best = (0, 0);
        let mut best_val = f64::NEG_INFINITY;
        for ((i, j), &v) in image.indexed_iter() {
            if v > best_val {
                best_val = v;
                best = (i, j);
            }
        }
        if best_val < self.threshold {
            return None;
        }

        let (x, y) = best;
        let rs = self.roi_size;
        if x < rs || x + rs > h || y < rs || y + rs > w {
            // Too close to the border for a full crop.
            return None;
        }

        Some(PeakCandidate {
            x,
            y,
            roi: image.slice(s![x - rs..x + rs, y - rs..y + rs]).to_owned(),
        })
    }
}
