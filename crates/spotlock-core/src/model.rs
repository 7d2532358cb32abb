//! Correlation of a reference ROI against a translated 2D Gaussian.
//!
//! The model evaluates the un-normalized correlation score
//! `sum(image * kernel(offset))` and its first and second partial
//! derivatives with respect to the offset, all in closed form. The
//! Newton-CG maximizer calls score, jacobian, and Hessian at the same
//! offset within one iteration, so every quantity is memoized against the
//! last rendered offset; a fresh offset invalidates everything at once.

use ndarray::{Array2, Zip};

use crate::consts::OFFSET_STALE_TOLERANCE;
use crate::kernel::GaussianKernel;
use crate::optimize::{FitResult, FitStatus, NewtonCg, Objective};
use crate::types::Offset;

/// Rendered kernel plus memoized evaluations, keyed on `last_offset`.
/// `last_offset == None` marks everything stale (fresh image, no render yet).
#[derive(Clone, Debug)]
struct RenderCache {
    last_offset: Option<Offset>,
    rendered: Array2<f64>,
    score: Option<f64>,
    d_dx: Option<f64>,
    d_dy: Option<f64>,
    d2_dx2: Option<f64>,
    d2_dy2: Option<f64>,
}

impl RenderCache {
    fn empty(size: (usize, usize)) -> Self {
        Self {
            last_offset: None,
            rendered: Array2::zeros(size),
            score: None,
            d_dx: None,
            d_dy: None,
            d2_dx2: None,
            d2_dy2: None,
        }
    }
}

/// Correlation model between a fixed reference ROI and a unit-height
/// Gaussian displaced from the ROI center by a sub-pixel offset.
///
/// One instance serves one spot pipeline; it holds mutable cache state and
/// must not be shared across threads without external locking.
#[derive(Clone, Debug)]
pub struct GaussianCorrelationModel {
    kernel: GaussianKernel,
    image: Array2<f64>,
    cache: RenderCache,
    renders: u64,
}

impl GaussianCorrelationModel {
    /// Create a model for ROIs of the given `(size_x, size_y)` shape.
    ///
    /// # Panics
    ///
    /// Panics if `sigma` is not positive or either dimension is zero.
    pub fn new(size: (usize, usize), sigma: f64) -> Self {
        Self {
            kernel: GaussianKernel::new(size, sigma),
            image: Array2::zeros(size),
            cache: RenderCache::empty(size),
            renders: 0,
        }
    }

    pub fn size(&self) -> (usize, usize) {
        self.kernel.size()
    }

    pub fn sigma(&self) -> f64 {
        self.kernel.sigma()
    }

    /// Number of kernel re-renders performed so far. Repeated evaluation at
    /// one offset must not increase this.
    pub fn render_count(&self) -> u64 {
        self.renders
    }

    /// Replace the reference image. Invalidates all cached state.
    ///
    /// # Panics
    ///
    /// Panics if the image shape does not match the configured ROI size;
    /// a mismatch is a programming error in the calling pipeline, never a
    /// transient condition.
    pub fn set_image(&mut self, image: Array2<f64>) {
        assert_eq!(
            image.dim(),
            self.kernel.size(),
            "reference image shape does not match the configured ROI size"
        );
        self.image = image;
        self.cache.last_offset = None;
    }

    /// Correlation score `sum(image * gaussian(offset))`.
    pub fn score(&mut self, offset: Offset) -> f64 {
        self.ensure_rendered(offset);
        if let Some(f) = self.cache.score {
            return f;
        }
        let f = Zip::from(&self.image)
            .and(&self.cache.rendered)
            .fold(0.0, |acc, &im, &g| acc + im * g);
        self.cache.score = Some(f);
        f
    }

    /// First partial derivative of the score with respect to `offset.dx`.
    pub fn d_dx(&mut self, offset: Offset) -> f64 {
        self.ensure_rendered(offset);
        if let Some(v) = self.cache.d_dx {
            return v;
        }
        let gamma = self.kernel.gamma();
        let v = self.moment_x(offset, |u| -u * gamma);
        self.cache.d_dx = Some(v);
        v
    }

    /// First partial derivative of the score with respect to `offset.dy`.
    pub fn d_dy(&mut self, offset: Offset) -> f64 {
        self.ensure_rendered(offset);
        if let Some(v) = self.cache.d_dy {
            return v;
        }
        let gamma = self.kernel.gamma();
        let v = self.moment_y(offset, |u| -u * gamma);
        self.cache.d_dy = Some(v);
        v
    }

    /// Second partial derivative of the score with respect to `offset.dx`.
    pub fn d2_dx2(&mut self, offset: Offset) -> f64 {
        self.ensure_rendered(offset);
        if let Some(v) = self.cache.d2_dx2 {
            return v;
        }
        let gamma = self.kernel.gamma();
        let v = self.moment_x(offset, |u| {
            let t = u * gamma;
            t * t - gamma
        });
        self.cache.d2_dx2 = Some(v);
        v
    }

    /// Second partial derivative of the score with respect to `offset.dy`.
    pub fn d2_dy2(&mut self, offset: Offset) -> f64 {
        self.ensure_rendered(offset);
        if let Some(v) = self.cache.d2_dy2 {
            return v;
        }
        let gamma = self.kernel.gamma();
        let v = self.moment_y(offset, |u| {
            let t = u * gamma;
            t * t - gamma
        });
        self.cache.d2_dy2 = Some(v);
        v
    }

    /// Gradient of the score times `sign`.
    pub fn jacobian(&mut self, offset: Offset, sign: f64) -> [f64; 2] {
        [sign * self.d_dx(offset), sign * self.d_dy(offset)]
    }

    /// Hessian of the score times `sign`.
    ///
    /// The off-diagonal entry is `-sign * d_dx * d_dy`, a deliberate
    /// approximation of the mixed partial carried over from the lock
    /// calibration; the converged offsets are validated against it.
    pub fn hessian(&mut self, offset: Offset, sign: f64) -> [[f64; 2]; 2] {
        let dxdy = -sign * self.d_dx(offset) * self.d_dy(offset);
        [
            [sign * self.d2_dx2(offset), dxdy],
            [dxdy, sign * self.d2_dy2(offset)],
        ]
    }

    /// Render the kernel at `offset` without touching the cache.
    ///
    /// This is the synthesis helper the calibration harness uses to build
    /// known-offset test images.
    pub fn translate(&self, offset: Offset) -> Array2<f64> {
        self.kernel.render(offset)
    }

    /// Find the offset maximizing the score, starting from `initial`.
    ///
    /// Runs the solver on `-score` with sign-flipped jacobian and Hessian
    /// oracles. Check `FitResult::is_usable` before trusting the offset.
    pub fn maximize(&mut self, initial: Offset, solver: &NewtonCg) -> FitResult {
        let mut objective = NegatedCorrelation { model: self };
        let min = solver.minimize(&mut objective, initial);
        FitResult {
            offset: min.offset,
            success: min.status == FitStatus::Converged,
            score: -min.value,
            status: min.status,
        }
    }

    fn ensure_rendered(&mut self, offset: Offset) {
        let hit = self.cache.last_offset.is_some_and(|last| {
            (last.dx - offset.dx).abs() <= OFFSET_STALE_TOLERANCE
                && (last.dy - offset.dy).abs() <= OFFSET_STALE_TOLERANCE
        });
        if !hit {
            self.cache.rendered = self.kernel.render(offset);
            self.cache.last_offset = Some(offset);
            self.cache.score = None;
            self.cache.d_dx = None;
            self.cache.d_dy = None;
            self.cache.d2_dx2 = None;
            self.cache.d2_dy2 = None;
            self.renders += 1;
        }
    }

    /// Sum `image * kernel * weight(u)` where `u` is the displaced center
    /// minus the pixel's x coordinate (constant per row).
    fn moment_x<F: Fn(f64) -> f64>(&self, offset: Offset, weight: F) -> f64 {
        let center = self.kernel.center().0 + offset.dx;
        let mut sum = 0.0;
        for (i, (img_row, g_row)) in self
            .image
            .outer_iter()
            .zip(self.cache.rendered.outer_iter())
            .enumerate()
        {
            let w = weight(center - i as f64);
            let mut row_sum = 0.0;
            for (&im, &g) in img_row.iter().zip(g_row.iter()) {
                row_sum += im * g;
            }
            sum += w * row_sum;
        }
        sum
    }

    /// Sum `image * kernel * weight(u)` where `u` is the displaced center
    /// minus the pixel's y coordinate (constant per column).
    fn moment_y<F: Fn(f64) -> f64>(&self, offset: Offset, weight: F) -> f64 {
        let center = self.kernel.center().1 + offset.dy;
        let weights: Vec<f64> = (0..self.kernel.size().1)
            .map(|j| weight(center - j as f64))
            .collect();

        let mut sum = 0.0;
        for (img_row, g_row) in self
            .image
            .outer_iter()
            .zip(self.cache.rendered.outer_iter())
        {
            for ((&im, &g), &w) in img_row.iter().zip(g_row.iter()).zip(weights.iter()) {
                sum += im * g * w;
            }
        }
        sum
    }
}

/// Sign-flipped view of the model: the solver minimizes `-score`.
struct NegatedCorrelation<'a> {
    model: &'a mut GaussianCorrelationModel,
}

impl Objective for NegatedCorrelation<'_> {
    fn value(&mut self, x: Offset) -> f64 {
        -self.model.score(x)
    }

    fn gradient(&mut self, x: Offset) -> [f64; 2] {
        self.model.jacobian(x, -1.0)
    }

    fn hessian_matrix(&mut self, x: Offset) -> [[f64; 2]; 2] {
        self.model.hessian(x, -1.0)
    }
}
