//! Focus-lock spot fitting pipeline.
//!
//! Glue between an external peak locator (matched-filter maxima finding,
//! owned by the vision pipeline) and the correlation model: background
//! removal, the fit itself, and the mapping of the fitted offset back into
//! the source frame's coordinates. A failed fit rejects the candidate; the
//! surrounding lock loop simply skips that correction cycle.

use ndarray::Array2;
use serde::{Deserialize, Serialize};
use tracing::{debug, trace};

use crate::consts::{DEFAULT_LOCK_SIGMA, DEFAULT_ROI_SIZE};
use crate::error::{Result, SpotLockError};
use crate::model::GaussianCorrelationModel;
use crate::optimize::NewtonCg;
use crate::types::{Offset, PeakCandidate, SpotLocation};

/// Finds candidate bright spots in a raw frame and crops a fixed-size ROI
/// around the brightest one. Implemented by the vision pipeline; out of
/// scope here beyond this seam.
pub trait PeakLocator {
    /// Locate the brightest candidate, or `None` if nothing clears the
    /// detection threshold.
    fn locate(&mut self, image: &Array2<f64>) -> Option<PeakCandidate>;
}

/// Configuration for the lock fitter.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct LockFitConfig {
    /// Half-width of the square fitting ROI; the correlation model is
    /// sized `2 * roi_size` per side.
    pub roi_size: usize,
    /// Gaussian sigma of the lock spot, in pixels.
    pub sigma: f64,
    #[serde(default)]
    pub solver: NewtonCg,
}

impl Default for LockFitConfig {
    fn default() -> Self {
        Self {
            roi_size: DEFAULT_ROI_SIZE,
            sigma: DEFAULT_LOCK_SIGMA,
            solver: NewtonCg::default(),
        }
    }
}

/// Refines a peak candidate to a sub-pixel spot location by correlation
/// against a 2D Gaussian.
///
/// Holds one correlation model; use one fitter per camera/spot pipeline.
#[derive(Clone, Debug)]
pub struct CorrLockFitter {
    model: GaussianCorrelationModel,
    solver: NewtonCg,
}

impl CorrLockFitter {
    /// # Panics
    ///
    /// Panics if `roi_size` is zero or `sigma` is not positive.
    pub fn new(config: &LockFitConfig) -> Self {
        let side = 2 * config.roi_size;
        Self {
            model: GaussianCorrelationModel::new((side, side), config.sigma),
            solver: config.solver.clone(),
        }
    }

    /// The underlying correlation model (cache diagnostics, `translate`).
    pub fn model(&self) -> &GaussianCorrelationModel {
        &self.model
    }

    /// Locate the brightest peak in `image` and refine it.
    pub fn fit_peak(
        &mut self,
        locator: &mut dyn PeakLocator,
        image: &Array2<f64>,
    ) -> Result<SpotLocation> {
        let candidate = locator.locate(image).ok_or(SpotLockError::NoPeakFound)?;
        self.fit_candidate(&candidate)
    }

    /// Refine a located candidate to sub-pixel precision.
    ///
    /// The per-ROI minimum is subtracted before fitting (background
    /// removal), and the fitted offset is mapped back into the source
    /// frame with the pipeline's half-pixel center convention.
    ///
    /// # Panics
    ///
    /// Panics if the candidate's ROI shape does not match the configured
    /// model size.
    pub fn fit_candidate(&mut self, candidate: &PeakCandidate) -> Result<SpotLocation> {
        let mut roi = candidate.roi.clone();
        let floor = roi.iter().copied().fold(f64::INFINITY, f64::min);
        if floor.is_finite() && floor != 0.0 {
            roi.mapv_inplace(|v| v - floor);
        }

        self.model.set_image(roi);
        let fit = self.model.maximize(Offset::default(), &self.solver);

        if fit.is_usable() {
            let spot = SpotLocation {
                x: candidate.x as f64 + fit.offset.dx - 0.5,
                y: candidate.y as f64 + fit.offset.dy - 0.5,
                score: fit.score,
            };
            trace!(
                x = spot.x,
                y = spot.y,
                score = spot.score,
                status = fit.status.code(),
                "spot fit accepted"
            );
            Ok(spot)
        } else {
            debug!(
                status = fit.status.code(),
                score = fit.score,
                dx = fit.offset.dx,
                dy = fit.offset.dy,
                "spot fit rejected"
            );
            Err(SpotLockError::ConvergenceFailure {
                status: fit.status.code(),
            })
        }
    }
}
