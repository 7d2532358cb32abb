/// Minimum pixel count (h*w) to use row-level Rayon parallelism when
/// rendering the Gaussian kernel. Lock ROIs are usually far smaller.
pub const PARALLEL_PIXEL_THRESHOLD: usize = 65_536;

/// Per-component tolerance for treating two offsets as the same cache key.
/// The optimizer re-evaluates score, jacobian, and Hessian at identical
/// offsets within one iteration; anything differing by more than this
/// forces a kernel re-render.
pub const OFFSET_STALE_TOLERANCE: f64 = 1e-9;

/// Default convergence tolerance on the Newton step (L1 norm), matching the
/// calibration tolerance used by the lock acceptance tests.
pub const DEFAULT_XTOL: f64 = 1e-3;

/// Default cap on outer Newton iterations. Guarantees termination even on
/// pathological ROIs.
pub const DEFAULT_MAX_ITERATIONS: usize = 100;

/// Inner conjugate-gradient iterations allowed per free parameter.
pub const CG_ITERATIONS_PER_PARAM: usize = 20;

/// Curvature magnitudes at or below this are treated as zero in the inner
/// CG loop.
pub const CG_CURVATURE_EPSILON: f64 = 3.0 * f64::EPSILON;

/// Armijo sufficient-decrease constant for the backtracking line search.
pub const LINE_SEARCH_C1: f64 = 1e-4;

/// Step-length shrink factor per backtracking round.
pub const LINE_SEARCH_SHRINK: f64 = 0.5;

/// Maximum backtracking rounds before the line search reports failure.
pub const LINE_SEARCH_MAX_BACKTRACKS: usize = 40;

/// Default half-width of the square fitting ROI; the correlation model is
/// sized at twice this value per side.
pub const DEFAULT_ROI_SIZE: usize = 8;

/// Default Gaussian sigma (in pixels) for the lock spot.
pub const DEFAULT_LOCK_SIGMA: f64 = 1.5;
