//! Newton-Conjugate-Gradient (truncated Newton) minimization.
//!
//! Two-level iteration:
//! 1. **Outer**: Newton steps with an Armijo backtracking line search.
//! 2. **Inner**: a conjugate-gradient solve of the Newton system
//!    `H p = -g`, truncated by a superlinear forcing tolerance, with an
//!    escape to (scaled) steepest descent when negative curvature shows up.
//!
//! Reference: Nocedal & Wright, "Numerical Optimization", ch. 7
//! (line search Newton-CG).
//!
//! The solver is deliberately specialized to two parameters; the Newton
//! system is a 2x2 and all vector algebra is written out directly.

use serde::{Deserialize, Serialize};

use crate::consts::{
    CG_CURVATURE_EPSILON, CG_ITERATIONS_PER_PARAM, DEFAULT_MAX_ITERATIONS, DEFAULT_XTOL,
    LINE_SEARCH_C1, LINE_SEARCH_MAX_BACKTRACKS, LINE_SEARCH_SHRINK,
};
use crate::types::Offset;

/// Value/gradient/Hessian oracle over a two-parameter offset.
///
/// Methods take `&mut self` so implementations can memoize per-offset
/// renders; the solver calls all three at the same point within one
/// iteration.
pub trait Objective {
    fn value(&mut self, x: Offset) -> f64;
    fn gradient(&mut self, x: Offset) -> [f64; 2];
    fn hessian_matrix(&mut self, x: Offset) -> [[f64; 2]; 2];
}

/// Terminal state of a minimization. Codes are stable and mirror the
/// classic Newton-CG numbering callers already check against.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum FitStatus {
    /// The parameter step dropped below `xtol`.
    Converged,
    /// Iteration budget exhausted before convergence.
    IterationLimit,
    /// Backtracking line search could not find a decrease. This is an
    /// acceptable outcome near a flat optimum, distinct from real failure.
    LineSearchFailed,
    /// A non-finite value, gradient, or Hessian entry was encountered.
    Degenerate,
}

impl FitStatus {
    /// Stable integer code (0 converged, 1 iteration limit, 2 line search,
    /// 3 degenerate).
    pub fn code(self) -> i32 {
        match self {
            FitStatus::Converged => 0,
            FitStatus::IterationLimit => 1,
            FitStatus::LineSearchFailed => 2,
            FitStatus::Degenerate => 3,
        }
    }
}

/// Result of one `maximize` call. Immutable once produced.
#[derive(Clone, Copy, Debug)]
pub struct FitResult {
    /// Converged offset (meaningful only if `is_usable`).
    pub offset: Offset,
    /// True on standard convergence.
    pub success: bool,
    /// Maximized correlation score at `offset`.
    pub score: f64,
    pub status: FitStatus,
}

impl FitResult {
    /// Whether the offset can be trusted: standard convergence, or the
    /// line-search early termination that classic Newton-CG reports as
    /// status 2.
    pub fn is_usable(&self) -> bool {
        self.success || self.status == FitStatus::LineSearchFailed
    }
}

/// Raw solver outcome, before the maximization sign flip.
#[derive(Clone, Copy, Debug)]
pub struct Minimization {
    pub offset: Offset,
    /// Objective value at `offset`.
    pub value: f64,
    pub status: FitStatus,
    /// Outer Newton iterations performed.
    pub iterations: usize,
}

/// Newton-CG solver configuration. Stateless between calls.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct NewtonCg {
    /// Convergence tolerance on the L1 norm of the parameter step.
    pub xtol: f64,
    /// Cap on outer Newton iterations.
    pub max_iterations: usize,
}

impl Default for NewtonCg {
    fn default() -> Self {
        Self {
            xtol: DEFAULT_XTOL,
            max_iterations: DEFAULT_MAX_ITERATIONS,
        }
    }
}

impl NewtonCg {
    /// Minimize the objective from `x0`.
    pub fn minimize(&self, objective: &mut dyn Objective, x0: Offset) -> Minimization {
        let mut x = x0;
        let mut status = FitStatus::IterationLimit;
        let mut iterations = 0;
        let cg_limit = 2 * CG_ITERATIONS_PER_PARAM;

        for k in 0..self.max_iterations {
            iterations = k + 1;

            let g = objective.gradient(x);
            let h = objective.hessian_matrix(x);
            if !is_finite_system(&g, &h) {
                status = FitStatus::Degenerate;
                break;
            }

            let grad_mag = (g[0] * g[0] + g[1] * g[1]).sqrt();
            // Superlinear forcing sequence: solve the Newton system only as
            // accurately as the current gradient warrants.
            let termcond = grad_mag.sqrt().min(0.5) * grad_mag;

            let p = conjugate_gradient(&h, &g, termcond, cg_limit);
            if p[0] == 0.0 && p[1] == 0.0 {
                // Gradient already inside the forcing tolerance.
                status = FitStatus::Converged;
                break;
            }

            let slope = g[0] * p[0] + g[1] * p[1];
            if slope >= 0.0 {
                status = FitStatus::Degenerate;
                break;
            }

            let f0 = objective.value(x);
            if !f0.is_finite() {
                status = FitStatus::Degenerate;
                break;
            }

            let Some((next, step)) = backtrack(objective, x, p, f0, slope) else {
                status = FitStatus::LineSearchFailed;
                break;
            };
            x = next;

            let update_l1 = step * (p[0].abs() + p[1].abs());
            if update_l1 < self.xtol {
                status = FitStatus::Converged;
                break;
            }
        }

        Minimization {
            offset: x,
            value: objective.value(x),
            status,
            iterations,
        }
    }
}

/// Truncated CG solve of `H p = -g`.
///
/// Negative curvature on the first inner iteration falls back to scaled
/// steepest descent; on later iterations the partial solution accumulated
/// so far is returned.
fn conjugate_gradient(h: &[[f64; 2]; 2], g: &[f64; 2], termcond: f64, limit: usize) -> [f64; 2] {
    let mut p = [0.0_f64; 2];
    let mut residual = *g;
    let mut direction = [-g[0], -g[1]];
    let mut rho = dot(&residual, &residual);

    for i in 0..limit {
        if residual[0].abs() + residual[1].abs() <= termcond {
            break;
        }

        let hd = matvec(h, &direction);
        let curvature = dot(&direction, &hd);
        if curvature.abs() <= CG_CURVATURE_EPSILON {
            break;
        }
        if curvature < 0.0 {
            if i == 0 {
                let scale = rho / (-curvature);
                p = [scale * direction[0], scale * direction[1]];
            }
            break;
        }

        let alpha = rho / curvature;
        p[0] += alpha * direction[0];
        p[1] += alpha * direction[1];
        residual[0] += alpha * hd[0];
        residual[1] += alpha * hd[1];

        let rho_next = dot(&residual, &residual);
        let beta = rho_next / rho;
        direction = [
            -residual[0] + beta * direction[0],
            -residual[1] + beta * direction[1],
        ];
        rho = rho_next;
    }

    p
}

/// Armijo backtracking along `p`. Returns the accepted point and step
/// length, or `None` if no sufficient decrease was found.
fn backtrack(
    objective: &mut dyn Objective,
    x: Offset,
    p: [f64; 2],
    f0: f64,
    slope: f64,
) -> Option<(Offset, f64)> {
    let mut step = 1.0;
    for _ in 0..LINE_SEARCH_MAX_BACKTRACKS {
        let trial = Offset::new(x.dx + step * p[0], x.dy + step * p[1]);
        let f_trial = objective.value(trial);
        if f_trial.is_finite() && f_trial <= f0 + LINE_SEARCH_C1 * step * slope {
            return Some((trial, step));
        }
        step *= LINE_SEARCH_SHRINK;
    }
    None
}

fn dot(a: &[f64; 2], b: &[f64; 2]) -> f64 {
    a[0] * b[0] + a[1] * b[1]
}

fn matvec(m: &[[f64; 2]; 2], v: &[f64; 2]) -> [f64; 2] {
    [
        m[0][0] * v[0] + m[0][1] * v[1],
        m[1][0] * v[0] + m[1][1] * v[1],
    ]
}

fn is_finite_system(g: &[f64; 2], h: &[[f64; 2]; 2]) -> bool {
    g.iter().all(|v| v.is_finite()) && h.iter().flatten().all(|v| v.is_finite())
}
