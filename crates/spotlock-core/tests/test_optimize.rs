use spotlock_core::optimize::{FitResult, FitStatus, NewtonCg, Objective};
use spotlock_core::types::Offset;

/// Axis-aligned quadratic bowl with minimum at `(a, b)`.
struct Quadratic {
    a: f64,
    b: f64,
}

impl Objective for Quadratic {
    fn value(&mut self, x: Offset) -> f64 {
        let u = x.dx - self.a;
        let v = x.dy - self.b;
        u * u + 10.0 * v * v
    }

    fn gradient(&mut self, x: Offset) -> [f64; 2] {
        [2.0 * (x.dx - self.a), 20.0 * (x.dy - self.b)]
    }

    fn hessian_matrix(&mut self, _x: Offset) -> [[f64; 2]; 2] {
        [[2.0, 0.0], [0.0, 20.0]]
    }
}

/// The classic banana-valley function, minimum at (1, 1).
struct Rosenbrock;

impl Objective for Rosenbrock {
    fn value(&mut self, p: Offset) -> f64 {
        let (x, y) = (p.dx, p.dy);
        (1.0 - x) * (1.0 - x) + 100.0 * (y - x * x) * (y - x * x)
    }

    fn gradient(&mut self, p: Offset) -> [f64; 2] {
        let (x, y) = (p.dx, p.dy);
        [
            -2.0 * (1.0 - x) - 400.0 * x * (y - x * x),
            200.0 * (y - x * x),
        ]
    }

    fn hessian_matrix(&mut self, p: Offset) -> [[f64; 2]; 2] {
        let (x, y) = (p.dx, p.dy);
        [
            [2.0 - 400.0 * (y - x * x) + 800.0 * x * x, -400.0 * x],
            [-400.0 * x, 200.0],
        ]
    }
}

#[test]
fn test_quadratic_bowl_converges() {
    let solver = NewtonCg {
        xtol: 1e-6,
        max_iterations: 100,
    };
    let min = solver.minimize(&mut Quadratic { a: 1.5, b: -2.0 }, Offset::new(5.0, 5.0));

    assert_eq!(min.status, FitStatus::Converged);
    assert!(
        (min.offset.dx - 1.5).abs() < 1e-4 && (min.offset.dy + 2.0).abs() < 1e-4,
        "converged to {:?}",
        min.offset
    );
    assert!(min.value < 1e-6);
    assert!(min.iterations < 100);
}

#[test]
fn test_starting_at_the_minimum_converges_immediately() {
    let solver = NewtonCg::default();
    let min = solver.minimize(&mut Quadratic { a: 0.0, b: 0.0 }, Offset::default());

    assert_eq!(min.status, FitStatus::Converged);
    assert_eq!(min.iterations, 1);
    assert_eq!(min.offset, Offset::default());
}

#[test]
fn test_rosenbrock_converges() {
    let solver = NewtonCg {
        xtol: 1e-6,
        max_iterations: 200,
    };
    let min = solver.minimize(&mut Rosenbrock, Offset::new(-1.2, 1.0));

    assert_eq!(min.status, FitStatus::Converged, "got {:?}", min);
    assert!(
        (min.offset.dx - 1.0).abs() < 1e-3 && (min.offset.dy - 1.0).abs() < 1e-3,
        "converged to {:?}",
        min.offset
    );
    assert!(min.value < 1e-8);
}

#[test]
fn test_iteration_budget_is_honored() {
    let solver = NewtonCg {
        xtol: 1e-12,
        max_iterations: 1,
    };
    let min = solver.minimize(&mut Quadratic { a: 100.0, b: 100.0 }, Offset::default());

    assert_eq!(min.status, FitStatus::IterationLimit);
    assert_eq!(min.iterations, 1);
}

#[test]
fn test_status_codes_are_stable() {
    assert_eq!(FitStatus::Converged.code(), 0);
    assert_eq!(FitStatus::IterationLimit.code(), 1);
    assert_eq!(FitStatus::LineSearchFailed.code(), 2);
    assert_eq!(FitStatus::Degenerate.code(), 3);
}

#[test]
fn test_line_search_stall_counts_as_usable() {
    let result = FitResult {
        offset: Offset::default(),
        success: false,
        score: 0.0,
        status: FitStatus::LineSearchFailed,
    };
    assert!(result.is_usable());

    let limit = FitResult {
        status: FitStatus::IterationLimit,
        ..result
    };
    assert!(!limit.is_usable());

    let degenerate = FitResult {
        status: FitStatus::Degenerate,
        ..result
    };
    assert!(!degenerate.is_usable());
}
