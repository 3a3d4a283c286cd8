// The per pixel kernel: iterate a root finding method from a starting point
// until it lands on one of the known roots or gives up.
//
// Nothing in here allocates, it is called once per computed pixel.

use num::complex::Complex;

use crate::polynomial::Polynomial;
use crate::roots::RootSet;
use crate::MAX_ITERATIONS;

// Iterates larger than this are treated as escaping to infinity
const DIVERGENCE_BOUND : f64 = 1e12;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IterationMethod {
    Newton,
    // Newton on f/f', quadratic even at repeated roots
    Schroeder,
    // Schroeder's order 3 method of the first kind (Chebyshev's)
    Schroeder2,
    Halley,
    // Derivative free, f' replaced by a divided difference
    Steffensen,
    Householder3
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NonConvergenceReason {
    CriticalPoint,
    Diverged,
    IterationCap
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Convergence {
    // smooth is the iteration count at which the distance to the root
    // crossed the convergence epsilon, interpolated in log distance
    Converged { root : usize, iterations : u32, smooth : f64 },
    NonConvergent { reason : NonConvergenceReason, iterations : u32 }
}

impl IterationMethod {
    pub const ALL : [IterationMethod; 6] = [
        IterationMethod::Newton,
        IterationMethod::Schroeder,
        IterationMethod::Schroeder2,
        IterationMethod::Halley,
        IterationMethod::Steffensen,
        IterationMethod::Householder3
    ];

    pub fn from_name(name : &str) -> Option<IterationMethod> {
        IterationMethod::ALL.into_iter().find(|method| method.name() == name)
    }

    pub fn name(&self) -> &'static str {
        match self {
            IterationMethod::Newton => "newton",
            IterationMethod::Schroeder => "schroeder",
            IterationMethod::Schroeder2 => "schroeder2",
            IterationMethod::Halley => "halley",
            IterationMethod::Steffensen => "steffensen",
            IterationMethod::Householder3 => "householder3"
        }
    }

    // Next iterate, Err when f' or the update's denominator vanishes
    #[inline]
    pub fn step(&self, poly : &Polynomial, z : Complex<f64>) -> Result<Complex<f64>, NonConvergenceReason> {
        let d = poly.derivatives(z);
        let (_, slope_floor) = poly.noise_floors(z);
        if d.f1.norm() <= slope_floor {
            return Err(NonConvergenceReason::CriticalPoint);
        }
        let (numerator, denominator) = match self {
            IterationMethod::Newton => (d.f0, d.f1),
            IterationMethod::Schroeder => (d.f0 * d.f1, d.f1 * d.f1 - d.f0 * d.f2),
            IterationMethod::Schroeder2 => {
                let u = d.f0 / d.f1;
                (u * (2.0 * d.f1 * d.f1 + d.f0 * d.f2), 2.0 * d.f1 * d.f1)
            },
            IterationMethod::Halley => (2.0 * d.f0 * d.f1, 2.0 * d.f1 * d.f1 - d.f0 * d.f2),
            IterationMethod::Steffensen => {
                let shifted = poly.evaluate(z + d.f0);
                (d.f0 * d.f0, shifted - d.f0)
            },
            IterationMethod::Householder3 => (
                6.0 * d.f0 * d.f1 * d.f1 - 3.0 * d.f0 * d.f0 * d.f2,
                6.0 * d.f1 * d.f1 * d.f1 - 6.0 * d.f0 * d.f1 * d.f2 + d.f0 * d.f0 * d.f3
            )
        };
        if denominator.norm_sqr() == 0.0 {
            return Err(NonConvergenceReason::CriticalPoint);
        }
        let next = z - numerator / denominator;
        if !next.is_finite() || next.norm_sqr() > DIVERGENCE_BOUND * DIVERGENCE_BOUND {
            return Err(NonConvergenceReason::Diverged);
        }
        Ok(next)
    }
}

impl Convergence {
    pub fn root(&self) -> Option<usize> {
        match self {
            Convergence::Converged { root, .. } => Some(*root),
            Convergence::NonConvergent { .. } => None
        }
    }
}

// Fraction of the step from d_prev to d at which the distance crossed eps
#[inline]
fn crossing_fraction(d_prev : f64, d : f64, eps : f64) -> f64 {
    let (l_prev, l, l_eps) = (d_prev.ln(), d.ln(), eps.ln());
    let t = (l_prev - l_eps) / (l_prev - l);
    if t.is_nan() {
        1.0
    } else {
        t.clamp(0.0, 1.0)
    }
}

// An iterate that stopped where |f| is lost in rounding noise sits on a
// root, even if it never came within tolerance of the computed one
fn settle(
    poly : &Polynomial,
    roots : &RootSet,
    z : Complex<f64>,
    reason : NonConvergenceReason,
    iterations : u32
) -> Convergence {
    let (floor, _) = poly.noise_floors(z);
    match roots.nearest(z) {
        Some(root) if poly.evaluate(z).norm() <= floor => {
            Convergence::Converged { root, iterations, smooth : iterations as f64 }
        },
        _ => Convergence::NonConvergent { reason, iterations }
    }
}

pub fn iterate(
    poly : &Polynomial,
    roots : &RootSet,
    method : IterationMethod,
    start : Complex<f64>
) -> Convergence {
    let mut z = start;
    let mut previous = start;
    for n in 0..=MAX_ITERATIONS {
        if let Some(root) = roots.reached(z) {
            let smooth = if n == 0 {
                0.0
            } else {
                let target = roots.roots()[root];
                let t = crossing_fraction(
                    (previous - target).norm(),
                    (z - target).norm(),
                    roots.tolerance(root)
                );
                (n - 1) as f64 + t
            };
            return Convergence::Converged { root, iterations : n, smooth };
        }
        if n == MAX_ITERATIONS {
            break;
        }
        previous = z;
        z = match method.step(poly, z) {
            Ok(next) => next,
            Err(reason) => return settle(poly, roots, z, reason, n)
        };
    }
    settle(poly, roots, z, NonConvergenceReason::IterationCap, MAX_ITERATIONS)
}
