// Find every root of a polynomial and keep a colour next to each one
//
// Roots come from Aberth-Ehrlich iteration started on a circle sized by the
// Fujiwara bound. A repeated root comes out of the solver as a ring of copies
// whose error discs overlap, each such cluster is collapsed into one root
// with its multiplicity recorded.

use std::f64::consts::PI;

use log::debug;
use num::complex::Complex;
use rand::{Rng, SeedableRng};

use crate::error::FractalError;
use crate::polynomial::Polynomial;
use crate::{CONVERGENCE_EPSILON, ROOT_MERGE_DISTANCE};

const SOLVER_ITERATIONS : usize = 500;
const SOLVER_ATTEMPTS : usize = 10;
const SOLVER_SEED : u64 = 0x6e657774;
const REFINE_ITERATIONS : usize = 20;

// Hue in degrees [0,360) and chroma [0,1]
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OklchColor {
    pub h : f64,
    pub c : f64
}

#[derive(Debug, Clone)]
pub struct RootSet {
    roots : Vec<Complex<f64>>,
    multiplicities : Vec<usize>,
    // Squared distance at which an iterate has reached each root
    tolerances_sqr : Vec<f64>,
    colors : Vec<OklchColor>
}

// Angle of a root in degrees normalised to [0,360)
pub fn root_angle(root : &Complex<f64>) -> f64 {
    let angle = root.im.atan2(root.re).to_degrees();
    if angle < 0.0 {
        (angle + 360.0) % 360.0
    } else {
        angle
    }
}

impl RootSet {
    pub fn new(poly : &Polynomial) -> Result<RootSet, FractalError> {
        let found = roots_of(poly)?;
        let roots = cluster_roots(poly, &found).into_iter().map(
            |cluster| (snap_to_real(refine_cluster(poly, &cluster)), cluster.len())
        ).collect::<Vec<_>>();
        debug!("{} has {} distinct roots", poly, roots.len());
        Ok(RootSet::with_multiplicities(roots))
    }

    pub fn from_roots(roots : Vec<Complex<f64>>) -> RootSet {
        RootSet::with_multiplicities(roots.into_iter().map(|root| (root, 1)).collect())
    }

    // Roots are ordered by angle then distance from the origin. A root of
    // multiplicity m is reached at CONVERGENCE_EPSILON^(1/m), where |f| is as
    // small as it is at CONVERGENCE_EPSILON from a simple root, but never
    // further than half way to another root.
    pub fn with_multiplicities(mut roots : Vec<(Complex<f64>, usize)>) -> RootSet {
        roots.sort_by(
            |(a, _), (b, _)| root_angle(a).total_cmp(&root_angle(b)).then(a.norm().total_cmp(&b.norm()))
        );
        let tolerances_sqr = roots.iter().enumerate().map(|(i, (root, multiplicity))| {
            let gap = roots.iter().enumerate().filter(
                |(j, _)| *j != i
            ).map(
                |(_, (other, _))| (root - other).norm()
            ).fold(f64::INFINITY, f64::min);
            let tolerance = CONVERGENCE_EPSILON.powf(1.0 / (*multiplicity).max(1) as f64).min(0.5 * gap);
            tolerance * tolerance
        }).collect();
        let colors = roots.iter().map(
            |(root, _)| OklchColor { h : root_angle(root), c : 0.0 }
        ).collect();
        let (roots, multiplicities) : (Vec<Complex<f64>>, Vec<usize>) = roots.into_iter().unzip();
        RootSet { roots, multiplicities, tolerances_sqr, colors }
    }

    pub fn len(&self) -> usize {
        self.roots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.roots.is_empty()
    }

    pub fn roots(&self) -> &[Complex<f64>] {
        &self.roots
    }

    pub fn multiplicities(&self) -> &[usize] {
        &self.multiplicities
    }

    pub fn tolerance(&self, index : usize) -> f64 {
        self.tolerances_sqr[index].sqrt()
    }

    pub fn colors(&self) -> &[OklchColor] {
        &self.colors
    }

    pub fn set_colors(&mut self, colors : Vec<OklchColor>) {
        assert_eq!(
            colors.len(), self.roots.len(),
            "There should be {} colors for the roots", self.roots.len()
        );
        self.colors = colors;
    }

    // Index of the root an iterate at z has reached, if any
    #[inline]
    pub fn reached(&self, z : Complex<f64>) -> Option<usize> {
        self.roots.iter().zip(self.tolerances_sqr.iter()).position(
            |(root, tol_sqr)| (root - z).norm_sqr() < *tol_sqr
        )
    }

    pub fn nearest(&self, z : Complex<f64>) -> Option<usize> {
        self.roots.iter().enumerate().min_by(
            |(_, a), (_, b)| (*a - z).norm_sqr().total_cmp(&(*b - z).norm_sqr())
        ).map(|(index, _)| index)
    }

    pub fn memory_usage(&self) -> usize {
        self.roots.capacity() * std::mem::size_of::<Complex<f64>>()
            + self.multiplicities.capacity() * std::mem::size_of::<usize>()
            + self.tolerances_sqr.capacity() * std::mem::size_of::<f64>()
            + self.colors.capacity() * std::mem::size_of::<OklchColor>()
    }
}

// All roots with multiplicity, retrying from fresh starting points if a run stalls
pub fn roots_of(poly : &Polynomial) -> Result<Vec<Complex<f64>>, FractalError> {
    // Roots at zero are exact, only the rest need solving for
    let zeros = poly.coefficients().iter().take_while(|coeff| **coeff == 0.0).count();
    let mut roots = vec![Complex::new(0.0, 0.0); zeros];
    if zeros == poly.degree() {
        return Ok(roots);
    }
    let deflated = Polynomial::new(poly.coefficients()[zeros..].to_vec())?;
    let mut rng = rand_chacha::ChaCha8Rng::seed_from_u64(SOLVER_SEED);
    for attempt in 0..SOLVER_ATTEMPTS {
        let offset = rng.gen::<f64>() * 2.0 * PI;
        match aberth_roots(&deflated, offset) {
            Some(found) => {
                roots.extend(found);
                return Ok(roots);
            },
            None => debug!("Root solver attempt {} for {} did not converge", attempt + 1, poly)
        }
    }
    Err(FractalError::RootSolverDidNotConverge {
        degree : poly.degree(),
        attempts : SOLVER_ATTEMPTS
    })
}

// 2 * max |a_{n-k} / a_n|^(1/k), with the constant term halved
fn fujiwara_bound(poly : &Polynomial) -> f64 {
    let n = poly.degree();
    let coefficients = poly.coefficients();
    let lead = poly.leading();
    let bound = (1..=n).map(
        |k| {
            let coeff = (coefficients[n - k] / lead).abs();
            let coeff = if k == n { coeff / 2.0 } else { coeff };
            coeff.powf(1.0 / k as f64)
        }
    ).fold(0.0, f64::max);
    2.0 * bound
}

fn aberth_roots(poly : &Polynomial, offset : f64) -> Option<Vec<Complex<f64>>> {
    let n = poly.degree();
    let radius = (0.5 * fujiwara_bound(poly)).max(1e-3);
    if !radius.is_finite() {
        return None;
    }
    // The extra 0.4 rad keeps the start points off any symmetry axis of the roots
    let mut roots : Vec<Complex<f64>> = (0..n).map(
        |k| Complex::from_polar(radius, offset + 0.4 + 2.0 * PI * k as f64 / n as f64)
    ).collect();
    let mut done = vec![false; n];
    for _ in 0..SOLVER_ITERATIONS {
        let mut all_done = true;
        for i in 0..n {
            if done[i] {
                continue;
            }
            let z = roots[i];
            let d = poly.derivatives(z);
            // |f(z)| is already at the level of its own rounding error
            let (noise, _) = poly.noise_floors(z);
            if d.f0.norm() <= noise {
                done[i] = true;
                continue;
            }
            let repulsion : Complex<f64> = roots.iter().enumerate().filter(
                |(j, _)| *j != i
            ).map(
                |(_, other)| (z - other).inv()
            ).sum();
            let w = d.f0 / (d.f1 - d.f0 * repulsion);
            if !w.is_finite() {
                return None;
            }
            roots[i] = z - w;
            if w.norm() <= 4.0 * f64::EPSILON * roots[i].norm().max(f64::MIN_POSITIVE) {
                done[i] = true;
            } else {
                all_done = false;
            }
        }
        if all_done {
            return Some(roots);
        }
    }
    None
}

// Real roots come out of the solver with an imaginary part at rounding level,
// which would otherwise flip their angle between 0 and 360 degrees
fn snap_to_real(root : Complex<f64>) -> Complex<f64> {
    if root.im.abs() <= 1e-10 * (1.0 + root.re.abs()) {
        Complex::new(root.re, 0.0)
    } else {
        root
    }
}

// A disc about each approximation z_i of radius n |f(z_i)| / |a_n prod (z_i - z_j)|
// holds a true root. |f| is raised to its rounding floor and the radius
// doubled, so the ring of copies a repeated root leaves always overlaps.
fn inclusion_radii(poly : &Polynomial, found : &[Complex<f64>]) -> Vec<f64> {
    let n = found.len() as f64;
    found.iter().enumerate().map(|(i, z)| {
        let product = found.iter().enumerate().filter(
            |(j, _)| *j != i
        ).fold(Complex::new(1.0, 0.0), |acc, (_, other)| acc * (z - other));
        let (noise, _) = poly.noise_floors(*z);
        let residual = poly.evaluate(*z).norm().max(noise);
        let radius = 2.0 * n * residual / (poly.leading().abs() * product.norm());
        if radius.is_finite() { radius } else { 0.0 }
    }).collect()
}

// Group solver roots whose inclusion discs overlap, or that are closer than
// ROOT_MERGE_DISTANCE, keeping the first-seen order
pub fn cluster_roots(poly : &Polynomial, found : &[Complex<f64>]) -> Vec<Vec<Complex<f64>>> {
    let radii = inclusion_radii(poly, found);
    let mut labels : Vec<usize> = (0..found.len()).collect();
    for i in 0..found.len() {
        for j in 0..i {
            let distance = (found[i] - found[j]).norm();
            if distance <= radii[i] + radii[j] || distance < ROOT_MERGE_DISTANCE {
                let (from, to) = (labels[i], labels[j]);
                for label in labels.iter_mut().filter(|label| **label == from) {
                    *label = to;
                }
            }
        }
    }
    let mut seen : Vec<usize> = Vec::new();
    let mut clusters : Vec<Vec<Complex<f64>>> = Vec::new();
    for (root, label) in found.iter().zip(labels) {
        match seen.iter().position(|other| *other == label) {
            Some(k) => clusters[k].push(*root),
            None => {
                seen.push(label);
                clusters.push(vec![*root]);
            }
        }
    }
    clusters
}

// Coefficients of the order-th derivative, lowest power first
fn derivative_coefficients(coefficients : &[f64], order : usize) -> Vec<f64> {
    coefficients.iter().enumerate().skip(order).map(
        |(power, coeff)| coeff * (power - order + 1..=power).map(|k| k as f64).product::<f64>()
    ).collect()
}

fn horner(coefficients : &[f64], z : Complex<f64>) -> Complex<f64> {
    coefficients.iter().rev().fold(Complex::new(0.0, 0.0), |acc, coeff| acc * z + *coeff)
}

// m copies of a repeated root are a simple root of f^(m-1). Newton's method
// on that derivative, started from the cluster's mean, recovers it to full
// precision where the copies themselves only agree to about eps^(1/m).
fn refine_cluster(poly : &Polynomial, cluster : &[Complex<f64>]) -> Complex<f64> {
    let centre = cluster.iter().sum::<Complex<f64>>() / cluster.len() as f64;
    if cluster.len() == 1 {
        return centre;
    }
    let spread = cluster.iter().map(|root| (root - centre).norm()).fold(0.0, f64::max);
    let g = derivative_coefficients(poly.coefficients(), cluster.len() - 1);
    let dg = derivative_coefficients(&g, 1);
    let mut z = centre;
    for _ in 0..REFINE_ITERATIONS {
        let step = horner(&g, z) / horner(&dg, z);
        if !step.is_finite() {
            return centre;
        }
        z -= step;
        if step.norm() <= 4.0 * f64::EPSILON * z.norm() {
            break;
        }
    }
    // Newton wandered off to some other root of the derivative
    if (z - centre).norm() <= spread + ROOT_MERGE_DISTANCE {
        z
    } else {
        centre
    }
}
