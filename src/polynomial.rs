// A univariate polynomial with real coefficients evaluated over the complex plane
//
// Coefficients are stored lowest power first. Derivatives are never stored,
// they come out of a single Horner pass alongside the value.

use std::fmt;

use json::JsonValue;
use num::complex::Complex;

use crate::error::FractalError;
use crate::MAX_DEGREE;

#[derive(Debug, Clone, PartialEq)]
pub struct Polynomial {
    coefficients : Vec<f64>
}

// f and its first three derivatives at a point
#[derive(Debug, Clone, Copy)]
pub struct Derivatives {
    pub f0 : Complex<f64>,
    pub f1 : Complex<f64>,
    pub f2 : Complex<f64>,
    pub f3 : Complex<f64>
}

impl Polynomial {
    pub fn new(coefficients : Vec<f64>) -> Result<Polynomial, FractalError> {
        if coefficients.iter().any(|c| !c.is_finite()) {
            return Err(FractalError::InvalidPolynomial("coefficients must be finite".to_string()));
        }
        let mut coefficients = coefficients;
        while coefficients.last() == Some(&0.0) {
            coefficients.pop();
        }
        if coefficients.is_empty() {
            return Err(FractalError::InvalidPolynomial("all coefficients are zero".to_string()));
        }
        let degree = coefficients.len() - 1;
        if degree < 1 {
            return Err(FractalError::InvalidPolynomial("constant polynomials have no roots".to_string()));
        }
        if degree > MAX_DEGREE {
            return Err(FractalError::InvalidPolynomial(
                format!("degree {} is above the supported maximum of {}", degree, MAX_DEGREE)
            ));
        }
        Ok(Polynomial { coefficients })
    }

    // Coefficients are listed highest power first, as they would be written
    pub fn from_json(input : &JsonValue) -> Result<Polynomial, FractalError> {
        if !input.is_array() {
            return Err(FractalError::InvalidConfig("Missing coefficients".to_string()));
        }
        let coefficients = input.members().map(
            |value| value.as_f64().ok_or(
                FractalError::InvalidConfig(format!("Coefficient {} is not a number", value))
            )
        ).collect::<Result<Vec<f64>, FractalError>>()?;
        Polynomial::new(coefficients.into_iter().rev().collect())
    }

    pub fn degree(&self) -> usize {
        self.coefficients.len() - 1
    }

    pub fn coefficients(&self) -> &[f64] {
        &self.coefficients
    }

    pub fn leading(&self) -> f64 {
        self.coefficients[self.degree()]
    }

    pub fn evaluate(&self, z : Complex<f64>) -> Complex<f64> {
        self.coefficients.iter().rev().fold(
            Complex::new(0.0, 0.0),
            |acc, coeff| acc * z + *coeff
        )
    }

    // Sum of |a_k| r^k, the scale of the rounding error made by evaluate at |z| = r
    pub fn evaluate_abs(&self, r : f64) -> f64 {
        self.coefficients.iter().rev().fold(0.0, |acc, coeff| acc * r + coeff.abs())
    }

    // Bounds on the rounding error of f and f' evaluated at z. Values smaller
    // than these cannot be told apart from zero.
    pub fn noise_floors(&self, z : Complex<f64>) -> (f64, f64) {
        let r = z.norm();
        let (mut value, mut slope) = (0.0, 0.0);
        for coeff in self.coefficients.iter().rev() {
            slope = slope * r + value;
            value = value * r + coeff.abs();
        }
        let scale = 4.0 * self.degree() as f64 * f64::EPSILON;
        (scale * value, scale * slope)
    }

    // Synthetic division carried three levels deep, gives the Taylor
    // coefficients at z which are scaled up to the derivatives
    pub fn derivatives(&self, z : Complex<f64>) -> Derivatives {
        let zero = Complex::new(0.0, 0.0);
        let mut p = Complex::new(self.leading(), 0.0);
        let (mut d1, mut d2, mut d3) = (zero, zero, zero);
        for coeff in self.coefficients.iter().rev().skip(1) {
            d3 = d3 * z + d2;
            d2 = d2 * z + d1;
            d1 = d1 * z + p;
            p = p * z + *coeff;
        }
        Derivatives { f0 : p, f1 : d1, f2 : d2 * 2.0, f3 : d3 * 6.0 }
    }
}

impl fmt::Display for Polynomial {
    fn fmt(&self, f : &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        for (power, coeff) in self.coefficients.iter().enumerate().rev() {
            if *coeff == 0.0 {
                continue;
            }
            let sign = if *coeff < 0.0 { "-" } else { "+" };
            if first {
                if *coeff < 0.0 {
                    write!(f, "-")?;
                }
            } else {
                write!(f, " {} ", sign)?;
            }
            first = false;
            let magnitude = coeff.abs();
            if magnitude != 1.0 || power == 0 {
                write!(f, "{}", magnitude)?;
            }
            match power {
                0 => {},
                1 => write!(f, "z")?,
                _ => write!(f, "z^{}", power)?
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use cgmath::assert_abs_diff_eq;

    use super::*;

    #[test]
    fn test_rejects_all_zero() {
        assert!(matches!(
            Polynomial::new(vec![0.0, 0.0, 0.0]),
            Err(FractalError::InvalidPolynomial(_))
        ));
        assert!(matches!(Polynomial::new(vec![]), Err(FractalError::InvalidPolynomial(_))));
    }

    #[test]
    fn test_rejects_constant() {
        assert!(matches!(
            Polynomial::new(vec![5.0, 0.0]),
            Err(FractalError::InvalidPolynomial(_))
        ));
    }

    #[test]
    fn test_rejects_too_high_degree() {
        let mut coefficients = vec![0.0; MAX_DEGREE + 2];
        coefficients[MAX_DEGREE + 1] = 1.0;
        assert!(Polynomial::new(coefficients).is_err());
    }

    #[test]
    fn test_trailing_zeros_trimmed() {
        let poly = Polynomial::new(vec![-1.0, 0.0, 1.0, 0.0]).unwrap();
        assert_eq!(poly.degree(), 2);
        assert_eq!(poly.leading(), 1.0);
    }

    #[test]
    fn test_from_json_highest_first() {
        let input = json::parse("[1, 0, 0, -1]").unwrap();
        let poly = Polynomial::from_json(&input).unwrap();
        assert_eq!(poly.coefficients(), &[-1.0, 0.0, 0.0, 1.0]);
        assert!(Polynomial::from_json(&json::parse("[1, \"z\"]").unwrap()).is_err());
    }

    #[test]
    fn test_derivatives_of_cubic() {
        // z^3 - 2z + 5
        let poly = Polynomial::new(vec![5.0, -2.0, 0.0, 1.0]).unwrap();
        let z = Complex::new(0.5, -1.25);
        let d = poly.derivatives(z);
        let expected_f0 = z * z * z - 2.0 * z + 5.0;
        let expected_f1 = 3.0 * z * z - 2.0;
        let expected_f2 = 6.0 * z;
        assert_abs_diff_eq!(d.f0.re, expected_f0.re, epsilon = 1e-12);
        assert_abs_diff_eq!(d.f0.im, expected_f0.im, epsilon = 1e-12);
        assert_abs_diff_eq!(d.f1.re, expected_f1.re, epsilon = 1e-12);
        assert_abs_diff_eq!(d.f1.im, expected_f1.im, epsilon = 1e-12);
        assert_abs_diff_eq!(d.f2.re, expected_f2.re, epsilon = 1e-12);
        assert_abs_diff_eq!(d.f2.im, expected_f2.im, epsilon = 1e-12);
        assert_abs_diff_eq!(d.f3.re, 6.0, epsilon = 1e-12);
        assert_abs_diff_eq!(d.f3.im, 0.0, epsilon = 1e-12);
        assert_eq!(poly.evaluate(z), d.f0);
    }

    #[test]
    fn test_noise_floors() {
        // z^2 - 3z + 2 at |z| = 2: sums 4 + 6 + 2 and 4 + 3
        let poly = Polynomial::new(vec![2.0, -3.0, 1.0]).unwrap();
        let (value, slope) = poly.noise_floors(Complex::new(0.0, 2.0));
        assert_abs_diff_eq!(value, 8.0 * f64::EPSILON * 12.0, epsilon = 1e-28);
        assert_abs_diff_eq!(slope, 8.0 * f64::EPSILON * 7.0, epsilon = 1e-28);
        assert_eq!(poly.noise_floors(Complex::new(0.0, 0.0)).1, 8.0 * f64::EPSILON * 3.0);
    }

    #[test]
    fn test_display() {
        let poly = Polynomial::new(vec![-1.0, 0.0, 0.0, 1.0]).unwrap();
        assert_eq!(poly.to_string(), "z^3 - 1");
        let poly = Polynomial::new(vec![5.0, -2.0, 3.0]).unwrap();
        assert_eq!(poly.to_string(), "3z^2 - 2z + 5");
        let poly = Polynomial::new(vec![0.0, -1.0]).unwrap();
        assert_eq!(poly.to_string(), "-z");
    }
}
