// Errors surfaced by the rendering core.
//
// Bad user input and numeric failures are recoverable and come back as a
// FractalError from the request that caused them. Calling the state machine
// out of protocol is a bug in the caller and panics instead.

use std::fmt;
use std::io::{Error, ErrorKind};

#[derive(Debug, Clone, PartialEq)]
pub enum FractalError {
    // Degenerate coefficients, constant polynomial or too high a degree
    InvalidPolynomial(String),
    // Root finding did not settle within its iteration cap
    RootSolverDidNotConverge { degree : usize, attempts : usize },
    // A recolor / recalculate was requested before any fractal was calculated
    NoFractalData,
    InvalidConfig(String)
}

impl fmt::Display for FractalError {
    fn fmt(&self, f : &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FractalError::InvalidPolynomial(reason) => write!(f, "Invalid polynomial: {}", reason),
            FractalError::RootSolverDidNotConverge { degree, attempts } => write!(
                f, "Roots of degree {} polynomial did not converge after {} attempts", degree, attempts
            ),
            FractalError::NoFractalData => write!(f, "No fractal has been calculated yet"),
            FractalError::InvalidConfig(reason) => write!(f, "Invalid config: {}", reason)
        }
    }
}

impl std::error::Error for FractalError {}

impl From<FractalError> for Error {
    fn from(err : FractalError) -> Error {
        Error::new(ErrorKind::InvalidData, err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_io_error_keeps_message() {
        let err : Error = FractalError::InvalidPolynomial("all coefficients are zero".to_string()).into();
        assert_eq!(err.kind(), ErrorKind::InvalidData);
        assert_eq!(err.to_string(), "Invalid polynomial: all coefficients are zero");
    }
}
