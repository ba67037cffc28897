use thiserror::Error;

/// A comprehensive error type for all operations in the crate.
///
/// Fitting surfaces the first failing validation check and leaves the
/// output untouched; evaluation never fails observably (invalid queries
/// produce a silent zero) but the 1D building blocks report these
/// variants for introspection and tests.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SplineError {
    #[error("Interpolation supports 1 through 6 axes, but {0} were described.")]
    InvalidDimension(usize),

    #[error("Sample array shape {shape:?} does not match the axis lengths {expected:?}.")]
    ShapeMismatch {
        shape: Vec<usize>,
        expected: Vec<usize>,
    },

    #[error("Axis {axis}: at least 3 sample points are required, but {len} were provided.")]
    AxisTooShort { axis: usize, len: usize },

    #[error("Axis {axis}: spline order must lie in [2, {max}], but was {order}.")]
    InvalidOrder {
        axis: usize,
        order: usize,
        max: usize,
    },

    #[error("Axis {axis}: abscissae must be strictly increasing.")]
    NonIncreasingAbscissae { axis: usize },

    #[error(
        "Axis {axis}: a supplied knot vector must be nondecreasing and contain exactly {expected} entries."
    )]
    InvalidKnotVector { axis: usize, expected: usize },

    #[error(
        "Axis {axis}: data violate the Schoenberg-Whitney condition; the collocation matrix is singular."
    )]
    SchoenbergWhitney { axis: usize },

    #[error("Banded factorization hit a zero pivot in column {column}.")]
    SingularMatrix { column: usize },

    #[error("Query coordinate {value} lies outside the spline domain [{lo}, {hi}].")]
    OutOfDomain { value: f64, lo: f64, hi: f64 },

    #[error(
        "Evaluation at the right endpoint walked off the knot vector; the spline has no left limit there."
    )]
    LeftLimitAtEndpoint,

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),
}

impl SplineError {
    /// Stable numeric code for fit-stage validation failures.
    ///
    /// Legacy callers of this interface family receive validation
    /// failures through an integer status slot: code 2 for a malformed
    /// call frame, and a four-code block per axis slot starting at 3
    /// (axis 0 uses 3..=6, axis 1 uses 7..=10, and so on) meaning bad
    /// length, bad order, non-increasing abscissae, and non-monotone
    /// knots respectively. Errors that do not correspond to a
    /// validation slot return `None`.
    pub fn legacy_code(&self) -> Option<u8> {
        match self {
            SplineError::InvalidDimension(_) | SplineError::ShapeMismatch { .. } => Some(2),
            SplineError::AxisTooShort { axis, .. } => Some(3 + 4 * *axis as u8),
            SplineError::InvalidOrder { axis, .. } => Some(4 + 4 * *axis as u8),
            SplineError::NonIncreasingAbscissae { axis } => Some(5 + 4 * *axis as u8),
            SplineError::InvalidKnotVector { axis, .. } => Some(6 + 4 * *axis as u8),
            _ => None,
        }
    }
}
